//! REST implementation of [`LedgerGateway`] against an Aptos-style fullnode

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::{LedgerGateway, SimulationOutcome, TransactionRecord};
use crate::classifier::{classify, ClassifiedError, ErrorKind, RawFailure};
use crate::encoding::decode_u64;
use crate::metrics::metrics;
use crate::submitter::TransactionRequest;

/// Gas defaults used only to build the dry-run request; the node re-estimates both
const SIMULATION_MAX_GAS: u64 = 200_000;
const SIMULATION_GAS_UNIT_PRICE: u64 = 100;
const SIMULATION_EXPIRATION_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct HttpLedgerGateway {
    client: Client,
    api_base: Url,
}

impl HttpLedgerGateway {
    /// Create a gateway for `node_url` (with or without the trailing `/v1`)
    pub fn new(node_url: &str, timeout: Duration) -> Result<Self, ClassifiedError> {
        let trimmed = node_url.trim_end_matches('/');
        let base = if trimmed.ends_with("/v1") {
            trimmed.to_string()
        } else {
            format!("{}/v1", trimmed)
        };
        let api_base = Url::parse(&base).map_err(|e| {
            ClassifiedError::new(
                ErrorKind::InvalidArgument,
                format!("invalid node url {:?}: {}", node_url, e),
            )
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(classify)?;

        Ok(Self { client, api_base })
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClassifiedError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClassifiedError::new(ErrorKind::InvalidArgument, "node url cannot be a base")
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode the JSON body, keeping error bodies for classification
    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, RawFailure> {
        let started = Instant::now();
        let result = Self::send_inner(request).await;
        metrics()
            .gateway_latency
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
        result
    }

    async fn send_inner(request: reqwest::RequestBuilder) -> Result<Value, RawFailure> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if status.is_success() {
            Ok(body)
        } else {
            Err(RawFailure::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn is_not_found(raw: &RawFailure) -> bool {
        matches!(raw, RawFailure::Http { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    #[instrument(skip(self))]
    async fn sequence_number(&self, address: &str) -> Result<u64, ClassifiedError> {
        let url = self.endpoint(&["accounts", address])?;
        let account = self
            .send("account", self.client.get(url))
            .await
            .map_err(classify)?;

        account
            .get("sequence_number")
            .and_then(decode_u64)
            .ok_or_else(|| {
                ClassifiedError::new(
                    ErrorKind::Unknown,
                    format!("account response without sequence_number: {}", account),
                )
            })
    }

    #[instrument(skip(self))]
    async fn resource_exists(
        &self,
        address: &str,
        resource_type: &str,
    ) -> Result<bool, ClassifiedError> {
        let url = self.endpoint(&["accounts", address, "resource", resource_type])?;
        match self.send("resource", self.client.get(url)).await {
            Ok(_) => Ok(true),
            Err(raw) if Self::is_not_found(&raw) => Ok(false),
            Err(raw) => {
                let err = classify(raw);
                if err.kind == ErrorKind::ResourceNotFound {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn account_resource(
        &self,
        address: &str,
        resource_type: &str,
    ) -> Result<Value, ClassifiedError> {
        let url = self.endpoint(&["accounts", address, "resource", resource_type])?;
        let resource = self
            .send("resource", self.client.get(url))
            .await
            .map_err(classify)?;
        Ok(resource.get("data").cloned().unwrap_or(resource))
    }

    #[instrument(skip(self, request), fields(function = %request.function_id()))]
    async fn simulate(
        &self,
        request: &TransactionRequest,
        sender: &str,
    ) -> Result<SimulationOutcome, ClassifiedError> {
        let sequence_number = self.sequence_number(sender).await?;
        let gas = request.gas_options.unwrap_or_default();
        let expiration = chrono::Utc::now().timestamp() + SIMULATION_EXPIRATION_SECS;

        let body = json!({
            "sender": sender,
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": gas.max_gas_amount.unwrap_or(SIMULATION_MAX_GAS).to_string(),
            "gas_unit_price": gas.gas_unit_price.unwrap_or(SIMULATION_GAS_UNIT_PRICE).to_string(),
            "expiration_timestamp_secs": expiration.to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": request.function_id(),
                "type_arguments": request.type_arguments,
                "arguments": request.arguments,
            },
            "signature": { "type": "no_account_signature" },
        });

        let mut url = self.endpoint(&["transactions", "simulate"])?;
        url.query_pairs_mut()
            .append_pair("estimate_gas_unit_price", "true")
            .append_pair("estimate_max_gas_amount", "true");

        let response = self
            .send("simulate", self.client.post(url).json(&body))
            .await
            .map_err(classify)?;

        let outcome = response
            .as_array()
            .and_then(|txs| txs.first())
            .and_then(SimulationOutcome::from_json)
            .ok_or_else(|| {
                ClassifiedError::new(
                    ErrorKind::GasEstimationFailure,
                    format!("unexpected simulation response: {}", response),
                )
            })?;

        debug!(
            success = outcome.success,
            vm_status = %outcome.vm_status,
            max_gas_amount = ?outcome.max_gas_amount,
            "Simulation finished"
        );
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, ClassifiedError> {
        let url = self.endpoint(&["transactions", "by_hash", hash])?;
        match self.send("transaction_by_hash", self.client.get(url)).await {
            Ok(body) => TransactionRecord::from_json(&body).map(Some).ok_or_else(|| {
                ClassifiedError::new(
                    ErrorKind::Unknown,
                    format!("unexpected transaction response: {}", body),
                )
            }),
            Err(raw) if Self::is_not_found(&raw) => Ok(None),
            Err(raw) => Err(classify(raw)),
        }
    }

    #[instrument(skip(self, request), fields(function = %request.function_id()))]
    async fn view(&self, request: &TransactionRequest) -> Result<Vec<Value>, ClassifiedError> {
        let url = self.endpoint(&["view"])?;
        let body = json!({
            "function": request.function_id(),
            "type_arguments": request.type_arguments,
            "arguments": request.arguments,
        });

        let response = self
            .send("view", self.client.post(url).json(&body))
            .await
            .map_err(classify)?;

        match response {
            Value::Array(values) => Ok(values),
            other => Err(ClassifiedError::new(
                ErrorKind::Unknown,
                format!("view returned a non-array value: {}", other),
            )),
        }
    }

    async fn is_network_reachable(&self) -> bool {
        match self.send("ledger_info", self.client.get(self.api_base.clone())).await {
            Ok(_) => true,
            Err(raw) => {
                warn!(error = %classify(raw), "Ledger node unreachable");
                false
            }
        }
    }
}
