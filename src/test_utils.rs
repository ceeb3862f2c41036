//! Test Utilities Module
//!
//! Scripted stand-ins for the ledger gateway and the wallet signer, so the
//! submission, confirmation and session flows can be driven deterministically
//! without a node or a wallet.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::classifier::{ClassifiedError, ErrorKind, RawFailure};
use crate::gateway::{LedgerGateway, SimulationOutcome, TransactionRecord};
use crate::session::{SessionOptions, WalletSession};
use crate::signer::{SignAndSubmitResponse, Signer, WalletAccount};
use crate::store::MemoryStore;
use crate::submitter::{EntryFunctionPayload, TransactionRequest};

/// Address used by the mock signer
pub const MOCK_ADDRESS: &str = "0x000000000000000000000000000000000000000000000000000000000000a11c";

/// How the mock gateway answers by-hash lookups
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationScript {
    /// Never indexed
    Never,
    /// Reported pending forever
    AlwaysPending,
    /// Committed on the given poll (1-based) for every hash
    CommitOnPoll {
        poll: u32,
        success: bool,
        vm_status: String,
    },
}

impl ConfirmationScript {
    pub fn success_on_poll(poll: u32) -> Self {
        Self::CommitOnPoll {
            poll,
            success: true,
            vm_status: "Executed successfully".to_string(),
        }
    }

    pub fn failure_on_poll(poll: u32, vm_status: impl Into<String>) -> Self {
        Self::CommitOnPoll {
            poll,
            success: false,
            vm_status: vm_status.into(),
        }
    }
}

/// Mock LedgerGateway for testing
///
/// Every call is counted; answers come from the scripted state.
#[derive(Clone)]
pub struct MockGateway {
    pub sequence_number: Arc<Mutex<Result<u64, ClassifiedError>>>,
    pub published: Arc<Mutex<HashSet<String>>>,
    pub simulation: Arc<Mutex<Result<SimulationOutcome, ClassifiedError>>>,
    pub confirmation: Arc<Mutex<ConfirmationScript>>,
    pub views: Arc<Mutex<HashMap<String, Result<Vec<Value>, ClassifiedError>>>>,
    pub reachable: Arc<Mutex<bool>>,

    pub resource_checks: Arc<Mutex<usize>>,
    pub simulations: Arc<Mutex<Vec<TransactionRequest>>>,
    pub polls: Arc<Mutex<HashMap<String, u32>>>,
    pub view_calls: Arc<Mutex<Vec<TransactionRequest>>>,
}

impl MockGateway {
    /// Reachable node, sequence number 7, successful simulation with max gas
    /// 1000, and every transaction committed successfully on the first poll
    pub fn new() -> Self {
        Self {
            sequence_number: Arc::new(Mutex::new(Ok(7))),
            published: Arc::new(Mutex::new(HashSet::new())),
            simulation: Arc::new(Mutex::new(Ok(Self::simulation_success(1000)))),
            confirmation: Arc::new(Mutex::new(ConfirmationScript::success_on_poll(1))),
            views: Arc::new(Mutex::new(HashMap::new())),
            reachable: Arc::new(Mutex::new(true)),
            resource_checks: Arc::new(Mutex::new(0)),
            simulations: Arc::new(Mutex::new(Vec::new())),
            polls: Arc::new(Mutex::new(HashMap::new())),
            view_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn simulation_success(max_gas_amount: u64) -> SimulationOutcome {
        SimulationOutcome {
            success: true,
            vm_status: "Executed successfully".to_string(),
            gas_used: Some(max_gas_amount / 2),
            gas_unit_price: Some(100),
            max_gas_amount: Some(max_gas_amount),
        }
    }

    pub fn simulation_failure(vm_status: &str) -> SimulationOutcome {
        SimulationOutcome {
            success: false,
            vm_status: vm_status.to_string(),
            gas_used: None,
            gas_unit_price: None,
            max_gas_amount: None,
        }
    }

    pub async fn set_simulation(&self, outcome: Result<SimulationOutcome, ClassifiedError>) {
        *self.simulation.lock().await = outcome;
    }

    pub async fn set_sequence_number(&self, sequence: Result<u64, ClassifiedError>) {
        *self.sequence_number.lock().await = sequence;
    }

    pub async fn set_confirmation(&self, script: ConfirmationScript) {
        *self.confirmation.lock().await = script;
    }

    pub async fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock().await = reachable;
    }

    pub async fn publish(&self, resource_type: impl Into<String>) {
        self.published.lock().await.insert(resource_type.into());
    }

    pub async fn set_view(&self, function: &str, result: Result<Vec<Value>, ClassifiedError>) {
        self.views.lock().await.insert(function.to_string(), result);
    }

    pub async fn get_resource_check_count(&self) -> usize {
        *self.resource_checks.lock().await
    }

    pub async fn get_simulation_count(&self) -> usize {
        self.simulations.lock().await.len()
    }

    pub async fn get_poll_count(&self, hash: &str) -> u32 {
        self.polls.lock().await.get(hash).copied().unwrap_or_default()
    }

    pub async fn get_view_calls(&self) -> Vec<TransactionRequest> {
        self.view_calls.lock().await.clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn sequence_number(&self, _address: &str) -> Result<u64, ClassifiedError> {
        self.sequence_number.lock().await.clone()
    }

    async fn resource_exists(
        &self,
        _address: &str,
        resource_type: &str,
    ) -> Result<bool, ClassifiedError> {
        *self.resource_checks.lock().await += 1;
        Ok(self.published.lock().await.contains(resource_type))
    }

    async fn account_resource(
        &self,
        address: &str,
        resource_type: &str,
    ) -> Result<Value, ClassifiedError> {
        if self.published.lock().await.contains(resource_type) {
            Ok(serde_json::json!({ "type": resource_type, "data": {} }))
        } else {
            Err(ClassifiedError::new(
                ErrorKind::ResourceNotFound,
                format!("resource {resource_type} not found at {address}"),
            ))
        }
    }

    async fn simulate(
        &self,
        request: &TransactionRequest,
        _sender: &str,
    ) -> Result<SimulationOutcome, ClassifiedError> {
        self.simulations.lock().await.push(request.clone());
        self.simulation.lock().await.clone()
    }

    async fn transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, ClassifiedError> {
        let poll = {
            let mut polls = self.polls.lock().await;
            let count = polls.entry(hash.to_string()).or_default();
            *count += 1;
            *count
        };

        let record = match &*self.confirmation.lock().await {
            ConfirmationScript::Never => None,
            ConfirmationScript::AlwaysPending => Some(TransactionRecord::Pending {
                hash: hash.to_string(),
            }),
            ConfirmationScript::CommitOnPoll { poll: at, .. } if poll < *at => None,
            ConfirmationScript::CommitOnPoll {
                success, vm_status, ..
            } => Some(TransactionRecord::Committed {
                hash: hash.to_string(),
                success: *success,
                vm_status: vm_status.clone(),
                gas_used: Some("42".to_string()),
                events: Vec::new(),
            }),
        };
        Ok(record)
    }

    async fn view(&self, request: &TransactionRequest) -> Result<Vec<Value>, ClassifiedError> {
        self.view_calls.lock().await.push(request.clone());
        match self.views.lock().await.get(&request.function_name) {
            Some(result) => result.clone(),
            None => Err(ClassifiedError::new(
                ErrorKind::ResourceNotFound,
                format!("no view scripted for {}", request.function_name),
            )),
        }
    }

    async fn is_network_reachable(&self) -> bool {
        *self.reachable.lock().await
    }
}

/// Mock wallet signer for testing
#[derive(Clone)]
pub struct MockSigner {
    pub account: Arc<Mutex<Result<WalletAccount, RawFailure>>>,
    pub connected: Arc<Mutex<bool>>,
    /// Scripted sign results, consumed front to back
    pub responses: Arc<Mutex<VecDeque<Result<SignAndSubmitResponse, RawFailure>>>>,
    /// Failure returned once the script is exhausted; `None` means succeed
    pub fallback_failure: Arc<Mutex<Option<RawFailure>>>,

    pub payloads: Arc<Mutex<Vec<EntryFunctionPayload>>>,
    pub sign_times: Arc<Mutex<Vec<Instant>>>,
    pub connect_count: Arc<Mutex<usize>>,
    pub disconnect_count: Arc<Mutex<usize>>,
}

impl MockSigner {
    /// Signer that connects as [`MOCK_ADDRESS`] and accepts every transaction
    pub fn new() -> Self {
        Self {
            account: Arc::new(Mutex::new(Ok(WalletAccount {
                address: MOCK_ADDRESS.to_string(),
                public_key: Some("0xpubkey".to_string()),
            }))),
            connected: Arc::new(Mutex::new(false)),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback_failure: Arc::new(Mutex::new(None)),
            payloads: Arc::new(Mutex::new(Vec::new())),
            sign_times: Arc::new(Mutex::new(Vec::new())),
            connect_count: Arc::new(Mutex::new(0)),
            disconnect_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Signer whose every sign-and-submit fails with `message`
    pub fn new_failing(message: &str) -> Self {
        let mut signer = Self::new();
        signer.fallback_failure = Arc::new(Mutex::new(Some(RawFailure::from(message))));
        signer
    }

    pub async fn set_account(&self, account: Result<WalletAccount, RawFailure>) {
        *self.account.lock().await = account;
    }

    pub async fn set_connected(&self, connected: bool) {
        *self.connected.lock().await = connected;
    }

    pub async fn push_response(&self, response: Result<SignAndSubmitResponse, RawFailure>) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn get_sign_count(&self) -> usize {
        self.payloads.lock().await.len()
    }

    pub async fn get_payloads(&self) -> Vec<EntryFunctionPayload> {
        self.payloads.lock().await.clone()
    }

    pub async fn get_sign_times(&self) -> Vec<Instant> {
        self.sign_times.lock().await.clone()
    }

    pub async fn get_connect_count(&self) -> usize {
        *self.connect_count.lock().await
    }

    pub async fn get_disconnect_count(&self) -> usize {
        *self.disconnect_count.lock().await
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn connect(&self) -> Result<WalletAccount, RawFailure> {
        *self.connect_count.lock().await += 1;
        let account = self.account.lock().await.clone();
        if account.is_ok() {
            *self.connected.lock().await = true;
        }
        account
    }

    async fn disconnect(&self) -> Result<(), RawFailure> {
        *self.disconnect_count.lock().await += 1;
        *self.connected.lock().await = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    async fn sign_and_submit_transaction(
        &self,
        payload: &EntryFunctionPayload,
    ) -> Result<SignAndSubmitResponse, RawFailure> {
        let call = {
            let mut payloads = self.payloads.lock().await;
            payloads.push(payload.clone());
            payloads.len()
        };
        self.sign_times.lock().await.push(Instant::now());

        if let Some(response) = self.responses.lock().await.pop_front() {
            return response;
        }
        match self.fallback_failure.lock().await.clone() {
            Some(failure) => Err(failure),
            None => Ok(SignAndSubmitResponse::Pending {
                hash: format!("0x{call:064x}"),
            }),
        }
    }
}

/// Session over the given mocks with an in-memory store
pub fn mock_session(
    options: SessionOptions,
    gateway: &MockGateway,
    signer: Option<&MockSigner>,
) -> Arc<WalletSession> {
    Arc::new(WalletSession::new(
        options,
        Arc::new(gateway.clone()),
        signer.map(|s| Arc::new(s.clone()) as Arc<dyn Signer>),
        Arc::new(MemoryStore::new()),
    ))
}

/// Same as [`mock_session`], already connected through the mock signer
pub async fn connected_session(
    options: SessionOptions,
    gateway: &MockGateway,
    signer: &MockSigner,
) -> Arc<WalletSession> {
    let session = mock_session(options, gateway, Some(signer));
    session
        .connect()
        .await
        .expect("mock signer should connect");
    session
}
