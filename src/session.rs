//! Wallet and network session
//!
//! Owns the connection state machine (Disconnected -> Connecting -> Connected),
//! the per-module registry state, the history cache and the notification
//! channel. Domain contracts reach the submitter and the poller through here.

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{classify, ClassifiedError, ErrorKind, RawFailure};
use crate::encoding::normalize_address;
use crate::gateway::LedgerGateway;
use crate::history::{HistoryStatus, RecordType, TransactionHistoryItem};
use crate::poller::{ConfirmationPoller, ConfirmationResult};
use crate::signer::{Signer, WalletAccount};
use crate::store::SessionStore;
use crate::submitter::{
    RegistryInitState, RegistryTracker, SubmissionPolicy, SubmitOutcome, TransactionRequest,
    TransactionSubmitter,
};

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Runtime knobs of a session, usually derived from `Config`
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub network_name: String,
    pub explorer_url: String,
    pub submission: SubmissionPolicy,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub liveness_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            network_name: "devnet".to_string(),
            explorer_url: "https://explorer.aptoslabs.com/txn".to_string(),
            submission: SubmissionPolicy::default(),
            poll_interval: Duration::from_secs(2),
            confirmation_timeout: Duration::from_secs(30),
            liveness_interval: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub address: Option<String>,
    pub public_key: Option<String>,
    pub connected: bool,
    pub network_connected: bool,
    pub network_name: String,
}

/// User-facing outcome messages
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    WalletConnected { address: String },
    WalletDisconnected { external: bool },
    Success { title: String, hash: String },
    AlreadyCompleted { title: String },
    /// Confirmation did not arrive in time; the transaction may still land
    Pending { title: String, hash: String },
    Failed { title: String, error: ClassifiedError },
}

impl Notification {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WalletConnected { address } => write!(f, "Wallet connected: {address}"),
            Self::WalletDisconnected { external: false } => write!(f, "Wallet disconnected"),
            Self::WalletDisconnected { external: true } => {
                write!(f, "Wallet was disconnected outside this session")
            }
            Self::Success { title, hash } => write!(f, "{title} confirmed ({hash})"),
            Self::AlreadyCompleted { title } => {
                write!(f, "{title}: already completed on the ledger")
            }
            Self::Pending { title, hash } => write!(
                f,
                "{title} submitted ({hash}) but not yet confirmed; it may still be processing"
            ),
            Self::Failed { title, error } => write!(
                f,
                "{title} failed: {} - {} ({})",
                error.kind, error.raw_message, error.actionable_hint
            ),
        }
    }
}

/// Result of one liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessReport {
    pub network_reachable: bool,
    pub wallet_connected: bool,
}

#[derive(Debug)]
struct SessionState {
    state: ConnectionState,
    account: Option<WalletAccount>,
    network_connected: bool,
}

pub struct WalletSession {
    state: RwLock<SessionState>,
    options: SessionOptions,
    gateway: Arc<dyn LedgerGateway>,
    signer: Option<Arc<dyn Signer>>,
    submitter: TransactionSubmitter,
    poller: ConfirmationPoller,
    registries: RegistryTracker,
    store: Arc<dyn SessionStore>,
    history_cache: RwLock<Vec<TransactionHistoryItem>>,
    notifications: broadcast::Sender<Notification>,
    shutdown: CancellationToken,
}

impl WalletSession {
    pub fn new(
        options: SessionOptions,
        gateway: Arc<dyn LedgerGateway>,
        signer: Option<Arc<dyn Signer>>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let submitter = TransactionSubmitter::new(
            Arc::clone(&gateway),
            signer.clone(),
            options.submission.clone(),
        );
        let poller = ConfirmationPoller::new(Arc::clone(&gateway), options.poll_interval);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            state: RwLock::new(SessionState {
                state: ConnectionState::Disconnected,
                account: None,
                network_connected: false,
            }),
            options,
            gateway,
            signer,
            submitter,
            poller,
            registries: RegistryTracker::new(),
            store,
            history_cache: RwLock::new(Vec::new()),
            notifications,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn LedgerGateway> {
        &self.gateway
    }

    pub fn poller(&self) -> &ConfirmationPoller {
        &self.poller
    }

    pub fn network_name(&self) -> &str {
        &self.options.network_name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn notify(&self, notification: Notification) {
        debug!(%notification, "Session notification");
        // No subscribers is fine
        let _ = self.notifications.send(notification);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            state: state.state,
            address: state.account.as_ref().map(|a| a.address.clone()),
            public_key: state.account.as_ref().and_then(|a| a.public_key.clone()),
            connected: state.state == ConnectionState::Connected,
            network_connected: state.network_connected,
            network_name: self.options.network_name.clone(),
        }
    }

    pub fn address(&self) -> Option<String> {
        let state = self.state.read();
        match state.state {
            ConnectionState::Connected => state.account.as_ref().map(|a| a.address.clone()),
            _ => None,
        }
    }

    /// Explorer link for a transaction on this session's network
    pub fn explorer_url(&self, hash: &str) -> String {
        format!(
            "{}/{}?network={}",
            self.options.explorer_url.trim_end_matches('/'),
            hash,
            self.options.network_name
        )
    }

    /// Ask the signer for an account and move to `Connected`
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<WalletAccount, ClassifiedError> {
        {
            let mut state = self.state.write();
            if state.state == ConnectionState::Connected {
                if let Some(account) = state.account.clone() {
                    return Ok(account);
                }
            }
            state.state = ConnectionState::Connecting;
        }

        let result = self.request_account().await;
        match result {
            Ok(account) => {
                {
                    let mut state = self.state.write();
                    state.state = ConnectionState::Connected;
                    state.account = Some(account.clone());
                }
                if let Err(e) = self.store.persist_address(&account.address) {
                    warn!(error = %e, "Failed to persist wallet address");
                }
                self.reload_history(&account.address);
                info!(address = %account.address, "Wallet connected");
                self.notify(Notification::WalletConnected {
                    address: account.address.clone(),
                });
                Ok(account)
            }
            Err(err) => {
                {
                    let mut state = self.state.write();
                    state.state = ConnectionState::Disconnected;
                    state.account = None;
                }
                warn!(kind = %err.kind, error = %err.raw_message, "Wallet connection failed");
                self.notify(Notification::Failed {
                    title: "Wallet connection".to_string(),
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    async fn request_account(&self) -> Result<WalletAccount, ClassifiedError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(ClassifiedError::wallet_unavailable)?;
        let account = signer.connect().await.map_err(classify)?;
        if account.address.trim().is_empty() {
            return Err(ClassifiedError::new(
                ErrorKind::WalletUnavailable,
                "wallet returned no address",
            ));
        }
        Ok(WalletAccount {
            address: normalize_address(&account.address)?,
            public_key: account.public_key,
        })
    }

    /// Drop the connection, the persisted address and the history cache
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        if let Some(signer) = &self.signer {
            if let Err(raw) = signer.disconnect().await {
                let err = classify(raw);
                warn!(kind = %err.kind, "Signer disconnect failed, clearing session anyway");
            }
        }
        self.clear_connection();
        info!("Wallet disconnected");
        self.notify(Notification::WalletDisconnected { external: false });
    }

    fn clear_connection(&self) {
        {
            let mut state = self.state.write();
            state.state = ConnectionState::Disconnected;
            state.account = None;
        }
        if let Err(e) = self.store.clear_address() {
            warn!(error = %e, "Failed to clear persisted wallet address");
        }
        self.history_cache.write().clear();
    }

    /// Silently re-establish a previous connection
    ///
    /// Only succeeds when an address was persisted, the network answers and the
    /// signer still reports itself connected. Returns whether the session is
    /// now connected.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> bool {
        let address = match self.store.persisted_address() {
            Ok(Some(address)) => address,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted wallet address");
                return false;
            }
        };

        let network_reachable = self.gateway.is_network_reachable().await;
        self.state.write().network_connected = network_reachable;
        let signer_connected = match &self.signer {
            Some(signer) => signer.is_connected().await,
            None => false,
        };
        if !network_reachable || !signer_connected {
            debug!(network_reachable, signer_connected, "Not restoring previous wallet session");
            return false;
        }

        {
            let mut state = self.state.write();
            state.state = ConnectionState::Connected;
            state.account = Some(WalletAccount {
                address: address.clone(),
                public_key: None,
            });
        }
        self.reload_history(&address);
        info!(%address, "Wallet session restored");
        true
    }

    /// Probe the network and re-verify the signer
    ///
    /// A signer that no longer reports connected forces the session to
    /// `Disconnected`.
    pub async fn check_liveness(&self) -> LivenessReport {
        let network_reachable = self.gateway.is_network_reachable().await;
        self.state.write().network_connected = network_reachable;

        if self.address().is_none() {
            return LivenessReport {
                network_reachable,
                wallet_connected: false,
            };
        }

        let signer_connected = match &self.signer {
            Some(signer) => signer.is_connected().await,
            None => false,
        };
        if !signer_connected {
            warn!("Signer reports disconnected, dropping wallet session");
            self.clear_connection();
            self.notify(Notification::WalletDisconnected { external: true });
        }

        LivenessReport {
            network_reachable,
            wallet_connected: signer_connected,
        }
    }

    /// Run `check_liveness` every liveness interval until `shutdown`
    pub fn spawn_liveness_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session.options.liveness_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = session.shutdown.cancelled() => {
                        debug!("Liveness monitor stopped");
                        break;
                    }

                    _ = ticker.tick() => {
                        let report = session.check_liveness().await;
                        debug!(?report, "Liveness check");
                    }
                }
            }
        })
    }

    /// Stop the liveness monitor and abandon in-flight confirmation polls
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn require_address(&self) -> Result<String, ClassifiedError> {
        self.address().ok_or_else(|| {
            ClassifiedError::new(ErrorKind::WalletUnavailable, "no wallet connected")
        })
    }

    /// Submit through the connected wallet
    pub async fn submit(&self, request: &TransactionRequest) -> Result<SubmitOutcome, ClassifiedError> {
        let address = self.require_address()?;
        self.submitter.submit(&address, request).await
    }

    pub async fn wait_for_confirmation(&self, hash: &str) -> ConfirmationResult {
        let cancel = self.shutdown.child_token();
        self.poller
            .wait_for(hash, self.options.confirmation_timeout, &cancel)
            .await
    }

    pub fn registry_state(&self, module: &str) -> RegistryInitState {
        self.registries.state(module)
    }

    pub fn invalidate_registry(&self, module: &str) {
        self.registries.invalidate(module);
    }

    /// Publish the module's registry resource unless it already exists
    ///
    /// Concurrent callers for one module share a single initialization
    /// transaction. An initialization that does not confirm in time is treated
    /// as done; a later `ResourceNotFound` invalidates the module again.
    #[instrument(skip(self, init_request), fields(function = %init_request.function_name))]
    pub async fn ensure_registry(
        &self,
        module: &str,
        resource_type: &str,
        init_request: &TransactionRequest,
    ) -> Result<(), ClassifiedError> {
        let address = self.require_address()?;

        self.registries
            .ensure_initialized(module, || async {
                if self.gateway.resource_exists(&address, resource_type).await? {
                    debug!(module, "Registry already published");
                    return Ok(());
                }

                info!(module, "Initializing registry");
                let outcome = self.submitter.submit(&address, init_request).await?;
                if outcome.is_synthetic() {
                    return Ok(());
                }

                let confirmation = self.wait_for_confirmation(&outcome.hash).await;
                if confirmation.success || confirmation.is_timeout() || confirmation.is_cancelled() {
                    return Ok(());
                }

                let err = classify(RawFailure::vm_status(
                    confirmation.vm_status.unwrap_or(confirmation.status),
                ));
                if err.kind.is_benign() {
                    Ok(())
                } else {
                    Err(err)
                }
            })
            .await
    }

    pub fn transaction_history(&self) -> Vec<TransactionHistoryItem> {
        self.history_cache.read().clone()
    }

    fn reload_history(&self, address: &str) {
        let history = match self.store.history(address) {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Failed to load transaction history");
                Vec::new()
            }
        };
        *self.history_cache.write() = history;
    }

    /// Record a transaction for the connected wallet; no-op when disconnected
    pub fn add_transaction_to_history(
        &self,
        record_type: RecordType,
        title: &str,
        description: &str,
        transaction_hash: &str,
        status: HistoryStatus,
        details: Option<serde_json::Value>,
    ) -> Option<TransactionHistoryItem> {
        let address = self.address()?;
        let mut item =
            TransactionHistoryItem::new(address, record_type, title, description, transaction_hash)
                .with_status(status);
        item.details = details;

        if let Err(e) = self.store.append_history(&item) {
            warn!(error = %e, "Failed to persist history entry");
        }
        self.history_cache.write().insert(0, item.clone());
        Some(item)
    }
}
