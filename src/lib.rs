//! bioledger - ledger transaction submission and confirmation pipeline
//!
//! Domain records (samples, experimental data, permissions, workflow tasks,
//! IP contributions) are written through a connected wallet signer, retried on
//! sequence conflicts, confirmed by polling and recorded in a per-wallet
//! history.

pub mod classifier;
pub mod config;
pub mod contracts;
pub mod encoding;
pub mod gateway;
pub mod history;
pub mod metrics;
pub mod poller;
pub mod session;
pub mod signer;
pub mod store;
pub mod structured_logging;
pub mod submitter;
pub mod test_utils;

pub use classifier::{classify, ClassifiedError, ErrorKind, RawFailure};
pub use config::Config;
pub use gateway::{HttpLedgerGateway, LedgerGateway};
pub use poller::{ConfirmationPoller, ConfirmationResult};
pub use session::{Notification, WalletSession};
pub use signer::Signer;
pub use submitter::{TransactionRequest, TransactionSubmitter};
