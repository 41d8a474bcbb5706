pub mod config;
pub mod confirm;
pub mod errors;
pub mod ledger;

pub use confirm::{ProposalAction, ProposalToken, TokenCodec};
pub use errors::{ConfirmError, TokenError, TransferError};
pub use ledger::{Ledger, SharedLedger, TransferOutcome};
