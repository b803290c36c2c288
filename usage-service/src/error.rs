use ledger_client::StoreError;

use crate::ingest::ValidationError;

/// Engine-level failure taxonomy. Validation failures are rejected
/// immediately with no retry; store failures surface to the caller.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
