//! Frontend setup errors

use stride_core::StorageError;
use stride_http::ClientError;
use thiserror::Error;

/// Why the session controller could not be assembled
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Browser storage unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Identity client unavailable: {0}")]
    Client(#[from] ClientError),
}
