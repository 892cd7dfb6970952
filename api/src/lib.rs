//! Wire contract for the Hearcourse completion API.
//!
//! The server side (authentication, document storage) lives elsewhere; this crate only
//! pins down the vocabulary and payloads the client exchanges with it, plus the
//! [`CompletionApi`] seam the `ui` crate retries against.

mod error;
mod model;
mod wire;

pub use error::ApiError;
pub use model::{Phase, TestType, UnknownName};
pub use wire::{AccountRecord, CompletionMark, ResponseSubmission, SubmitAck};

/// Remote completion service.
///
/// Both calls must be idempotent on the server: replaying the same final-stimulus
/// submission or the same completion mark may not advance the account twice.
#[allow(async_fn_in_trait)]
pub trait CompletionApi {
    async fn submit_response(&self, submission: &ResponseSubmission)
        -> Result<SubmitAck, ApiError>;

    async fn mark_test_completed(&self, mark: &CompletionMark) -> Result<SubmitAck, ApiError>;
}
