//! Talking to the completion API without ever freezing the participant.
//!
//! Every call is bounded: a per-attempt timeout, a fixed number of attempts with a
//! fixed pause between them, then a classified error. Completion marks that still fail
//! are parked in a local outbox and re-sent on the next flush.

mod client;
mod local;
mod retry;

pub use client::{CompletionClient, SyncError};
pub use local::LocalCompletionApi;
pub use retry::{with_retry, with_timeout, RetryPolicy};
