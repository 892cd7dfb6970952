//! Study progression: which activity a participant may start, and how completing one
//! moves the account forward.
//!
//! Availability ([`availability::evaluate`]) is a pure read over the participant, the
//! date and the progress store. Only [`transitions::apply`] mutates the account, and it
//! is driven by completion events, never by rendering.

mod account;
mod activity;
pub mod availability;
mod completion;
pub mod transitions;

pub use account::{AccountPhaseState, DemographicsStatus, Participant, Stage};
pub use activity::{Activity, TestPhase, TrainingDay};
pub use availability::{evaluate, ActivityBoard, ActivityCard, ActivityStatus, LockReason};
pub use completion::CompletionRecord;
pub use transitions::{apply, reset, TransitionOutcome};
