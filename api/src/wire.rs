//! Request and record payloads, camelCase on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One answered stimulus (`submitResponse`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSubmission {
    /// Client-generated id so the server can drop replays of the same submission.
    pub request_id: String,
    pub phase: String,
    pub test_type: String,
    pub stimulus_id: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    pub is_test_completed: bool,
}

/// Explicit completion flag for a whole activity (`markTestCompleted`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMark {
    pub phase: String,
    pub test_type: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAck {
    /// The server's view of the account after the call, when it chooses to send it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountRecord>,
}

/// Participant account as persisted by the server.
///
/// Dates stay strings here; the client parses them tolerantly so older records with
/// full timestamps keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub user_id: String,
    #[serde(default)]
    pub current_phase: String,
    #[serde(default = "first_training_day")]
    pub training_day: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretest_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_completed_date: Option<String>,
    #[serde(default)]
    pub completed_tests: BTreeMap<String, bool>,
}

fn first_training_day() -> u8 {
    1
}
