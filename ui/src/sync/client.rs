use api::{ApiError, CompletionApi, CompletionMark, ResponseSubmission, SubmitAck};

use crate::core::storage::KeyValueStore;
use crate::progress::escape_segment;
use crate::protocol::Activity;

use super::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("could not reach the study server: {0}")]
    Network(ApiError),
    #[error("the study server rejected the request: {0}")]
    Server(ApiError),
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        if err.is_network() {
            SyncError::Network(err)
        } else {
            SyncError::Server(err)
        }
    }
}

impl SyncError {
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// Localized, retry-oriented message. Never includes internal details.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(_) => crate::t!("error-network"),
            SyncError::Server(_) => crate::t!("error-server"),
        }
    }
}

/// Completion API access for one participant, with retries and an outbox.
pub struct CompletionClient<A, S> {
    api: A,
    store: S,
    policy: RetryPolicy,
    user_id: String,
}

impl<A: CompletionApi, S: KeyValueStore> CompletionClient<A, S> {
    pub fn new(api: A, store: S, policy: RetryPolicy, user_id: impl Into<String>) -> Self {
        Self {
            api,
            store,
            policy,
            user_id: user_id.into(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Send one answered stimulus. When the submission carries the final-stimulus flag
    /// and cannot be delivered, the completion is parked in the outbox.
    pub async fn submit_response(
        &self,
        submission: &ResponseSubmission,
    ) -> Result<SubmitAck, SyncError> {
        let result = with_retry(&self.policy, "submitResponse", || {
            self.api.submit_response(submission)
        })
        .await;

        if let Err(err) = &result {
            if submission.is_test_completed && err.is_retryable() {
                self.enqueue(CompletionMark {
                    phase: submission.phase.clone(),
                    test_type: submission.test_type.clone(),
                    completed: true,
                });
            }
        }
        result.map_err(SyncError::from)
    }

    /// Mark `activity` completed on the server; parked in the outbox on failure.
    pub async fn mark_test_completed(&self, activity: &Activity) -> Result<SubmitAck, SyncError> {
        let mark = completion_mark(activity);
        let result = with_retry(&self.policy, "markTestCompleted", || {
            self.api.mark_test_completed(&mark)
        })
        .await;

        if let Err(err) = &result {
            if err.is_retryable() {
                self.enqueue(mark);
            }
        }
        result.map_err(SyncError::from)
    }

    /// Re-send parked completion marks once each. Returns how many were delivered.
    pub async fn flush_outbox(&self) -> usize {
        let pending = self.pending();
        if pending.is_empty() {
            return 0;
        }

        let mut remaining = Vec::new();
        let mut delivered = 0;
        for mark in pending {
            match with_retry(&self.policy, "outbox", || self.api.mark_test_completed(&mark)).await
            {
                Ok(_) => delivered += 1,
                Err(err) if err.is_retryable() => remaining.push(mark),
                Err(err) => {
                    log::warn!(
                        "dropping parked completion {}/{}: {err}",
                        mark.phase,
                        mark.test_type
                    );
                }
            }
        }
        self.write_outbox(&remaining);
        delivered
    }

    /// Completion marks still waiting for delivery.
    pub fn pending(&self) -> Vec<CompletionMark> {
        match self.store.get(&self.outbox_key()) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("discarding unreadable outbox for {}: {err}", self.user_id);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                log::warn!("could not read outbox for {}: {err}", self.user_id);
                Vec::new()
            }
        }
    }

    fn enqueue(&self, mark: CompletionMark) {
        let mut pending = self.pending();
        if !pending.contains(&mark) {
            pending.push(mark);
        }
        self.write_outbox(&pending);
    }

    fn write_outbox(&self, pending: &[CompletionMark]) {
        let key = self.outbox_key();
        let result = if pending.is_empty() {
            self.store.remove(&key)
        } else {
            match serde_json::to_string(pending) {
                Ok(raw) => self.store.set(&key, &raw),
                Err(err) => {
                    log::warn!("could not serialise outbox for {}: {err}", self.user_id);
                    return;
                }
            }
        };
        if let Err(err) = result {
            log::warn!("could not persist outbox for {}: {err}", self.user_id);
        }
    }

    fn outbox_key(&self) -> String {
        format!("outbox/{}", escape_segment(&self.user_id))
    }
}

pub(crate) fn completion_mark(activity: &Activity) -> CompletionMark {
    CompletionMark {
        phase: activity.phase_label().to_string(),
        test_type: activity.test_label(),
        completed: true,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::future::Future;

    use api::TestType;

    use super::*;
    use crate::core::storage::MemoryStore;
    use crate::protocol::TestPhase;

    #[derive(Default)]
    struct ScriptedApi {
        script: RefCell<VecDeque<Result<SubmitAck, ApiError>>>,
        marks: RefCell<Vec<CompletionMark>>,
        submissions: RefCell<Vec<ResponseSubmission>>,
    }

    impl ScriptedApi {
        fn failing(times: usize, err: ApiError) -> Self {
            let api = Self::default();
            api.script
                .borrow_mut()
                .extend(std::iter::repeat(Err(err)).take(times));
            api
        }

        fn next(&self) -> Result<SubmitAck, ApiError> {
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or(Ok(SubmitAck::default()))
        }
    }

    impl CompletionApi for ScriptedApi {
        async fn submit_response(
            &self,
            submission: &ResponseSubmission,
        ) -> Result<SubmitAck, ApiError> {
            self.submissions.borrow_mut().push(submission.clone());
            self.next()
        }

        async fn mark_test_completed(&self, mark: &CompletionMark) -> Result<SubmitAck, ApiError> {
            self.marks.borrow_mut().push(mark.clone());
            self.next()
        }
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff_ms: 1,
            timeout_ms: 100,
        }
    }

    fn effort() -> Activity {
        Activity::Test {
            phase: TestPhase::Pretest,
            test: TestType::Effort,
        }
    }

    fn final_submission() -> ResponseSubmission {
        ResponseSubmission {
            request_id: "req-1".into(),
            phase: "pretest".into(),
            test_type: "effort".into(),
            stimulus_id: "30".into(),
            response: "NA".into(),
            rating: Some(1),
            is_test_completed: true,
        }
    }

    #[test]
    fn failed_completion_is_parked_then_flushed() {
        let store = MemoryStore::new();
        let api = ScriptedApi::failing(3, ApiError::Network("offline".into()));
        let client = CompletionClient::new(api, &store, policy(), "p1");

        let err = block_on(client.mark_test_completed(&effort())).unwrap_err();
        assert!(err.is_network());
        assert_eq!(client.pending().len(), 1);

        assert_eq!(block_on(client.flush_outbox()), 1);
        assert!(client.pending().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn parked_marks_are_deduplicated() {
        let store = MemoryStore::new();
        let api = ScriptedApi::failing(6, ApiError::Timeout { timeout_ms: 100 });
        let client = CompletionClient::new(api, &store, policy(), "p1");
        let _ = block_on(client.mark_test_completed(&effort()));
        let _ = block_on(client.mark_test_completed(&effort()));
        assert_eq!(
            client.pending(),
            vec![CompletionMark {
                phase: "pretest".into(),
                test_type: "effort".into(),
                completed: true
            }]
        );
    }

    #[test]
    fn undelivered_final_submission_parks_completion() {
        let store = MemoryStore::new();
        let api = ScriptedApi::failing(3, ApiError::Network("offline".into()));
        let client = CompletionClient::new(api, &store, policy(), "p1");
        assert!(block_on(client.submit_response(&final_submission())).is_err());
        assert_eq!(client.api().submissions.borrow().len(), 3);
        assert_eq!(client.pending().len(), 1);
    }

    #[test]
    fn server_rejections_are_not_parked() {
        let store = MemoryStore::new();
        let api = ScriptedApi::failing(
            1,
            ApiError::Server {
                status: 409,
                message: "already completed".into(),
            },
        );
        let client = CompletionClient::new(api, &store, policy(), "p1");
        let err = block_on(client.mark_test_completed(&effort())).unwrap_err();
        assert!(!err.is_network());
        assert!(client.pending().is_empty());
    }

    #[test]
    fn user_messages_distinguish_network_from_server() {
        crate::i18n::init();
        crate::i18n::set_language("en-US").unwrap();
        let network = SyncError::from(ApiError::Network("x".into())).user_message();
        let server = SyncError::from(ApiError::Server {
            status: 500,
            message: "secret stack trace".into(),
        })
        .user_message();
        assert_ne!(network, server);
        assert!(network.to_lowercase().contains("connection"));
        assert!(!server.contains("secret"));
    }
}
