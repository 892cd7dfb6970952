//! A [`CompletionApi`] that keeps the account record and the responses in the local
//! key-value store. The launchers use it when no study server is configured.

use api::{
    AccountRecord, ApiError, CompletionApi, CompletionMark, ResponseSubmission, SubmitAck,
};

use crate::core::storage::{KeyValueStore, StoreError};
use crate::core::timing;
use crate::progress::{escape_segment, ProgressRepository};
use crate::protocol::{transitions, Activity, Participant};

pub struct LocalCompletionApi<S> {
    store: S,
    user_id: String,
}

impl<S: KeyValueStore> LocalCompletionApi<S> {
    pub fn new(store: S, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    /// The stored account, or a fresh one when none exists yet.
    pub fn account(&self) -> Result<AccountRecord, ApiError> {
        match self.store.get(&self.account_key()).map_err(store_error)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|err| ApiError::Server {
                status: 500,
                message: format!("stored account is unreadable: {err}"),
            }),
            None => Ok(Participant::new(self.user_id.clone()).to_account()),
        }
    }

    pub fn save_account(&self, record: &AccountRecord) -> Result<(), ApiError> {
        let raw = serde_json::to_string(record).map_err(|err| ApiError::Server {
            status: 500,
            message: err.to_string(),
        })?;
        self.store.set(&self.account_key(), &raw).map_err(store_error)
    }

    /// Every response stored for this participant, in submission order.
    pub fn responses(&self) -> Vec<ResponseSubmission> {
        match self.store.get(&self.responses_key()) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("stored responses for {} are unreadable: {err}", self.user_id);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                log::warn!("could not read responses for {}: {err}", self.user_id);
                Vec::new()
            }
        }
    }

    /// Administrative reset: the account starts over at the pretest and every local
    /// snapshot for the participant is discarded. Stored responses are kept.
    pub fn reset(&self, progress: &dyn ProgressRepository) -> Result<AccountRecord, ApiError> {
        let mut participant = Participant::from_account(&self.account()?, false);
        transitions::reset(&mut participant);
        let account = participant.to_account();
        self.save_account(&account)?;
        progress.clear_all(&self.user_id);
        progress.set_demographics_flag(&self.user_id, false);
        log::info!("reset study progress for {}", self.user_id);
        Ok(account)
    }

    fn complete(&self, activity: Activity) -> Result<SubmitAck, ApiError> {
        let mut participant = Participant::from_account(&self.account()?, false);
        let outcome = transitions::apply(&mut participant, activity, timing::today());
        if !outcome.is_noop() {
            log::debug!("{} completed {activity}: {outcome:?}", self.user_id);
        }
        let account = participant.to_account();
        self.save_account(&account)?;
        Ok(SubmitAck {
            account: Some(account),
        })
    }

    fn account_key(&self) -> String {
        format!("account/{}", escape_segment(&self.user_id))
    }

    fn responses_key(&self) -> String {
        format!("responses/{}", escape_segment(&self.user_id))
    }
}

impl<S: KeyValueStore> CompletionApi for LocalCompletionApi<S> {
    async fn submit_response(&self, submission: &ResponseSubmission) -> Result<SubmitAck, ApiError> {
        let activity = Activity::from_wire(&submission.phase, &submission.test_type)
            .ok_or_else(|| unknown_activity(&submission.phase, &submission.test_type))?;

        let mut responses = self.responses();
        if responses
            .iter()
            .all(|stored| stored.request_id != submission.request_id)
        {
            responses.push(submission.clone());
            let raw = serde_json::to_string(&responses).map_err(|err| ApiError::Server {
                status: 500,
                message: err.to_string(),
            })?;
            self.store
                .set(&self.responses_key(), &raw)
                .map_err(store_error)?;
        }

        if submission.is_test_completed {
            self.complete(activity)
        } else {
            Ok(SubmitAck { account: None })
        }
    }

    async fn mark_test_completed(&self, mark: &CompletionMark) -> Result<SubmitAck, ApiError> {
        let activity = Activity::from_wire(&mark.phase, &mark.test_type)
            .ok_or_else(|| unknown_activity(&mark.phase, &mark.test_type))?;
        if !mark.completed {
            return Ok(SubmitAck {
                account: Some(self.account()?),
            });
        }
        self.complete(activity)
    }
}

fn unknown_activity(phase: &str, test_type: &str) -> ApiError {
    ApiError::Server {
        status: 400,
        message: format!("unknown activity {phase}/{test_type}"),
    }
}

fn store_error(err: StoreError) -> ApiError {
    ApiError::Server {
        status: 507,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use api::{Phase, TestType};
    use futures::executor::block_on;
    use time::Duration;

    use super::*;
    use crate::core::storage::MemoryStore;
    use crate::progress::{ActivityProgressSnapshot, KvProgressRepository, ProgressKey};
    use crate::protocol::TestPhase;

    fn submission(request_id: &str, test: &str, last: bool) -> ResponseSubmission {
        ResponseSubmission {
            request_id: request_id.into(),
            phase: "pretest".into(),
            test_type: test.into(),
            stimulus_id: "12".into(),
            response: "the boy ran".into(),
            rating: None,
            is_test_completed: last,
        }
    }

    #[test]
    fn replayed_request_is_stored_once() {
        let api = LocalCompletionApi::new(MemoryStore::new(), "p1");
        block_on(api.submit_response(&submission("r1", "intelligibility", false))).unwrap();
        block_on(api.submit_response(&submission("r1", "intelligibility", false))).unwrap();
        assert_eq!(api.responses().len(), 1);
    }

    #[test]
    fn final_submission_completes_and_advances() {
        let api = LocalCompletionApi::new(MemoryStore::new(), "p1");
        for test in TestType::ORDERED {
            let ack =
                block_on(api.submit_response(&submission(test.as_str(), test.as_str(), true)))
                    .unwrap();
            assert!(ack.account.is_some());
        }
        let account = api.account().unwrap();
        assert_eq!(account.current_phase, Phase::Training.as_str());
        assert_eq!(account.training_day, 1);
        assert!(account.pretest_date.is_some());
        let participant = Participant::from_account(&account, false);
        assert!(participant.completions.battery_completed(TestPhase::Pretest));
    }

    #[test]
    fn completion_marks_are_idempotent() {
        let api = LocalCompletionApi::new(MemoryStore::new(), "p1");
        let mark = CompletionMark {
            phase: "demographics".into(),
            test_type: "form".into(),
            completed: true,
        };
        let first = block_on(api.mark_test_completed(&mark)).unwrap();
        let second = block_on(api.mark_test_completed(&mark)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reset_returns_to_pretest_and_clears_snapshots() {
        let store = Rc::new(MemoryStore::new());
        let api = LocalCompletionApi::new(store.clone(), "p1");
        let progress = KvProgressRepository::new(store.clone(), Duration::days(30));
        for test in TestType::ORDERED {
            block_on(api.submit_response(&submission(test.as_str(), test.as_str(), true)))
                .unwrap();
        }
        let day_one = ProgressKey::new(
            "p1",
            Activity::Training(crate::protocol::TrainingDay::FIRST),
        );
        let _ = progress.save(&day_one, &ActivityProgressSnapshot::new(0, "", timing::now_millis()));
        progress.set_demographics_flag("p1", true);
        assert!(progress.load(&day_one).is_some());

        let account = api.reset(&progress).unwrap();
        assert_eq!(account.current_phase, Phase::Pretest.as_str());
        assert_eq!(account.pretest_date, None);
        assert!(account.completed_tests.is_empty());
        assert_eq!(api.account().unwrap(), account);
        assert!(progress.load(&day_one).is_none());
        assert!(!progress.legacy_demographics_flag("p1"));
        assert_eq!(api.responses().len(), 3);
    }

    #[test]
    fn unknown_activity_is_a_client_error() {
        let api = LocalCompletionApi::new(MemoryStore::new(), "p1");
        let err = block_on(api.submit_response(&submission("r1", "vocabulary", false)))
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
