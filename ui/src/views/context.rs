//! State shared by every view: the configuration, the participant's store and who is
//! signed in. Launchers call [`provide_study_context`] once in their root component.

use std::rc::Rc;

use dioxus::prelude::*;

use crate::config::StudyConfig;
use crate::core::platform::Platform;
use crate::core::storage::{platform_store, KeyValueStore};
use crate::progress::{KvProgressRepository, ProgressRepository};
use crate::protocol::Participant;
use crate::sync::{CompletionClient, LocalCompletionApi};

const CURRENT_USER_KEY: &str = "session/user";

pub type SharedStore = Rc<dyn KeyValueStore>;

#[derive(Clone)]
pub struct StudyContext {
    pub config: Rc<StudyConfig>,
    pub store: SharedStore,
    pub user_id: Signal<Option<String>>,
    /// Bumped after every completion so boards re-evaluate.
    pub revision: Signal<u64>,
}

impl StudyContext {
    pub fn progress(&self) -> KvProgressRepository<SharedStore> {
        KvProgressRepository::new(self.store.clone(), self.config.progress.max_snapshot_age())
    }

    pub fn client(
        &self,
        user_id: &str,
    ) -> CompletionClient<LocalCompletionApi<SharedStore>, SharedStore> {
        CompletionClient::new(
            LocalCompletionApi::new(self.store.clone(), user_id),
            self.store.clone(),
            self.config.retry.clone(),
            user_id,
        )
    }

    /// The participant as the account record currently describes them.
    pub fn participant(&self, user_id: &str) -> Result<Participant, String> {
        let account = LocalCompletionApi::new(self.store.clone(), user_id)
            .account()
            .map_err(|err| err.to_string())?;
        let legacy_flag = self.progress().legacy_demographics_flag(user_id);
        Ok(Participant::from_account(&account, legacy_flag))
    }

    pub fn sign_in(&mut self, user_id: &str) {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return;
        }
        if let Err(err) = self.store.set(CURRENT_USER_KEY, user_id) {
            log::warn!("could not remember participant {user_id}: {err}");
        }
        self.user_id.set(Some(user_id.to_string()));
    }

    pub fn sign_out(&mut self) {
        if let Err(err) = self.store.remove(CURRENT_USER_KEY) {
            log::warn!("could not forget current participant: {err}");
        }
        self.user_id.set(None);
    }

    /// Start `user_id` over at the pretest and drop their saved progress.
    pub fn reset_participant(&mut self, user_id: &str) -> Result<(), String> {
        LocalCompletionApi::new(self.store.clone(), user_id)
            .reset(&self.progress())
            .map_err(|err| err.to_string())?;
        self.bump();
        Ok(())
    }

    pub fn bump(&mut self) {
        *self.revision.write() += 1;
    }
}

/// Install the [`StudyContext`] for the component tree below the caller.
pub fn provide_study_context(config: StudyConfig) -> StudyContext {
    use_context_provider(move || {
        let platform = Platform::current();
        log::info!(
            "{} build, progress kept in {}",
            platform.as_str(),
            platform.storage_backend()
        );
        let store = platform_store();
        let remembered = store.get(CURRENT_USER_KEY).ok().flatten();
        StudyContext {
            config: Rc::new(config),
            store,
            user_id: Signal::new(remembered),
            revision: Signal::new(0),
        }
    })
}

pub fn use_study() -> StudyContext {
    use_context::<StudyContext>()
}

pub fn try_use_study() -> Option<StudyContext> {
    try_use_context::<StudyContext>()
}
