//! Resolving stimulus numbers to playable audio.

use api::TestType;

use crate::protocol::Activity;

use super::pool::StimulusPool;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("no recording for {phase}/{test_type} stimulus {stimulus}")]
    NotFound {
        phase: String,
        test_type: String,
        stimulus: u16,
    },
}

/// Audio delivery service (`resolveStimulusUrl`).
pub trait AudioResolver {
    fn resolve_stimulus_url(
        &self,
        activity: &Activity,
        stimulus: u16,
    ) -> Result<String, AudioError>;
}

/// Builds `{base}/{phase}/{test}/{stimulus}.wav` and rejects numbers outside the pool.
#[derive(Debug, Clone)]
pub struct UrlTemplateResolver {
    base_url: String,
}

impl UrlTemplateResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl AudioResolver for UrlTemplateResolver {
    fn resolve_stimulus_url(
        &self,
        activity: &Activity,
        stimulus: u16,
    ) -> Result<String, AudioError> {
        let not_found = || AudioError::NotFound {
            phase: activity.phase_label().to_string(),
            test_type: activity.test_label(),
            stimulus,
        };

        let pool: StimulusPool = activity.stimulus_pool().ok_or_else(not_found)?;
        if !pool.contains(stimulus) {
            return Err(not_found());
        }

        Ok(format!(
            "{}/{}/{}/{}.wav",
            self.base_url,
            activity.phase_label(),
            activity.test_label(),
            stimulus
        ))
    }
}

/// What the activity screen can do with the current stimulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StimulusPresentation {
    Playable(String),
    /// Resolution failed; the participant may answer with the `"NA"` sentinel.
    Unavailable,
}

impl StimulusPresentation {
    /// `None` for activities that play no audio, such as the demographics form.
    pub fn resolve(
        resolver: &dyn AudioResolver,
        activity: &Activity,
        stimulus: u16,
    ) -> Option<Self> {
        activity.stimulus_pool()?;
        let presentation = match resolver.resolve_stimulus_url(activity, stimulus) {
            Ok(url) => Self::Playable(url),
            Err(err) => {
                log::warn!("audio unavailable, offering NA fallback: {err}");
                Self::Unavailable
            }
        };
        Some(presentation)
    }
}

/// Whether the activity collects a listening-effort rating with each response.
pub fn collects_rating(activity: &Activity) -> bool {
    matches!(activity.test_type(), Some(TestType::Effort))
}
