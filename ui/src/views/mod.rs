mod activity;
mod context;
mod home;
mod labels;

pub use activity::ActivityPage;
pub use context::{provide_study_context, try_use_study, use_study, SharedStore, StudyContext};
pub use home::Home;
pub use labels::{activity_label, lock_label, stage_label, status_label};
