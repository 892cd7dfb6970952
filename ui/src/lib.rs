//! Shared crate for Hearcourse: the randomization engine, progress persistence, the
//! progression state machine and the views every launcher renders.

pub mod config;
pub mod core;
pub mod i18n;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod stimuli;
pub mod sync;
pub mod views;

pub mod components {
    pub mod app_navbar;
    pub use app_navbar::register_nav;
    pub use app_navbar::AppNavbar;
    pub use app_navbar::NavBuilder;
}
