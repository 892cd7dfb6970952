#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

#[cfg(feature = "desktop")]
use std::path::PathBuf;

#[cfg(feature = "desktop")]
use dioxus::desktop::{tao::window::WindowBuilder, Config};
use dioxus::prelude::*;

use ui::components::app_navbar::{register_nav, NavBuilder};
use ui::components::AppNavbar;
use ui::config::StudyConfig;
use ui::views::{provide_study_context, ActivityPage, Home};

#[derive(Debug, Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum Route {
    #[layout(DesktopNavbar)]
    #[route("/")]
    Home {},
    #[route("/activity/:activity_key")]
    ActivityPage { activity_key: String },
}

const MAIN_CSS_INLINE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../ui/assets/theme/main.css"
));

#[cfg(feature = "desktop")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting Hearcourse desktop v{}", env!("CARGO_PKG_VERSION"));

    LaunchBuilder::desktop()
        .with_cfg(
            Config::new()
                .with_window(
                    WindowBuilder::new()
                        .with_title(format!("Hearcourse – v{}", env!("CARGO_PKG_VERSION")))
                        .with_maximized(true),
                )
                .with_resource_directory(resolve_resource_dir()),
        )
        .launch(App);
}

#[cfg(all(feature = "server", not(feature = "desktop")))]
fn main() {
    env_logger::init();
    LaunchBuilder::server().launch(App);
}

fn nav_home(label: &str) -> Element {
    rsx!(Link { class: "navbar__link", to: Route::Home {}, "{label}" })
}

fn nav_activity(key: &str, label: &str) -> Element {
    rsx!(Link {
        class: "board__card-action",
        to: Route::ActivityPage { activity_key: key.to_string() },
        "{label}"
    })
}

/// `config.json` from the platform config directory, or the defaults.
fn study_config() -> StudyConfig {
    let Some(dirs) = directories::ProjectDirs::from("org", "Hearcourse", "Hearcourse") else {
        log::warn!("no home directory; using default study configuration");
        return StudyConfig::default();
    };
    let path = dirs.config_dir().join("config.json");
    match StudyConfig::load_or_default(&path) {
        Ok(config) => {
            log::info!("study configuration from {}", path.display());
            config
        }
        Err(err) => {
            log::warn!("ignoring {}: {err}", path.display());
            StudyConfig::default()
        }
    }
}

#[component]
fn App() -> Element {
    ui::i18n::init();

    let lang_code = use_signal(|| "en-US".to_string());
    use_context_provider(|| lang_code);
    provide_study_context(study_config());

    register_nav(NavBuilder {
        home: nav_home,
        activity: nav_activity,
    });

    rsx! {
        document::Style { "{MAIN_CSS_INLINE}" }
        div {
            key: "{lang_code()}",
            div { style: "display:none", "{lang_code()}" }
            Router::<Route> {}
        }
    }
}

#[cfg(feature = "desktop")]
fn resolve_resource_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../ui/assets"))
    }

    #[cfg(not(debug_assertions))]
    {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
            .unwrap_or_else(|| PathBuf::from("assets"))
    }
}

#[component]
fn DesktopNavbar() -> Element {
    rsx! {
        AppNavbar {}
        Outlet::<Route> {}
    }
}
