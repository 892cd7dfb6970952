use dioxus::prelude::*;

use ui::components::app_navbar::{register_nav, NavBuilder};
use ui::components::AppNavbar;
use ui::config::StudyConfig;
use ui::views::{provide_study_context, ActivityPage, Home};

#[derive(Debug, Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum Route {
    #[layout(WebNavbar)]
    #[route("/")]
    Home {},
    #[route("/activity/:activity_key")]
    ActivityPage { activity_key: String },
}

const MAIN_CSS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../ui/assets/theme/main.css"
));

/// Audio location baked in at build time, e.g. a CDN prefix.
const AUDIO_BASE_URL: Option<&str> = option_env!("HEARCOURSE_AUDIO_BASE_URL");

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

fn study_config() -> StudyConfig {
    let mut config = StudyConfig::default();
    if let Some(base) = AUDIO_BASE_URL {
        config.audio_base_url = base.trim_end_matches('/').to_string();
    }
    config
}

fn main() {
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    ui::i18n::init();
    register_nav(NavBuilder {
        home: nav_home,
        activity: nav_activity,
    });

    let lang_code = use_signal(|| "en-US".to_string());
    use_context_provider(|| lang_code);
    provide_study_context(study_config());

    rsx! {
        document::Style { "{MAIN_CSS}" }
        Router::<Route> {}
    }
}

#[component]
fn WebNavbar() -> Element {
    rsx! {
        AppNavbar {}
        Outlet::<Route> {}
    }
}
