use dioxus::prelude::*;
use once_cell::sync::OnceCell;

use crate::i18n;
use crate::t;
use crate::views::try_use_study;

const NAVBAR_CSS: Asset = asset!("/assets/styling/navbar.css");
const NAVBAR_CSS_INLINE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/styling/navbar.css"
));

/// Link constructors supplied by each launcher, so the shared views never name the
/// launcher's `Route` enum.
///
/// ```ignore
/// register_nav(NavBuilder {
///     home: |label| rsx!(Link { class: "navbar__link", to: Route::Home {}, "{label}" }),
///     activity: |key, label| rsx!(Link { to: Route::Activity { key: key.to_string() }, "{label}" }),
/// });
/// ```
pub struct NavBuilder {
    pub home: fn(label: &str) -> Element,
    /// Link to the activity with the given completion key.
    pub activity: fn(key: &str, label: &str) -> Element,
}

static NAV_BUILDER: OnceCell<NavBuilder> = OnceCell::new();

pub fn register_nav(builder: NavBuilder) {
    if NAV_BUILDER.set(builder).is_err() {
        log::debug!("navigation builder already registered");
    }
}

pub fn nav_builder() -> Option<&'static NavBuilder> {
    NAV_BUILDER.get()
}

#[component]
pub fn AppNavbar(children: Element) -> Element {
    i18n::init();

    let mut current_lang = use_signal(|| "en-US".to_string());
    let langs = use_signal(i18n::available_languages);
    let show_switcher = langs().len() > 1;
    let lang_code_ctx: Option<Signal<String>> = try_use_context::<Signal<String>>();
    let _lang_marker = lang_code_ctx.as_ref().map(|c| c()).unwrap_or_default();

    let study = try_use_study();
    let participant = study.as_ref().and_then(|ctx| (ctx.user_id)());

    let on_change = move |evt: FormEvent| {
        let val = evt.value();
        match i18n::set_language(&val) {
            Ok(()) => {
                current_lang.set(val.clone());
                if let Some(mut code) = lang_code_ctx {
                    code.set(val);
                }
            }
            Err(err) => log::warn!("could not switch language to {val}: {err}"),
        }
    };

    let on_switch = move |_| {
        if let Some(mut ctx) = study.clone() {
            ctx.sign_out();
        }
    };

    let home_link = nav_builder().map(|b| (b.home)(&t!("nav-home")));
    let tagline = t!("brand-tagline");

    rsx! {
        document::Link { rel: "stylesheet", href: NAVBAR_CSS }
        if cfg!(all(not(debug_assertions), not(target_arch = "wasm32"))) {
            document::Style { "{NAVBAR_CSS_INLINE}" }
        }

        header { id: "navbar", class: "navbar",
            div { style: "display:none", "{_lang_marker}" }
            div { class: "navbar__inner",
                div { class: "navbar__brand",
                    span { class: "navbar__brand-mark", "Hearcourse" }
                    span { class: "navbar__brand-subtitle", "{tagline}" }
                }

                nav { class: "navbar__links",
                    if let Some(link) = home_link {
                        {link}
                    }
                    {children}
                }

                if let Some(id) = participant {
                    div { class: "navbar__participant",
                        span { {t!("home-participant-current", id = id)} }
                        button {
                            class: "navbar__switch",
                            onclick: on_switch,
                            {t!("nav-switch-participant")}
                        }
                    }
                }

                if show_switcher {
                    div { class: "navbar__locale",
                        label { class: "visually-hidden", r#for: "locale-select",
                            {t!("nav-language-label")}
                        }
                        select {
                            id: "locale-select",
                            value: "{current_lang()}",
                            oninput: on_change,
                            for code in langs() {
                                option { key: "{code}", value: "{code}", "{code}" }
                            }
                        }
                    }
                }
            }
        }
    }
}
