use dioxus::prelude::*;

use crate::components::app_navbar::nav_builder;
use crate::core::timing::{self, format_calendar_date};
use crate::protocol::{evaluate, Activity, ActivityBoard, ActivityCard, ActivityStatus, Stage};
use crate::t;

use super::context::use_study;
use super::labels::{activity_label, lock_label, section_label, stage_label, status_label};

#[component]
pub fn Home() -> Element {
    let _lang_code: Option<Signal<String>> = try_use_context::<Signal<String>>();
    let _lang_marker = _lang_code.as_ref().map(|s| s()).unwrap_or_default();

    let study = use_study();
    let user_id = (study.user_id)();

    rsx! {
        div { style: "display:none", "{_lang_marker}" }
        section { class: "page page-home",
            h1 { {t!("home-title")} }
            {match user_id {
                Some(user_id) => rsx! { ParticipantBoard { user_id } },
                None => rsx! { ParticipantForm {} },
            }}
        }
    }
}

#[component]
fn ParticipantForm() -> Element {
    let mut study = use_study();
    let mut draft = use_signal(String::new);

    rsx! {
        p { {t!("home-intro")} }
        form {
            class: "participant-form",
            onsubmit: move |evt: FormEvent| {
                evt.prevent_default();
                study.sign_in(&draft());
            },
            label { r#for: "participant-id", {t!("home-participant-label")} }
            input {
                id: "participant-id",
                r#type: "text",
                autocomplete: "off",
                value: "{draft}",
                oninput: move |evt: FormEvent| draft.set(evt.value()),
            }
            button { r#type: "submit", disabled: draft().trim().is_empty(),
                {t!("home-participant-start")}
            }
        }
    }
}

#[component]
fn ParticipantBoard(user_id: String) -> Element {
    let study = use_study();
    let revision = (study.revision)();
    let mut confirming_reset = use_signal(|| false);

    let flush_ctx = study.clone();
    let flush_user = user_id.clone();
    use_future(move || {
        let ctx = flush_ctx.clone();
        let user_id = flush_user.clone();
        async move {
            let delivered = ctx.client(&user_id).flush_outbox().await;
            if delivered > 0 {
                log::debug!("delivered {delivered} parked completion(s) for {user_id}");
                let mut ctx = ctx;
                ctx.bump();
            }
        }
    });

    let board = match load_board(&study, &user_id) {
        Ok(board) => board,
        Err(err) => {
            log::warn!("could not load account for {user_id}: {err}");
            return rsx! { p { class: "page-home__error", {t!("error-server")} } };
        }
    };
    let stage = match study.participant(&user_id) {
        Ok(participant) => participant.stage(),
        Err(_) => Stage::DemographicsPending,
    };

    let sections = [
        None,
        Some(api::Phase::Pretest),
        Some(api::Phase::Training),
        Some(api::Phase::Posttest1),
        Some(api::Phase::Posttest2),
    ];

    let on_reset = {
        let mut study = study.clone();
        let user_id = user_id.clone();
        move |_| {
            if !confirming_reset() {
                confirming_reset.set(true);
                return;
            }
            confirming_reset.set(false);
            if let Err(err) = study.reset_participant(&user_id) {
                log::warn!("could not reset {user_id}: {err}");
            }
        }
    };
    let reset_label = if confirming_reset() {
        t!("home-reset-confirm")
    } else {
        t!("home-reset")
    };

    rsx! {
        div { style: "display:none", "rev={revision}" }
        p { class: "page-home__stage", {stage_label(stage)} }
        p { {t!("home-intro")} }
        {summary(&board, stage)}

        for phase in sections {
            section { class: "board__section", key: "{section_label(phase)}",
                h2 { {section_label(phase)} }
                ul { class: "board__cards",
                    for card in board.cards_in(phase).cloned().collect::<Vec<_>>() {
                        BoardCard { key: "{card.activity}", card }
                    }
                }
            }
        }

        button { class: "page-home__reset", onclick: on_reset, "{reset_label}" }
    }
}

fn load_board(study: &super::context::StudyContext, user_id: &str) -> Result<ActivityBoard, String> {
    let participant = study.participant(user_id)?;
    let progress = study.progress();
    Ok(evaluate(
        &participant,
        timing::today(),
        &progress,
        &study.config.schedule,
    ))
}

fn summary(board: &ActivityBoard, stage: Stage) -> Element {
    if stage == Stage::Completed {
        return rsx! { p { class: "page-home__summary", {t!("home-all-done")} } };
    }
    if board.can_proceed_today() {
        return rsx! {};
    }
    match board.next_unlock() {
        Some(date) => rsx! {
            p { class: "page-home__summary",
                {t!("home-next-unlock", date = format_calendar_date(date))}
            }
        },
        None => rsx! { p { class: "page-home__summary", {t!("home-nothing-today")} } },
    }
}

#[component]
fn BoardCard(card: ActivityCard) -> Element {
    let label = activity_label(&card.activity);
    let status_class = format!("board__card board__card--{}", card.status.as_str());
    let action = match card.status {
        ActivityStatus::Available => Some(t!("action-start")),
        ActivityStatus::InProgress => Some(t!("action-resume")),
        _ => None,
    };
    let link = action.and_then(|text| activity_link(&card.activity, &text));

    rsx! {
        li { class: "{status_class}",
            span { class: "board__card-title", "{label}" }
            span { class: "board__card-status", {status_label(card.status)} }
            if let Some(reason) = card.lock_reason {
                span { class: "board__card-reason", {lock_label(reason, card.unlocks_on)} }
            }
            if let Some(link) = link {
                {link}
            }
        }
    }
}

fn activity_link(activity: &Activity, text: &str) -> Option<Element> {
    nav_builder().map(|builder| (builder.activity)(&activity.completion_key(), text))
}
