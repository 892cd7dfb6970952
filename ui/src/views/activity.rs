use dioxus::prelude::*;

use crate::components::app_navbar::nav_builder;
use crate::core::timing;
use crate::protocol::{evaluate, Activity};
use crate::session::{
    ActivityError, ActivitySession, Response, SessionError, SessionStep, MAX_RATING, MIN_RATING,
};
use crate::stimuli::{collects_rating, StimulusPresentation, UrlTemplateResolver};
use crate::t;

use super::context::{use_study, StudyContext};
use super::labels::activity_label;

#[component]
pub fn ActivityPage(activity_key: String) -> Element {
    let _lang_code: Option<Signal<String>> = try_use_context::<Signal<String>>();
    let _lang_marker = _lang_code.as_ref().map(|s| s()).unwrap_or_default();

    let study = use_study();
    let body = match ((study.user_id)(), activity_key.parse::<Activity>()) {
        (None, _) => rsx! { p { {t!("activity-no-participant")} } },
        (_, Err(_)) => rsx! { p { {t!("activity-not-found")} } },
        (Some(user_id), Ok(activity)) => rsx! {
            ActivityRunner { key: "{user_id}-{activity}", user_id, activity }
        },
    };

    rsx! {
        div { style: "display:none", "{_lang_marker}" }
        section { class: "page page-activity",
            {body}
            {home_link()}
        }
    }
}

#[derive(Clone, Copy)]
struct RunnerState {
    session: Signal<Result<ActivitySession, ActivityError>>,
    text: Signal<String>,
    rating: Signal<u8>,
    notice: Signal<Option<String>>,
    finished: Signal<bool>,
}

#[component]
fn ActivityRunner(user_id: String, activity: Activity) -> Element {
    let study = use_study();
    let opened = {
        let study = study.clone();
        let user_id = user_id.clone();
        move || open_session(&study, &user_id, activity)
    };
    let state = RunnerState {
        session: use_signal(opened),
        text: use_signal(String::new),
        rating: use_signal(|| MIN_RATING),
        notice: use_signal(|| None),
        finished: use_signal(|| false),
    };

    let title = activity_label(&activity);
    if (state.finished)() {
        return rsx! {
            h1 { "{title}" }
            p { class: "activity__done", {t!("activity-finished")} }
            if let Some(message) = (state.notice)() {
                p { class: "activity__notice", "{message}" }
            }
        };
    }

    let session = match &*state.session.read() {
        Ok(session) => session.clone(),
        Err(err) => {
            log::debug!("cannot open {activity} for {user_id}: {err}");
            let message = match err {
                ActivityError::Locked { .. } => t!("activity-locked"),
                ActivityError::NoStimuli(_) => t!("activity-not-found"),
            };
            return rsx! {
                h1 { "{title}" }
                p { "{message}" }
            };
        }
    };

    let Some(stimulus) = session.current_stimulus() else {
        return rsx! { h1 { "{title}" } };
    };
    let in_flight = session.submit_in_flight();
    let wants_rating = collects_rating(&activity);
    let current = session.position() + 1;
    let total = session.len();

    let on_submit = {
        let study = study.clone();
        let user_id = user_id.clone();
        move |evt: FormEvent| {
            evt.prevent_default();
            let response = if wants_rating {
                Response::rated((state.text)(), (state.rating)())
            } else {
                Response::text((state.text)())
            };
            submit(study.clone(), user_id.clone(), activity, state, response);
        }
    };
    let on_skip = {
        let study = study.clone();
        let user_id = user_id.clone();
        move |_| submit(study.clone(), user_id.clone(), activity, state, Response::not_available())
    };
    let on_confirm = {
        let study = study.clone();
        let user_id = user_id.clone();
        move |_| submit(study.clone(), user_id.clone(), activity, state, Response::text("completed"))
    };
    let on_restart = {
        let study = study.clone();
        let mut session_signal = state.session;
        move |_| {
            session_signal.with_mut(|opened| {
                if let Ok(session) = opened {
                    session.reset(&study.progress());
                }
            });
        }
    };

    if activity == Activity::Demographics {
        return rsx! {
            h1 { "{title}" }
            p { {t!("demographics-intro")} }
            button { class: "activity__submit", disabled: in_flight, onclick: on_confirm,
                {t!("demographics-confirm")}
            }
            if let Some(message) = (state.notice)() {
                p { class: "activity__notice", role: "alert", "{message}" }
            }
        };
    }

    let presentation = StimulusPresentation::resolve(
        &UrlTemplateResolver::new(study.config.audio_base_url.clone()),
        &activity,
        stimulus,
    );
    let submit_label = if in_flight {
        t!("activity-submitting")
    } else {
        t!("activity-submit")
    };
    let mut text = state.text;
    let mut rating = state.rating;

    rsx! {
        h1 { "{title}" }
        p { class: "activity__progress", {t!("activity-progress", current = current, total = total)} }
        if session.was_resumed() && current > 1 {
            p { class: "activity__resumed", {t!("activity-resumed")} }
        }

        {match presentation {
            Some(StimulusPresentation::Playable(url)) => rsx! {
                audio { key: "{url}", class: "activity__audio", controls: true, src: "{url}" }
            },
            Some(StimulusPresentation::Unavailable) => rsx! {
                div { class: "activity__unavailable", role: "status",
                    p { {t!("activity-audio-unavailable")} }
                    button { disabled: in_flight, onclick: on_skip, {t!("activity-use-na")} }
                }
            },
            None => rsx! {},
        }}

        form { class: "activity__form", onsubmit: on_submit,
            label { r#for: "response", {t!("activity-response-label")} }
            textarea {
                id: "response",
                rows: "3",
                value: "{text}",
                oninput: move |evt: FormEvent| text.set(evt.value()),
            }
            if wants_rating {
                label { r#for: "rating", {t!("activity-rating-label")} }
                input {
                    id: "rating",
                    r#type: "range",
                    min: "{MIN_RATING}",
                    max: "{MAX_RATING}",
                    value: "{rating}",
                    oninput: move |evt: FormEvent| {
                        if let Ok(value) = evt.value().parse::<u8>() {
                            rating.set(value);
                        }
                    },
                }
                span { class: "activity__rating-value", "{rating}" }
            }
            button {
                class: "activity__submit",
                r#type: "submit",
                disabled: in_flight || (!wants_rating && text().trim().is_empty()),
                "{submit_label}"
            }
        }

        if let Some(message) = (state.notice)() {
            p { class: "activity__notice", role: "alert", "{message}" }
        }
        button { class: "activity__restart", disabled: in_flight, onclick: on_restart,
            {t!("activity-restart")}
        }
    }
}

fn open_session(
    study: &StudyContext,
    user_id: &str,
    activity: Activity,
) -> Result<ActivitySession, ActivityError> {
    let progress = study.progress();
    let participant = study.participant(user_id).map_err(|err| {
        log::warn!("could not load account for {user_id}: {err}");
        ActivityError::Locked {
            activity,
            reason: None,
        }
    })?;
    let board = evaluate(&participant, timing::today(), &progress, &study.config.schedule);
    ActivitySession::open(&board, user_id, activity, &progress)
}

/// Send `response`, then advance locally whatever the server said.
fn submit(
    study: StudyContext,
    user_id: String,
    activity: Activity,
    mut state: RunnerState,
    response: Response,
) {
    let prepared = state.session.with_mut(|opened| {
        let session = opened.as_mut().map_err(|_| SessionError::Finished)?;
        let submission = session.submission(&response)?;
        session.begin_submit()?;
        Ok::<_, SessionError>(submission)
    });
    let submission = match prepared {
        Ok(submission) => submission,
        Err(SessionError::SubmitInFlight) => return,
        Err(err) => {
            log::warn!("not submitting {activity}: {err}");
            return;
        }
    };

    spawn(async move {
        let client = study.client(&user_id);
        match client.submit_response(&submission).await {
            Ok(_) => state.notice.set(None),
            Err(err) => state.notice.set(Some(err.user_message())),
        }

        let progress = study.progress();
        let step = state.session.with_mut(|opened| match opened {
            Ok(session) => match session.record(&response, &progress, timing::now_millis()) {
                Ok(step) => Some(step),
                Err(err) => {
                    log::warn!("could not record response for {activity}: {err}");
                    session.finish_submit();
                    None
                }
            },
            Err(_) => None,
        });

        match step {
            Some(SessionStep::Finished) => {
                if let Err(err) = client.mark_test_completed(&activity).await {
                    state.notice.set(Some(err.user_message()));
                }
                state.finished.set(true);
                let mut study = study;
                study.bump();
            }
            Some(SessionStep::Next(_)) => {
                state.text.set(String::new());
                state.rating.set(MIN_RATING);
            }
            None => {}
        }
    });
}

fn home_link() -> Element {
    match nav_builder() {
        Some(builder) => (builder.home)(&t!("activity-back-home")),
        None => rsx! {},
    }
}
