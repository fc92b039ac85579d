use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::{Event, EventPatch, NewEvent};
use crate::routes::AppState;
use crate::store;
use crate::utils::error::AppError;
use crate::utils::link::is_video_call_link;
use crate::utils::response::{created, empty_success, success};

/// Stand-in owner for the form entry point while there is no auth layer.
const DEFAULT_OWNER_ID: i64 = 1;

const FORM_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const FULL_DISPLAY_FORMAT: &str = "%A, %d/%m/%Y %H:%M";
const TIME_ONLY_FORMAT: &str = "%H:%M";

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = store::event::all_by_start(&state.pool).await?;

    Ok(success(events, "Events retrieved").into_response())
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<NewEvent>,
) -> Result<Response, AppError> {
    let event = store::event::create(&state.pool, &payload).await?;

    Ok(created(event, "Event created").into_response())
}

/// Form fields posted by the event edit page.
#[derive(Debug, Deserialize)]
pub struct EventForm {
    pub title: String,
    pub description: Option<String>,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

pub async fn create_event_from_form(
    State(state): State<AppState>,
    Form(form): Form<EventForm>,
) -> Result<Response, AppError> {
    let start = parse_form_datetime(&form.start_date, &form.start_time)?;
    let end = parse_form_datetime(&form.end_date, &form.end_time)?;

    if form.location_type.as_deref() == Some("vc_url") {
        let link = form.location.as_deref().unwrap_or_default();
        if !is_video_call_link(link) {
            return Err(AppError::ValidationError(format!(
                "Invalid video call link: {link}"
            )));
        }
    }

    let owner = match store::user::by_id(&state.pool, DEFAULT_OWNER_ID).await? {
        Some(user) => user,
        None => store::user::create(&state.pool, "u", "p", "e@mail.com").await?,
    };

    let event = store::event::create(
        &state.pool,
        &NewEvent {
            title: form.title,
            start_time: start,
            end_time: end,
            owner_id: owner.id,
            content: form.description,
            location: form.location,
        },
    )
    .await?;

    let view_url = format!("/event/{}", event.id);
    Ok((StatusCode::FOUND, [(header::LOCATION, view_url)]).into_response())
}

#[derive(Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub start_display: String,
    pub end_display: String,
}

pub async fn view_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let event = store::event::by_id(&state.pool, event_id).await?;

    // Same-day events only repeat the time of day for the end.
    let end_format = if event.start_time.date_naive() == event.end_time.date_naive() {
        TIME_ONLY_FORMAT
    } else {
        FULL_DISPLAY_FORMAT
    };

    let view = EventView {
        start_display: event.start_time.format(FULL_DISPLAY_FORMAT).to_string(),
        end_display: event.end_time.format(end_format).to_string(),
        event,
    };

    Ok(success(view, "Event retrieved").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(patch): Json<EventPatch>,
) -> Result<Response, AppError> {
    match store::event::update(&state.pool, event_id, &patch).await? {
        Some(event) => Ok(success(event, "Event updated").into_response()),
        None => Ok(empty_success("No changes applied").into_response()),
    }
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    store::event::delete(&state.pool, event_id).await?;

    Ok(empty_success("Event deleted").into_response())
}

pub async fn event_participants(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let emails = store::event::participant_emails(&state.pool, event_id).await?;

    Ok(success(emails, "Participants retrieved").into_response())
}

fn parse_form_datetime(date: &str, time: &str) -> Result<DateTime<Utc>, AppError> {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), FORM_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::ValidationError(format!("Invalid date or time: {date} {time}")))
}
