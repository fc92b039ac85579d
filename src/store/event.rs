use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use crate::models::event::{Event, EventPatch, NewEvent};
use crate::utils::error::AppError;

/// Strict ordering check between two instants: an event must start
/// before it ends.
pub fn is_date_before(start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start < end
}

/// The range that would result from applying `patch` on top of `current`
/// must still be ordered, whichever side the patch supplies.
fn dates_remain_ordered(current: &Event, patch: &EventPatch) -> bool {
    is_date_before(
        patch.start_time.unwrap_or(current.start_time),
        patch.end_time.unwrap_or(current.end_time),
    )
}

/// Creates an event and its owner association in one transaction.
pub async fn create(pool: &SqlitePool, new_event: &NewEvent) -> Result<Event, AppError> {
    if !is_date_before(new_event.start_time, new_event.end_time) {
        return Err(AppError::ValidationError(
            "Event must start before it ends".to_string(),
        ));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events
            (title, start_time, end_time, content, location, owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new_event.title)
    .bind(new_event.start_time)
    .bind(new_event.end_time)
    .bind(&new_event.content)
    .bind(&new_event.location)
    .bind(new_event.owner_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_events (user_id, event_id) VALUES (?, ?)")
        .bind(new_event.owner_id)
        .bind(event.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(event)
}

/// Gets a single event by id. More than one row for an id means the
/// store has lost its uniqueness guarantee.
pub async fn by_id(pool: &SqlitePool, event_id: i64) -> Result<Event, AppError> {
    let mut rows = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ? LIMIT 2")
        .bind(event_id)
        .fetch_all(pool)
        .await?;

    match rows.len() {
        0 => Err(AppError::NotFound(format!(
            "Event ID does not exist. ID: {event_id}"
        ))),
        1 => Ok(rows.remove(0)),
        _ => {
            error!(event_id, "multiple events returned for a supposedly unique id");
            Err(AppError::AmbiguousResult(format!(
                "Multiple events found when getting event. Expected only one. ID: {event_id}"
            )))
        }
    }
}

/// Applies a sparse patch to an event.
///
/// Returns `Ok(None)` when nothing changed: the patch was empty, the
/// resulting date range would be invalid, or persistence failed (the
/// transaction is rolled back, so no partial state is retained).
/// NotFound/AmbiguousResult from the initial lookup propagate as errors.
pub async fn update(
    pool: &SqlitePool,
    event_id: i64,
    patch: &EventPatch,
) -> Result<Option<Event>, AppError> {
    if patch.is_empty() {
        return Ok(None);
    }

    let current = by_id(pool, event_id).await?;

    if !dates_remain_ordered(&current, patch) {
        return Ok(None);
    }

    match apply_patch(pool, event_id, patch).await {
        Ok(()) => Ok(Some(by_id(pool, event_id).await?)),
        Err(e) => {
            warn!(event_id, error = %e, "event update rejected by the store");
            Ok(None)
        }
    }
}

async fn apply_patch(
    pool: &SqlitePool,
    event_id: i64,
    patch: &EventPatch,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    // COALESCE keeps every column the patch did not supply.
    sqlx::query(
        r#"
        UPDATE events
        SET title = COALESCE(?, title),
            start_time = COALESCE(?, start_time),
            end_time = COALESCE(?, end_time),
            content = COALESCE(?, content),
            location = COALESCE(?, location),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&patch.title)
    .bind(patch.start_time)
    .bind(patch.end_time)
    .bind(&patch.content)
    .bind(&patch.location)
    .bind(Utc::now())
    .bind(event_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

/// Deletes an event and every association row as one transactional unit.
/// Returns the participant emails collected before deletion.
pub async fn delete(pool: &SqlitePool, event_id: i64) -> Result<Vec<String>, AppError> {
    let event = by_id(pool, event_id).await?;
    let participants = participant_emails(pool, event_id).await?;

    let mut tx = pool.begin().await?;

    // Association rows go first; the event row is their foreign-key target.
    sqlx::query("DELETE FROM user_events WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if !participants.is_empty() && event.start_time > Utc::now() {
        // TODO: send cancellation notices to the participants.
        debug!(
            event_id,
            participants = participants.len(),
            "cancellation notices not sent"
        );
    }

    Ok(participants)
}

/// Email addresses of every user associated with the event.
pub async fn participant_emails(
    pool: &SqlitePool,
    event_id: i64,
) -> Result<Vec<String>, AppError> {
    let emails = sqlx::query_scalar::<_, String>(
        r#"
        SELECT users.email
        FROM users
        JOIN user_events ON user_events.user_id = users.id
        WHERE user_events.event_id = ?
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(emails)
}

/// All events ordered by their start.
pub async fn all_by_start(pool: &SqlitePool) -> Result<Vec<Event>, AppError> {
    let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY start_time ASC")
        .fetch_all(pool)
        .await?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_is_date_before_is_strict() {
        assert!(is_date_before(at(9), at(10)));
        assert!(!is_date_before(at(10), at(10)));
        assert!(!is_date_before(at(11), at(10)));
    }
}
