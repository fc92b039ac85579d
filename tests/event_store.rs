use agenda_server::models::event::{EventPatch, NewEvent};
use agenda_server::models::user::UserEvent;
use agenda_server::store::{event, user};
use agenda_server::utils::error::AppError;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

fn jan_first(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
}

async fn seed_owner(pool: &SqlitePool) -> i64 {
    user::create(pool, "maya", "secret", "maya@example.com")
        .await
        .unwrap()
        .id
}

fn team_sync(owner_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> NewEvent {
    NewEvent {
        title: "Team sync".to_string(),
        start_time: start,
        end_time: end,
        owner_id,
        content: Some("weekly notes".to_string()),
        location: None,
    }
}

async fn association_rows(pool: &SqlitePool, event_id: i64) -> Vec<UserEvent> {
    sqlx::query_as("SELECT user_id, event_id FROM user_events WHERE event_id = ?")
        .bind(event_id)
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
async fn creating_an_event_adds_exactly_one_owner_association(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;

    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();

    assert_eq!(created.title, "Team sync");
    assert_eq!(created.owner_id, owner_id);

    let associations = association_rows(&pool, created.id).await;
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].user_id, owner_id);
}

#[sqlx::test]
async fn create_rejects_a_reversed_date_range(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;

    let result = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(9))).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));

    // Nothing was inserted in either table
    assert_eq!(count(&pool, "events").await, 0);
    assert_eq!(count(&pool, "user_events").await, 0);
}

#[sqlx::test]
async fn create_rejects_an_empty_range(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;

    let result = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(10))).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[sqlx::test]
async fn update_with_an_empty_patch_is_a_noop(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();

    let result = event::update(&pool, created.id, &EventPatch::default())
        .await
        .unwrap();
    assert!(result.is_none());

    let stored = event::by_id(&pool, created.id).await.unwrap();
    assert_eq!(stored.title, created.title);
    assert_eq!(stored.updated_at, created.updated_at);
}

#[sqlx::test]
async fn update_rejects_a_range_violation_from_either_side(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();

    // New start after the retained end
    let start_patch = EventPatch {
        start_time: Some(jan_first(12)),
        ..Default::default()
    };
    assert!(event::update(&pool, created.id, &start_patch)
        .await
        .unwrap()
        .is_none());

    // New end before the retained start
    let end_patch = EventPatch {
        end_time: Some(jan_first(9)),
        ..Default::default()
    };
    assert!(event::update(&pool, created.id, &end_patch)
        .await
        .unwrap()
        .is_none());

    let stored = event::by_id(&pool, created.id).await.unwrap();
    assert_eq!(stored.start_time, created.start_time);
    assert_eq!(stored.end_time, created.end_time);
}

#[sqlx::test]
async fn update_applies_partial_changes(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();

    let patch = EventPatch {
        title: Some("Quarterly review".to_string()),
        end_time: Some(jan_first(12)),
        ..Default::default()
    };

    let updated = event::update(&pool, created.id, &patch)
        .await
        .unwrap()
        .expect("patch should apply");

    assert_eq!(updated.title, "Quarterly review");
    assert_eq!(updated.end_time, jan_first(12));
    // Untouched fields are retained
    assert_eq!(updated.start_time, created.start_time);
    assert_eq!(updated.content, created.content);
    assert!(updated.updated_at >= created.updated_at);
}

#[sqlx::test]
async fn update_persistence_failure_leaves_the_row_unchanged(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();

    sqlx::query(
        "CREATE TRIGGER block_event_updates BEFORE UPDATE ON events \
         BEGIN SELECT RAISE(ABORT, 'update blocked'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let patch = EventPatch {
        title: Some("Doomed".to_string()),
        ..Default::default()
    };

    // Rejected as a no-op, not an error
    let result = event::update(&pool, created.id, &patch).await.unwrap();
    assert!(result.is_none());

    let stored = event::by_id(&pool, created.id).await.unwrap();
    assert_eq!(stored.title, "Team sync");
}

#[sqlx::test]
async fn delete_removes_the_event_and_every_association(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let guest = user::create(&pool, "noa", "secret", "noa@example.com")
        .await
        .unwrap();

    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();
    sqlx::query("INSERT INTO user_events (user_id, event_id) VALUES (?, ?)")
        .bind(guest.id)
        .bind(created.id)
        .execute(&pool)
        .await
        .unwrap();

    let participants = event::delete(&pool, created.id).await.unwrap();
    assert_eq!(participants.len(), 2);

    assert!(matches!(
        event::by_id(&pool, created.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(association_rows(&pool, created.id).await.is_empty());
}

#[sqlx::test]
async fn delete_failure_leaves_both_tables_unchanged(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();

    sqlx::query(
        "CREATE TRIGGER block_event_deletes BEFORE DELETE ON events \
         BEGIN SELECT RAISE(ABORT, 'delete blocked'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = event::delete(&pool, created.id).await;
    assert!(matches!(result, Err(AppError::DatabaseError(_))));

    // The association delete succeeded inside the transaction but must
    // have been rolled back with the rest
    assert_eq!(count(&pool, "events").await, 1);
    assert_eq!(count(&pool, "user_events").await, 1);
}

#[sqlx::test]
async fn fetching_a_missing_id_is_not_found(pool: SqlitePool) {
    assert!(matches!(
        event::by_id(&pool, 4242).await,
        Err(AppError::NotFound(_))
    ));
}

#[sqlx::test]
async fn duplicate_rows_for_one_id_are_ambiguous(pool: SqlitePool) {
    // Rebuild the table without its key to simulate a store that lost
    // its uniqueness guarantee
    sqlx::query("DROP TABLE events").execute(&pool).await.unwrap();
    sqlx::query(
        "CREATE TABLE events (
            id INTEGER NOT NULL,
            title TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            content TEXT,
            location TEXT,
            owner_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    for _ in 0..2 {
        sqlx::query(
            "INSERT INTO events
                (id, title, start_time, end_time, content, location, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, NULL, ?, ?, ?)",
        )
        .bind(7_i64)
        .bind("Doppelganger")
        .bind(jan_first(10))
        .bind(jan_first(11))
        .bind(1_i64)
        .bind(jan_first(9))
        .bind(jan_first(9))
        .execute(&pool)
        .await
        .unwrap();
    }

    assert!(matches!(
        event::by_id(&pool, 7).await,
        Err(AppError::AmbiguousResult(_))
    ));
}

#[sqlx::test]
async fn participant_emails_cover_every_joined_user(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;
    let guest = user::create(&pool, "noa", "secret", "noa@example.com")
        .await
        .unwrap();

    let created = event::create(&pool, &team_sync(owner_id, jan_first(10), jan_first(11)))
        .await
        .unwrap();
    sqlx::query("INSERT INTO user_events (user_id, event_id) VALUES (?, ?)")
        .bind(guest.id)
        .bind(created.id)
        .execute(&pool)
        .await
        .unwrap();

    let mut emails = event::participant_emails(&pool, created.id).await.unwrap();
    emails.sort();
    assert_eq!(emails, vec!["maya@example.com", "noa@example.com"]);
}

#[sqlx::test]
async fn events_are_listed_in_start_order(pool: SqlitePool) {
    let owner_id = seed_owner(&pool).await;

    for (title, start, end) in [
        ("Afternoon", jan_first(15), jan_first(16)),
        ("Morning", jan_first(8), jan_first(9)),
        ("Midday", jan_first(12), jan_first(13)),
    ] {
        let mut new_event = team_sync(owner_id, start, end);
        new_event.title = title.to_string();
        event::create(&pool, &new_event).await.unwrap();
    }

    let titles: Vec<String> = event::all_by_start(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect();

    assert_eq!(titles, vec!["Morning", "Midday", "Afternoon"]);
}
