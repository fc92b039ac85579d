use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Association row marking a user as participant/owner of an event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserEvent {
    pub user_id: i64,
    pub event_id: i64,
}
