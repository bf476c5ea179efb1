use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String, // stored lowercase
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub avatar_url: String,
    pub cover_image_url: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>, // the single live refresh token
    pub watch_history: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Channel read view: public fields plus the subscription aggregates.
#[derive(Debug, Clone, FromRow)]
pub struct ChannelProfileRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub created_at: OffsetDateTime,
    pub subscriber_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

/// One watch-history entry: the video joined with its owner's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct WatchHistoryRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: i32,
    pub views: i64,
    pub created_at: OffsetDateTime,
    pub owner_full_name: String,
    pub owner_username: String,
    pub owner_avatar_url: String,
}
