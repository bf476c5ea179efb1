use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{ChannelProfileRow, User, WatchHistoryRow};
use crate::error::AppResult;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar_url: &'a str,
    pub cover_image_url: &'a str,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, full_name, password_hash, avatar_url,
                   cover_image_url, refresh_token, watch_history, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user matching either identifier. Callers lowercase the
    /// username before lookup; usernames are stored lowercase.
    pub async fn find_by_username_or_email(
        db: &PgPool,
        username: &str,
        email: &str,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, full_name, password_hash, avatar_url,
                   cover_image_url, refresh_token, watch_history, created_at, updated_at
            FROM users
            WHERE username = $1 OR email = $2
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, full_name, password_hash, avatar_url, cover_image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, full_name, password_hash, avatar_url,
                      cover_image_url, refresh_token, watch_history, created_at, updated_at
            "#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.full_name)
        .bind(new.password_hash)
        .bind(new.avatar_url)
        .bind(new.cover_image_url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Overwrite (or clear) the stored refresh token without touching the
    /// rest of the row. Used by login and logout.
    pub async fn set_refresh_token(
        db: &PgPool,
        id: Uuid,
        token: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET refresh_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Compare-and-swap rotation keyed on the token the caller presented.
    /// Returns false when the stored token already moved on, in which case
    /// the exchange must be rejected as a replay.
    pub async fn rotate_refresh_token(
        db: &PgPool,
        id: Uuid,
        presented: &str,
        next: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token = $3, updated_at = now()
            WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(presented)
        .bind(next)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Partial update, bypasses whole-row revalidation.
    pub async fn set_password_hash(db: &PgPool, id: Uuid, hash: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_details(
        db: &PgPool,
        id: Uuid,
        full_name: &str,
        username: &str,
        email: &str,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET full_name = $2, username = $3, email = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, full_name, password_hash, avatar_url,
                      cover_image_url, refresh_token, watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(username)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_avatar_url(db: &PgPool, id: Uuid, url: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar_url = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, full_name, password_hash, avatar_url,
                      cover_image_url, refresh_token, watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(url)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_cover_image_url(db: &PgPool, id: Uuid, url: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET cover_image_url = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, full_name, password_hash, avatar_url,
                      cover_image_url, refresh_token, watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(url)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Channel profile aggregates: subscriber count, subscribed-to count and
    /// whether the viewer (if any) follows this channel. An anonymous viewer
    /// binds NULL, and the EXISTS comparison is then never true.
    pub async fn channel_profile(
        db: &PgPool,
        username: &str,
        viewer: Option<Uuid>,
    ) -> AppResult<Option<ChannelProfileRow>> {
        let row = sqlx::query_as::<_, ChannelProfileRow>(
            r#"
            SELECT u.id, u.username, u.email, u.full_name, u.avatar_url,
                   u.cover_image_url, u.created_at,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                       AS subscriber_count,
                   (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                       AS channels_subscribed_to_count,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.channel_id = u.id AND s.subscriber_id = $2
                   ) AS is_subscribed
            FROM users u
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .bind(viewer)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Resolve the ordered watch history into video rows, each joined with
    /// its owner's public fields. Ordinality keeps the stored order.
    pub async fn watch_history(db: &PgPool, id: Uuid) -> AppResult<Vec<WatchHistoryRow>> {
        let rows = sqlx::query_as::<_, WatchHistoryRow>(
            r#"
            SELECT v.id, v.title, v.description, v.video_url, v.thumbnail_url,
                   v.duration_seconds, v.views, v.created_at,
                   o.full_name AS owner_full_name,
                   o.username AS owner_username,
                   o.avatar_url AS owner_avatar_url
            FROM users u
            CROSS JOIN unnest(u.watch_history) WITH ORDINALITY AS h(video_id, ord)
            JOIN videos v ON v.id = h.video_id
            JOIN users o ON o.id = v.owner_id
            WHERE u.id = $1
            ORDER BY h.ord
            "#,
        )
        .bind(id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
