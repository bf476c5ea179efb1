use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;

/// Comment joined with its author's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub owner_full_name: String,
    pub owner_username: String,
    pub owner_avatar_url: String,
}

const SELECT_JOINED: &str = r#"
    SELECT c.id, c.video_id, c.owner_id, c.content, c.created_at, c.updated_at,
           o.full_name AS owner_full_name,
           o.username AS owner_username,
           o.avatar_url AS owner_avatar_url
    FROM comments c
    JOIN users o ON o.id = c.owner_id
"#;

pub async fn list_by_video(
    db: &PgPool,
    video_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<CommentRow>> {
    let sql = format!(
        "{SELECT_JOINED} WHERE c.video_id = $1 ORDER BY c.created_at DESC LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, CommentRow>(&sql)
        .bind(video_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn get_by_id(db: &PgPool, id: Uuid) -> AppResult<Option<CommentRow>> {
    let sql = format!("{SELECT_JOINED} WHERE c.id = $1");
    let row = sqlx::query_as::<_, CommentRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Insert and return the new comment's id; the caller re-reads the joined
/// row for the response.
pub async fn insert(
    db: &PgPool,
    video_id: Uuid,
    owner_id: Uuid,
    content: &str,
) -> AppResult<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO comments (video_id, owner_id, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(video_id)
    .bind(owner_id)
    .bind(content)
    .fetch_one(db)
    .await?;
    Ok(id)
}

/// Owner-scoped update; false when the comment is absent or not owned.
pub async fn update_owned(
    db: &PgPool,
    id: Uuid,
    owner_id: Uuid,
    content: &str,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE comments SET content = $3, updated_at = now()
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(content)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_owned(db: &PgPool, id: Uuid, owner_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM comments
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}
