use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::CommentRow;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentOwner {
    pub full_name: String,
    pub username: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub video_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub owner: CommentOwner,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            video_id: row.video_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner: CommentOwner {
                full_name: row.owner_full_name,
                username: row.owner_username,
                avatar_url: row.owner_avatar_url,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn comment_view_exposes_collapsed_owner() {
        let row = CommentRow {
            id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            content: "nice video".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            owner_full_name: "Carol".into(),
            owner_username: "carol".into(),
            owner_avatar_url: "https://cdn/c.png".into(),
        };
        let json = serde_json::to_value(CommentView::from(row)).unwrap();
        assert_eq!(json["owner"]["username"], "carol");
        assert!(json.get("ownerId").is_none());
    }
}
