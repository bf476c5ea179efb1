use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{ChannelProfileRow, User, WatchHistoryRow};
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// An uploaded file as received from the multipart boundary.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Registration form, assembled from multipart fields.
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<FileUpload>,
    pub cover_image: Option<FileUpload>,
}

impl RegisterInput {
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            &self.full_name,
            &self.username,
            &self.email,
            &self.password,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::Validation("all fields are required".into()));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(AppError::Validation("invalid email address".into()));
        }
        if self.avatar.is_none() {
            return Err(AppError::Validation("avatar file is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> AppResult<()> {
        let has_identifier = self
            .username
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false)
            || self
                .email
                .as_deref()
                .map(|e| !e.trim().is_empty())
                .unwrap_or(false);
        if !has_identifier {
            return Err(AppError::Validation("username or email is required".into()));
        }
        if self.password.trim().is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Public part of the user returned to clients. Never carries the password
/// hash or the refresh token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub watch_history: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            cover_image_url: user.cover_image_url,
            watch_history: user.watch_history,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Response returned after login: the sanitized user plus both tokens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub subscriber_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
    pub created_at: OffsetDateTime,
}

impl From<ChannelProfileRow> for ChannelProfile {
    fn from(row: ChannelProfileRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            cover_image_url: row.cover_image_url,
            subscriber_count: row.subscriber_count,
            channels_subscribed_to_count: row.channels_subscribed_to_count,
            is_subscribed: row.is_subscribed,
            created_at: row.created_at,
        }
    }
}

/// Minimal owner projection attached to each watch-history video.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub full_name: String,
    pub username: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: i32,
    pub views: i64,
    pub created_at: OffsetDateTime,
    pub owner: VideoOwner,
}

impl From<WatchHistoryRow> for WatchHistoryEntry {
    fn from(row: WatchHistoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            video_url: row.video_url,
            thumbnail_url: row.thumbnail_url,
            duration_seconds: row.duration_seconds,
            views: row.views,
            created_at: row.created_at,
            owner: VideoOwner {
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
    use bytes::Bytes;

    fn file() -> FileUpload {
        FileUpload {
            body: Bytes::from_static(b"fake-bytes"),
            content_type: "image/png".into(),
        }
    }

    fn valid_input() -> RegisterInput {
        RegisterInput {
            full_name: "Alice Example".into(),
            username: "Alice".into(),
            email: "alice@example.com".into(),
            password: "hunter2hunter2".into(),
            avatar: Some(file()),
            cover_image: None,
        }
    }

    #[test]
    fn register_accepts_valid_input() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn register_rejects_blank_text_fields() {
        for blank in ["", "   ", "\t\n"] {
            let mut input = valid_input();
            input.full_name = blank.into();
            assert!(matches!(
                input.validate(),
                Err(AppError::Validation(_))
            ));

            let mut input = valid_input();
            input.username = blank.into();
            assert!(input.validate().is_err());

            let mut input = valid_input();
            input.email = blank.into();
            assert!(input.validate().is_err());

            let mut input = valid_input();
            input.password = blank.into();
            assert!(input.validate().is_err());
        }
    }

    #[test]
    fn register_rejects_malformed_email() {
        let mut input = valid_input();
        input.email = "not-an-email".into();
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn email_regex_accepts_ordinary_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("alice@@example.com"));
        assert!(!is_valid_email("alice example@example.com"));
        assert!(!is_valid_email("alice@example"));
    }

    #[test]
    fn register_rejects_missing_avatar() {
        let mut input = valid_input();
        input.avatar = None;
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn register_tolerates_missing_cover_image() {
        let mut input = valid_input();
        input.cover_image = None;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn login_requires_some_identifier() {
        let req = LoginRequest {
            username: None,
            email: None,
            password: "pw".into(),
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn login_accepts_email_only_with_password() {
        let req = LoginRequest {
            username: None,
            email: Some("alice@example.com".into()),
            password: "pw".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn login_rejects_blank_password() {
        let req = LoginRequest {
            username: Some("alice".into()),
            email: None,
            password: "  ".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn public_user_never_serializes_secrets() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: "Alice Example".into(),
            password_hash: "$argon2id$secret".into(),
            avatar_url: "https://cdn/a.png".into(),
            cover_image_url: String::new(),
            refresh_token: Some("live-refresh-token".into()),
            watch_history: vec![],
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };

        // Both the raw row and the public projection must omit secrets.
        let row_json = serde_json::to_string(&user).unwrap();
        assert!(!row_json.contains("argon2"));
        assert!(!row_json.contains("live-refresh-token"));

        let public_json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!public_json.contains("argon2"));
        assert!(!public_json.contains("live-refresh-token"));
        assert!(public_json.contains("\"username\":\"alice\""));
        assert!(public_json.contains("avatarUrl"));
    }

    #[test]
    fn watch_history_entry_collapses_owner() {
        let row = WatchHistoryRow {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            video_url: "https://cdn/v.mp4".into(),
            thumbnail_url: "https://cdn/t.png".into(),
            duration_seconds: 42,
            views: 7,
            created_at: OffsetDateTime::UNIX_EPOCH,
            owner_full_name: "Bob".into(),
            owner_username: "bob".into(),
            owner_avatar_url: "https://cdn/b.png".into(),
        };
        let entry = WatchHistoryEntry::from(row);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["owner"]["username"], "bob");
        assert_eq!(json["owner"]["fullName"], "Bob");
        assert_eq!(json["owner"]["avatarUrl"], "https://cdn/b.png");
        // Only the three public owner fields.
        assert_eq!(json["owner"].as_object().unwrap().len(), 3);
    }
}
