use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{ChangePasswordRequest, FileUpload, LoginRequest, RegisterInput, UpdateAccountRequest};
use super::repo::NewUser;
use super::repo_types::{ChannelProfileRow, User, WatchHistoryRow};
use crate::auth::jwt::{JwtKeys, TokenPair};
use crate::auth::password;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Push one image to storage under a fresh key and return its public URL.
async fn upload_image(st: &AppState, folder: &str, file: &FileUpload) -> anyhow::Result<String> {
    let ext = ext_from_mime(&file.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, file.body.clone(), &file.content_type)
        .await
}

/// Registration: validate, check uniqueness, resolve media, persist.
/// All-or-nothing; no tokens are issued here.
pub async fn register(st: &AppState, input: RegisterInput) -> AppResult<User> {
    input.validate()?;

    let username = input.username.trim().to_lowercase();
    let email = input.email.trim().to_string();

    if User::find_by_username_or_email(&st.db, &username, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "user with this username or email already exists".into(),
        ));
    }

    let avatar_file = input
        .avatar
        .as_ref()
        .ok_or_else(|| AppError::Validation("avatar file is required".into()))?;
    let avatar_url = upload_image(st, "avatars", avatar_file).await.map_err(|e| {
        warn!(error = %e, "avatar upload failed");
        AppError::Validation("avatar file is required".into())
    })?;

    // Cover image is optional: a failed upload degrades to an empty URL
    // instead of aborting the registration.
    let cover_image_url = match &input.cover_image {
        Some(file) => match upload_image(st, "covers", file).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cover image upload failed, continuing without");
                String::new()
            }
        },
        None => String::new(),
    };

    let password_hash = password::hash_password(&input.password)?;

    let created = User::create(
        &st.db,
        &NewUser {
            username: &username,
            email: &email,
            full_name: input.full_name.trim(),
            password_hash: &password_hash,
            avatar_url: &avatar_url,
            cover_image_url: &cover_image_url,
        },
    )
    .await?;

    // Read the row back before returning it; a miss here is a storage
    // consistency fault, surfaced rather than retried.
    let user = User::find_by_id(&st.db, created.id)
        .await?
        .ok_or_else(|| AppError::Internal("user row missing after create".into()))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Login: verify credentials, issue a pair, persist the refresh token.
/// A prior session's refresh token is overwritten unconditionally.
pub async fn login(
    st: &AppState,
    keys: &JwtKeys,
    req: LoginRequest,
) -> AppResult<(User, TokenPair)> {
    req.validate()?;

    let username = req
        .username
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    let email = req.email.as_deref().unwrap_or("").trim().to_string();

    let user = User::find_by_username_or_email(&st.db, &username, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AppError::Authentication("invalid credentials".into()));
    }

    let pair = keys.sign_pair(user.id)?;
    User::set_refresh_token(&st.db, user.id, Some(&pair.refresh_token)).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((user, pair))
}

/// Exchange a refresh token for a new pair. One-shot: the stored token must
/// match the presented one exactly, and the swap is compare-and-set so a
/// raced duplicate exchange loses and is rejected as a replay.
pub async fn refresh_session(
    st: &AppState,
    keys: &JwtKeys,
    presented: &str,
) -> AppResult<TokenPair> {
    let claims = keys.verify_refresh(presented)?;

    let user = User::find_by_id(&st.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Authorization("invalid refresh token".into()))?;

    if user.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %user.id, "stale refresh token presented");
        return Err(AppError::Authorization(
            "refresh token expired or already used".into(),
        ));
    }

    let pair = keys.sign_pair(user.id)?;
    let rotated = User::rotate_refresh_token(&st.db, user.id, presented, &pair.refresh_token).await?;
    if !rotated {
        warn!(user_id = %user.id, "refresh rotation lost the race");
        return Err(AppError::Authorization(
            "refresh token expired or already used".into(),
        ));
    }

    info!(user_id = %user.id, "session refreshed");
    Ok(pair)
}

/// Clear the stored refresh token. Succeeds even when no session exists.
pub async fn logout(st: &AppState, user_id: Uuid) -> AppResult<()> {
    User::set_refresh_token(&st.db, user_id, None).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// Replace the password hash after verifying the old password. Existing
/// sessions stay valid: the refresh token is deliberately left untouched.
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    if req.old_password.trim().is_empty() || req.new_password.trim().is_empty() {
        return Err(AppError::Validation(
            "old and new password are required".into(),
        ));
    }

    let user = User::find_by_id(&st.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if !password::verify_password(&req.old_password, &user.password_hash)? {
        return Err(AppError::Authentication("invalid old password".into()));
    }

    let hash = password::hash_password(&req.new_password)?;
    User::set_password_hash(&st.db, user_id, &hash).await?;

    info!(user_id = %user_id, "password changed");
    Ok(())
}

pub async fn current_user(st: &AppState, user_id: Uuid) -> AppResult<User> {
    User::find_by_id(&st.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

pub async fn update_account(
    st: &AppState,
    user_id: Uuid,
    req: UpdateAccountRequest,
) -> AppResult<User> {
    let fields = [&req.full_name, &req.username, &req.email];
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::Validation("all fields are required".into()));
    }

    let username = req.username.trim().to_lowercase();
    User::update_details(
        &st.db,
        user_id,
        req.full_name.trim(),
        &username,
        req.email.trim(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("user not found".into()))
}

pub async fn update_avatar(
    st: &AppState,
    user_id: Uuid,
    file: Option<FileUpload>,
) -> AppResult<User> {
    let file = file.ok_or_else(|| AppError::Validation("avatar file is required".into()))?;
    let url = upload_image(st, "avatars", &file).await.map_err(|e| {
        warn!(error = %e, "avatar upload failed");
        AppError::Validation("avatar upload failed".into())
    })?;
    User::set_avatar_url(&st.db, user_id, &url)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

pub async fn update_cover_image(
    st: &AppState,
    user_id: Uuid,
    file: Option<FileUpload>,
) -> AppResult<User> {
    let file = file.ok_or_else(|| AppError::Validation("cover image file is required".into()))?;
    let url = upload_image(st, "covers", &file).await.map_err(|e| {
        warn!(error = %e, "cover image upload failed");
        AppError::Validation("cover image upload failed".into())
    })?;
    User::set_cover_image_url(&st.db, user_id, &url)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

pub async fn channel_profile(
    st: &AppState,
    username: &str,
    viewer: Option<Uuid>,
) -> AppResult<ChannelProfileRow> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::Validation("username is missing".into()));
    }
    User::channel_profile(&st.db, &username, viewer)
        .await?
        .ok_or_else(|| AppError::NotFound("channel does not exist".into()))
}

pub async fn watch_history(st: &AppState, user_id: Uuid) -> AppResult<Vec<WatchHistoryRow>> {
    User::watch_history(&st.db, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("video/mp4"), None);
    }

    #[tokio::test]
    async fn upload_image_builds_key_under_folder() {
        let state = AppState::fake();
        let file = FileUpload {
            body: Bytes::from_static(b"png-bytes"),
            content_type: "image/png".into(),
        };
        let url = upload_image(&state, "avatars", &file).await.unwrap();
        assert!(url.starts_with("https://cdn.fake.local/avatars/"));
        assert!(url.ends_with(".png"));
    }

    #[tokio::test]
    async fn upload_image_falls_back_to_bin_extension() {
        let state = AppState::fake();
        let file = FileUpload {
            body: Bytes::from_static(b"opaque"),
            content_type: "application/octet-stream".into(),
        };
        let url = upload_image(&state, "covers", &file).await.unwrap();
        assert!(url.ends_with(".bin"));
    }
}
