use axum::{
    extract::{multipart::Field, DefaultBodyLimit, FromRef, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;

use super::dto::{
    AuthPayload, ChangePasswordRequest, ChannelProfile, FileUpload, LoginRequest, PublicUser,
    RefreshRequest, RegisterInput, TokenPayload, UpdateAccountRequest, WatchHistoryEntry,
};
use super::services;
use crate::auth::jwt::{AuthUser, JwtKeys, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-token", post(refresh_token))
        .route("/users/change-password", post(change_password))
        .route("/users/current-user", get(current_user))
        .route("/users/update-account", patch(update_account))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/cover-image", patch(update_cover_image))
        .route("/users/c/:username", get(channel_profile))
        .route("/users/history", get(watch_history))
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
}

fn session_cookie(name: &'static str, value: String, ttl: std::time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

fn with_session_cookies(
    jar: CookieJar,
    keys: &JwtKeys,
    access_token: String,
    refresh_token: String,
) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, access_token, keys.access_ttl))
        .add(session_cookie(
            REFRESH_COOKIE,
            refresh_token,
            keys.refresh_ttl,
        ))
}

fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((ACCESS_COOKIE, "")).path("/").build())
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/").build())
}

async fn read_file(field: Field<'_>) -> AppResult<FileUpload> {
    let content_type = field
        .content_type()
        .map(str::to_owned)
        .unwrap_or_else(|| "application/octet-stream".into());
    let body = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("failed to read uploaded file: {e}")))?;
    Ok(FileUpload { body, content_type })
}

async fn read_register_form(mp: &mut Multipart) -> AppResult<RegisterInput> {
    let mut input = RegisterInput::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let text_err = |e| AppError::Validation(format!("malformed multipart field: {e}"));
        match name.as_str() {
            "fullName" => input.full_name = field.text().await.map_err(text_err)?,
            "username" => input.username = field.text().await.map_err(text_err)?,
            "email" => input.email = field.text().await.map_err(text_err)?,
            "password" => input.password = field.text().await.map_err(text_err)?,
            "avatar" => input.avatar = Some(read_file(field).await?),
            "coverImage" => input.cover_image = Some(read_file(field).await?),
            _ => {}
        }
    }
    Ok(input)
}

async fn read_single_file(mp: &mut Multipart, field_name: &str) -> AppResult<Option<FileUpload>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some(field_name) {
            return Ok(Some(read_file(field).await?));
        }
    }
    Ok(None)
}

#[instrument(skip(state, multipart))]
async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<PublicUser>>)> {
    let input = read_register_form(&mut multipart).await?;
    let user = services::register(&state, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created(
            PublicUser::from(user),
            "user registered successfully",
        )),
    ))
}

#[instrument(skip(state, jar, payload))]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<ApiResponse<AuthPayload>>)> {
    let keys = JwtKeys::from_ref(&state);
    let (user, pair) = services::login(&state, &keys, payload).await?;
    let jar = with_session_cookies(
        jar,
        &keys,
        pair.access_token.clone(),
        pair.refresh_token.clone(),
    );
    Ok((
        jar,
        Json(ApiResponse::ok(
            AuthPayload {
                user: PublicUser::from(user),
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "user logged in successfully",
        )),
    ))
}

#[instrument(skip(state, jar))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<ApiResponse<serde_json::Value>>)> {
    services::logout(&state, user_id).await?;
    Ok((
        without_session_cookies(jar),
        Json(ApiResponse::ok(
            serde_json::json!({}),
            "user logged out successfully",
        )),
    ))
}

#[instrument(skip(state, jar, payload))]
async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> AppResult<(CookieJar, Json<ApiResponse<TokenPayload>>)> {
    // The refresh token arrives in the cookie or, failing that, the body.
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| payload.and_then(|Json(p)| p.refresh_token))
        .ok_or_else(|| AppError::Authorization("refresh token is missing".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let pair = services::refresh_session(&state, &keys, &presented).await?;
    let jar = with_session_cookies(
        jar,
        &keys,
        pair.access_token.clone(),
        pair.refresh_token.clone(),
    );
    Ok((
        jar,
        Json(ApiResponse::ok(
            TokenPayload {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "access token refreshed",
        )),
    ))
}

#[instrument(skip(state, payload))]
async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    services::change_password(&state, user_id, payload).await?;
    Ok(Json(ApiResponse::ok(
        serde_json::json!({}),
        "password changed successfully",
    )))
}

#[instrument(skip(state))]
async fn current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let user = services::current_user(&state, user_id).await?;
    Ok(Json(ApiResponse::ok(
        PublicUser::from(user),
        "current user fetched successfully",
    )))
}

#[instrument(skip(state, payload))]
async fn update_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateAccountRequest>,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let user = services::update_account(&state, user_id, payload).await?;
    Ok(Json(ApiResponse::ok(
        PublicUser::from(user),
        "account details updated successfully",
    )))
}

#[instrument(skip(state, multipart))]
async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let file = read_single_file(&mut multipart, "avatar").await?;
    let user = services::update_avatar(&state, user_id, file).await?;
    Ok(Json(ApiResponse::ok(
        PublicUser::from(user),
        "avatar updated successfully",
    )))
}

#[instrument(skip(state, multipart))]
async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let file = read_single_file(&mut multipart, "coverImage").await?;
    let user = services::update_cover_image(&state, user_id, file).await?;
    Ok(Json(ApiResponse::ok(
        PublicUser::from(user),
        "cover image updated successfully",
    )))
}

#[instrument(skip(state, viewer))]
async fn channel_profile(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<ChannelProfile>>> {
    let viewer_id = viewer.map(|AuthUser(id)| id);
    let row = services::channel_profile(&state, &username, viewer_id).await?;
    Ok(Json(ApiResponse::ok(
        ChannelProfile::from(row),
        "channel profile fetched successfully",
    )))
}

#[instrument(skip(state))]
async fn watch_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<WatchHistoryEntry>>>> {
    let rows = services::watch_history(&state, user_id).await?;
    let entries = rows.into_iter().map(WatchHistoryEntry::from).collect();
    Ok(Json(ApiResponse::ok(
        entries,
        "watch history fetched successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookies_are_http_only_and_secure() {
        let keys = JwtKeys::from_config(&crate::config::JwtConfig {
            access_secret: "a".into(),
            refresh_secret: "r".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            access_ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        });
        let jar = with_session_cookies(
            CookieJar::new(),
            &keys,
            "access-value".into(),
            "refresh-value".into(),
        );

        let access = jar.get(ACCESS_COOKIE).expect("access cookie set");
        assert_eq!(access.value(), "access-value");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.max_age(), Some(time::Duration::minutes(5)));

        let refresh = jar.get(REFRESH_COOKIE).expect("refresh cookie set");
        assert_eq!(refresh.value(), "refresh-value");
        assert_eq!(refresh.http_only(), Some(true));
        assert_eq!(refresh.secure(), Some(true));
        assert_eq!(refresh.max_age(), Some(time::Duration::minutes(60)));
    }
}
