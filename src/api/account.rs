/// User account endpoints: register, login, logout, refresh, profile
use crate::{
    account::{
        ChangePasswordRequest, LoginRequest, RefreshRequest, Registration, SessionResponse,
        UpdateProfileRequest,
    },
    api::middleware::{self, extract_refresh_cookie},
    auth::Identity,
    context::AppContext,
    db::user::UserProfile,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/change-password", post(change_password))
        .route("/me", get(current_user).patch(update_profile))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
}

/// Multipart registration form: text fields plus staged image files
#[derive(Default)]
struct RegistrationForm {
    full_name: Option<String>,
    handle: Option<String>,
    email: Option<String>,
    password: Option<String>,
    avatar_path: Option<PathBuf>,
    cover_path: Option<PathBuf>,
}

/// Register endpoint (multipart: fullName, handle, email, password,
/// avatar file required, coverImage file optional)
async fn register(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let form = parse_registration_form(&ctx, multipart).await?;

    // The avatar is required before anything touches the store
    let avatar_path = match &form.avatar_path {
        Some(path) => path.clone(),
        None => {
            discard_staged(&form).await;
            return Err(ApiError::Validation("Avatar image is required".to_string()));
        }
    };

    let registration = Registration {
        full_name: form.full_name.clone().unwrap_or_default(),
        handle: form.handle.clone().unwrap_or_default(),
        email: form.email.clone().unwrap_or_default(),
        password: form.password.clone().unwrap_or_default(),
    };

    let result = ctx
        .sessions
        .register(registration, &avatar_path, form.cover_path.as_deref())
        .await;

    match result {
        Ok(profile) => Ok((StatusCode::CREATED, Json(profile))),
        Err(e) => {
            // Staged files the media store never consumed
            discard_staged(&form).await;
            Err(e)
        }
    }
}

/// Login endpoint: issues a token pair and sets both cookies
async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let (user, pair) = ctx.sessions.login(&req.identifier, &req.password).await?;

    let jar = middleware::with_token_cookies(
        jar,
        pair.access_token.clone(),
        pair.refresh_token.clone(),
        &ctx.config.cookies,
    );

    Ok((
        jar,
        Json(SessionResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

/// Logout endpoint: clears the stored refresh token and both cookies
async fn logout(
    State(ctx): State<AppContext>,
    identity: Identity,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<serde_json::Value>)> {
    ctx.sessions.logout(&identity.user.id).await?;

    let jar = middleware::without_token_cookies(jar, &ctx.config.cookies);

    Ok((jar, Json(serde_json::json!({ "message": "Logged out" }))))
}

/// Refresh endpoint: the presented token comes from the refreshToken
/// cookie or, failing that, the request body
async fn refresh_token(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let presented = extract_refresh_cookie(&headers)
        .or_else(|| body.map(|Json(req)| req.refresh_token))
        .ok_or(ApiError::InvalidToken)?;

    let (user, pair) = ctx.sessions.refresh(&presented).await?;

    let jar = middleware::with_token_cookies(
        jar,
        pair.access_token.clone(),
        pair.refresh_token.clone(),
        &ctx.config.cookies,
    );

    Ok((
        jar,
        Json(SessionResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

/// Change password endpoint
async fn change_password(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.sessions
        .change_password(&identity.user.id, &req.old_password, &req.new_password)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Password changed" })))
}

/// Current user endpoint
async fn current_user(identity: Identity) -> Json<UserProfile> {
    Json(identity.user)
}

/// Profile update endpoint (full name and/or email)
async fn update_profile(
    State(ctx): State<AppContext>,
    identity: Identity,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let profile = ctx
        .sessions
        .update_profile(&identity.user.id, req.full_name, req.email)
        .await?;

    Ok(Json(profile))
}

/// Avatar update endpoint (multipart, single "avatar" file)
async fn update_avatar(
    State(ctx): State<AppContext>,
    identity: Identity,
    multipart: Multipart,
) -> ApiResult<Json<UserProfile>> {
    let path = stage_single_file(&ctx, multipart, "avatar").await?;
    let profile = ctx.sessions.update_avatar(&identity.user.id, &path).await?;

    Ok(Json(profile))
}

/// Cover image update endpoint (multipart, single "coverImage" file)
async fn update_cover_image(
    State(ctx): State<AppContext>,
    identity: Identity,
    multipart: Multipart,
) -> ApiResult<Json<UserProfile>> {
    let path = stage_single_file(&ctx, multipart, "coverImage").await?;
    let profile = ctx
        .sessions
        .update_cover_image(&identity.user.id, &path)
        .await?;

    Ok(Json(profile))
}

async fn parse_registration_form(
    ctx: &AppContext,
    mut multipart: Multipart,
) -> ApiResult<RegistrationForm> {
    let mut form = RegistrationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "fullName" => form.full_name = Some(read_text(field).await?),
            "handle" => form.handle = Some(read_text(field).await?),
            "email" => form.email = Some(read_text(field).await?),
            "password" => form.password = Some(read_text(field).await?),
            "avatar" => form.avatar_path = Some(stage_field(ctx, field).await?),
            "coverImage" => form.cover_path = Some(stage_field(ctx, field).await?),
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart field: {}", e)))
}

/// Read a multipart body expected to contain exactly one named file
async fn stage_single_file(
    ctx: &AppContext,
    mut multipart: Multipart,
    expected: &str,
) -> ApiResult<PathBuf> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some(expected) {
            return stage_field(ctx, field).await;
        }
    }

    Err(ApiError::Validation(format!(
        "Missing {} file in request",
        expected
    )))
}

/// Write an uploaded field into the staging directory
async fn stage_field(
    ctx: &AppContext,
    field: axum::extract::multipart::Field<'_>,
) -> ApiResult<PathBuf> {
    let extension = field
        .file_name()
        .and_then(|n| Path::new(n).extension().and_then(|e| e.to_str()))
        .unwrap_or("bin")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read upload: {}", e)))?;
    if data.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }

    let tmp_dir = &ctx.config.storage.media_tmp_directory;
    tokio::fs::create_dir_all(tmp_dir).await?;

    let path = tmp_dir.join(format!("{}.{}", Uuid::new_v4(), extension));
    tokio::fs::write(&path, &data).await?;

    Ok(path)
}

/// Best-effort removal of staged files a failed request left behind
async fn discard_staged(form: &RegistrationForm) {
    for path in [&form.avatar_path, &form.cover_path].into_iter().flatten() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!("Failed to discard staged file {:?}: {}", path, e);
        }
    }
}
