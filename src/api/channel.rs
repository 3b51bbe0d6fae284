/// Channel endpoints: profile aggregation and subscription edges
use crate::{
    auth::{Identity, OptionalIdentity},
    channel::ChannelProfile,
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

/// Build channel routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/:handle", get(channel_profile))
        .route("/:handle/subscribe", post(subscribe).delete(unsubscribe))
}

/// Channel profile endpoint. Works unauthenticated; a valid viewer
/// identity additionally resolves the isSubscribed flag.
async fn channel_profile(
    State(ctx): State<AppContext>,
    Path(handle): Path<String>,
    viewer: OptionalIdentity,
) -> ApiResult<Json<ChannelProfile>> {
    let viewer_id = viewer.user.as_ref().map(|u| u.id.as_str());
    let profile = ctx.channels.channel_profile(&handle, viewer_id).await?;

    Ok(Json(profile))
}

/// Subscribe the authenticated viewer to a channel
async fn subscribe(
    State(ctx): State<AppContext>,
    Path(handle): Path<String>,
    identity: Identity,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.channels.subscribe(&identity.user.id, &handle).await?;

    Ok(Json(serde_json::json!({ "message": "Subscribed" })))
}

/// Remove the authenticated viewer's subscription to a channel
async fn unsubscribe(
    State(ctx): State<AppContext>,
    Path(handle): Path<String>,
    identity: Identity,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.channels.unsubscribe(&identity.user.id, &handle).await?;

    Ok(Json(serde_json::json!({ "message": "Unsubscribed" })))
}
