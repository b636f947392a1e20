//! Route handlers.
//!
//! Handlers only see requests that made it through the pipeline, so the
//! request context is always present and the session identity, if any, has
//! already been decoded.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::request::SessionIdentity;
use crate::http::response::ApiError;
use crate::security::handshake::{HandshakeError, HandshakeUser, HandshakeValidator};
use crate::security::session::{SessionCodec, SessionCookieSettings};
use crate::store::{Message, MessageStore, NewMessage, User, UserStore};

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub messages: Arc<dyn MessageStore>,
    pub validator: Arc<HandshakeValidator>,
    pub codec: SessionCodec,
    pub cookies: SessionCookieSettings,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "initData")]
    pub init_data: String,
    /// Only honoured when the dev bypass accepted the payload.
    #[serde(default)]
    pub user: Option<HandshakeUser>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub client_id: String,
}

impl From<HandshakeError> for ApiError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::MissingHash | HandshakeError::InvalidSignature => {
                ApiError::Unauthorized("Invalid initData".to_string())
            }
            HandshakeError::Parse(_) => ApiError::Validation("Invalid initData".to_string()),
            HandshakeError::InvalidUser(_) => ApiError::Validation("Invalid user data".to_string()),
        }
    }
}

/// `POST /api/auth/telegram`
pub async fn telegram_auth(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;

    let verified = state.validator.validate(&request.init_data).map_err(|err| {
        tracing::warn!(error = %err, "Handshake rejected");
        ApiError::from(err)
    })?;

    let profile = match verified.parse_user()? {
        Some(profile) => profile,
        None if verified.dev_bypass => request
            .user
            .ok_or_else(|| ApiError::Validation("User data is required".to_string()))?,
        None => return Err(ApiError::Validation("User data is required".to_string())),
    };

    let user = state.users.upsert(profile)?;
    let token = state
        .codec
        .encrypt(user.id)
        .map_err(|_| ApiError::Internal("failed to seal session cookie".to_string()))?;
    let cookie = state.cookies.issue(token);

    tracing::info!(user_id = user.id, dev_bypass = verified.dev_bypass, "User logged in");

    Ok((
        [(header::SET_COOKIE, cookie.to_string())],
        Json(LoginResponse {
            success: true,
            user,
        }),
    ))
}

/// `POST /api/auth/logout`
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, state.cookies.expire().to_string())],
        Json(serde_json::json!({ "success": true })),
    )
}

/// `GET /api/user/me`
pub async fn current_user(
    State(state): State<AppState>,
    identity: SessionIdentity,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .get(identity.user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// `POST /api/message/`
pub async fn create_message(
    State(state): State<AppState>,
    body: Result<Json<NewMessage>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = body?;
    if [&new.client_id, &new.client_secret, &new.message, &new.name]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ApiError::Validation(
            "client_id, client_secret, message and name are required".to_string(),
        ));
    }

    let message = state.messages.create(new)?;
    tracing::info!(client_id = %message.client_id, message_id = %message.id, "Message created");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message,
        }),
    ))
}

/// `GET /api/message/?client_id=...`
pub async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<MessageList>, ApiError> {
    let client_id = query
        .ok()
        .map(|Query(q)| q.client_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("client_id is required".to_string()))?;

    Ok(Json(MessageList {
        messages: state.messages.list_by_client(&client_id)?,
    }))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
