use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use application::{AuthSession, LoginRequest, RegisterUserRequest};
use domain::{ChatRoom, RoomId, UserId};

use crate::{
    auth::{bearer_token, require_session, Identity},
    error::ApiError,
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserPayload {
    #[serde(default)]
    handle: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    invite_token: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct VerifyCodePayload {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    user_id: UserId,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user_id: session.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InviteTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GreetingResponse {
    message: String,
    user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenStatusResponse {
    valid: bool,
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let protected = Router::new()
        .route("/boredRoom", get(bored_room))
        .route("/validate-token", post(validate_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/", get(health))
        .route("/create-user", post(create_user))
        .route("/login", post(login))
        .route("/verify-code", post(verify_code))
        .route("/rooms/{room_id}", get(get_room))
        .route("/ws", get(websocket_upgrade))
        .merge(protected)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 空列表或包含 `*` 时放行所有来源
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "忽略无效的 CORS 来源");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health() -> &'static str {
    "Server is up and running"
}

async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(payload) = payload?;
    let session = state
        .auth
        .register(RegisterUserRequest {
            handle: payload.handle,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            password: payload.password,
            invite_token: payload.invite_token,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(payload) = payload?;
    let session = state
        .auth
        .login(LoginRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok(Json(session.into()))
}

async fn verify_code(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCodePayload>, JsonRejection>,
) -> Result<Json<InviteTokenResponse>, ApiError> {
    let Json(payload) = payload?;
    let issued = state.auth.issue_invite_token(&payload.code).await?;

    Ok(Json(InviteTokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

async fn bored_room(Extension(Identity(user_id)): Extension<Identity>) -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: "Welcome to BoredRoom".to_string(),
        user_id,
    })
}

async fn validate_token(
    Extension(Identity(user_id)): Extension<Identity>,
) -> Json<TokenStatusResponse> {
    Json(TokenStatusResponse {
        valid: true,
        user_id,
    })
}

async fn get_room(
    State(state): State<AppState>,
    room_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ChatRoom>, ApiError> {
    let Path(room_id) = room_id?;
    let room = state.chat.get_room(RoomId::from(room_id)).await?;
    Ok(Json(room))
}

/// 令牌从 `?token=` 读取，也接受 Bearer 头；先认证再升级
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let token = query.token.as_deref().or_else(|| bearer_token(&headers));
    let user_id = state.auth.authenticate(token).map_err(|err| {
        warn!(error = %err, "拒绝 WebSocket 连接");
        ApiError::from(err)
    })?;
    let ws = ws.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(state, user_id).run(socket)))
}
