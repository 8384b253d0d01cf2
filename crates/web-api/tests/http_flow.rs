mod support;

use application::{outbound_channel, CreateRoomRequest};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use support::{build_app, seed_code, TestApp};

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authorized(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn invite_token(app: &TestApp, code: &str) -> String {
    seed_code(app, code).await;
    let (status, body) = send_request(&app.router, post_json("/verify-code", json!({"code": code}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().expect("token").to_string()
}

fn registration(handle: &str, email: &str, invite_token: &str) -> Value {
    json!({
        "handle": handle,
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": email,
        "password": "analytical-engine",
        "inviteToken": invite_token
    })
}

#[tokio::test]
async fn root_reports_liveness() {
    let app = build_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Server is up and running");
}

#[tokio::test]
async fn invite_registration_login_flow() {
    let app = build_app();
    let invite = invite_token(&app, "100-200-300-400").await;

    let (status, created) = send_request(
        &app.router,
        post_json("/create-user", registration("ada", "ada@example.com", &invite)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let user_id = created["userId"].as_str().unwrap().parse::<Uuid>().unwrap();

    let (status, logged_in) = send_request(
        &app.router,
        post_json(
            "/login",
            json!({"email": "ada@example.com", "password": "analytical-engine"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged_in["userId"], user_id.to_string());
    let token = logged_in["token"].as_str().unwrap();

    let (status, validated) =
        send_request(&app.router, authorized("POST", "/validate-token", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(validated, json!({"valid": true, "userId": user_id.to_string()}));

    let (status, greeting) =
        send_request(&app.router, authorized("GET", "/boredRoom", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(greeting["userId"], user_id.to_string());

    // 注册返回的令牌同样有效
    let (status, _) = send_request(
        &app.router,
        authorized("GET", "/boredRoom", created["token"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invite_token_is_single_use_through_registration() {
    let app = build_app();
    let invite = invite_token(&app, "100-200-300-401").await;

    let (status, _) = send_request(
        &app.router,
        post_json("/create-user", registration("ada", "ada@example.com", &invite)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_request(
        &app.router,
        post_json(
            "/create-user",
            registration("grace", "grace@example.com", &invite),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CODE");

    let (status, body) = send_request(
        &app.router,
        post_json("/verify-code", json!({"code": "100-200-300-401"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CODE");
}

#[tokio::test]
async fn verify_code_rejects_unknown_and_malformed_codes() {
    let app = build_app();
    for (code, expected) in [
        ("999-999-999-999", "INVALID_CODE"),
        ("12-34", "INVALID_CODE"),
        ("", "MISSING_FIELD"),
    ] {
        let (status, body) =
            send_request(&app.router, post_json("/verify-code", json!({"code": code}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{code}");
        assert_eq!(body["code"], expected, "{code}");
    }
}

#[tokio::test]
async fn registration_validation_errors_are_bad_requests() {
    let app = build_app();
    let invite = invite_token(&app, "100-200-300-402").await;

    let mut digits = registration("ada", "ada@example.com", &invite);
    digits["firstName"] = json!("Ad4");
    let (status, body) = send_request(&app.router, post_json("/create-user", digits)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_NAME");

    let mut weak = registration("ada", "ada@example.com", &invite);
    weak["password"] = json!("1234567");
    let (status, body) = send_request(&app.router, post_json("/create-user", weak)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WEAK_PASSWORD");

    let (status, body) = send_request(
        &app.router,
        post_json("/create-user", json!({"handle": "ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");

    let request = Request::builder()
        .method("POST")
        .uri("/create-user")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_request(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // 校验失败不会消耗邀请码
    let (status, _) = send_request(
        &app.router,
        post_json("/create-user", registration("ada", "ada@example.com", &invite)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn login_failures() {
    let app = build_app();
    let invite = invite_token(&app, "100-200-300-403").await;
    send_request(
        &app.router,
        post_json("/create-user", registration("ada", "ada@example.com", &invite)),
    )
    .await;

    let (status, body) = send_request(
        &app.router,
        post_json(
            "/login",
            json!({"email": "nobody@example.com", "password": "analytical-engine"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send_request(
        &app.router,
        post_json(
            "/login",
            json!({"email": "ada@example.com", "password": "wrong-password"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn protected_routes_require_a_session_token() {
    let app = build_app();

    let (status, body) = send_request(
        &app.router,
        Request::builder()
            .uri("/boredRoom")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, body) =
        send_request(&app.router, authorized("POST", "/validate-token", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    // 邀请令牌不能当作会话令牌
    let invite = invite_token(&app, "100-200-300-404").await;
    let (status, _) = send_request(&app.router, authorized("GET", "/boredRoom", &invite)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_request(
        &app.router,
        Request::builder().uri("/ws").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn room_metadata_lookup() {
    let app = build_app();
    let (tx, _rx) = outbound_channel();
    let session = app.chat.connect(Uuid::new_v4().into(), tx);
    let snapshot = app
        .chat
        .create_room(
            session,
            CreateRoomRequest {
                name: "General".to_string(),
                description: Some("everything".to_string()),
                expiry_hours: None,
            },
        )
        .await
        .unwrap();
    let room_id = snapshot.room.id;

    let (status, body) = send_request(
        &app.router,
        Request::builder()
            .uri(format!("/rooms/{room_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], room_id.to_string());
    assert_eq!(body["name"], "General");
    assert_eq!(body["description"], "everything");

    let (status, body) = send_request(
        &app.router,
        Request::builder()
            .uri(format!("/rooms/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ROOM_NOT_FOUND");

    let (status, body) = send_request(
        &app.router,
        Request::builder()
            .uri("/rooms/not-a-uuid")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    app.chat.remove_room(session, room_id).await.unwrap();
    let (status, _) = send_request(
        &app.router,
        Request::builder()
            .uri(format!("/rooms/{room_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
