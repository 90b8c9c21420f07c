mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use duet_server::build_router;

use common::{BOYFRIEND_PASSWORD, GIRLFRIEND_PASSWORD, test_state};

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, password: &str) -> Response {
    app.clone()
        .oneshot(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "password": password }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Log in and return the `name=value` pair of the session cookie.
async fn session_cookie(app: &Router, password: &str) -> String {
    let response = login(app, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn dashboard_without_session_redirects_to_login() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn api_without_session_is_unauthorized() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);

    for uri in ["/api/rows/mood_logs", "/api/auth/session", "/api/dashboard"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn public_routes_need_no_session() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);

    for uri in ["/health", "/login"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn gate_rejects_unknown_password() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);

    let response = login(&app, "open sesame").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn cookie_session_opens_the_dashboard() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);
    let cookie = session_cookie(&app, BOYFRIEND_PASSWORD).await;

    let response = app
        .oneshot(
            Request::get("/")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["portal"], "boyfriend");
    assert_eq!(snapshot["peer_online"], false);
}

#[tokio::test]
async fn inserted_rows_are_listed_newest_first() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);
    let cookie = session_cookie(&app, GIRLFRIEND_PASSWORD).await;

    for mood in ["ANXIOUS", "OPTIMAL"] {
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/rows")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "table": "mood_logs", "mood_id": mood }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(
            Request::get("/api/rows/mood_logs?limit=5")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let rows = body_json(response).await;
    let moods: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["row"]["mood_id"].as_str().unwrap())
        .collect();
    assert_eq!(moods, ["OPTIMAL", "ANXIOUS"]);
}

#[tokio::test]
async fn uploads_need_a_session_but_downloads_are_public() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);

    let anonymous = app
        .clone()
        .oneshot(
            Request::put("/storage/memories/1700000000000.png")
                .body(Body::from(vec![1u8, 2, 3]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let cookie = session_cookie(&app, GIRLFRIEND_PASSWORD).await;
    let uploaded = app
        .clone()
        .oneshot(
            Request::put("/storage/memories/1700000000000.png")
                .header(header::COOKIE, &cookie)
                .body(Body::from(vec![1u8, 2, 3]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(uploaded.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(uploaded).await["public_url"],
        "http://duet.test/storage/memories/1700000000000.png"
    );

    let downloaded = app
        .oneshot(
            Request::get("/storage/memories/1700000000000.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(downloaded.status(), StatusCode::OK);
    assert_eq!(downloaded.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(downloaded.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &[1, 2, 3]);
}

#[tokio::test]
async fn companion_without_model_key_returns_fallback() {
    let (state, _dir) = test_state("http://duet.test").await;
    let app = build_router(state);
    let cookie = session_cookie(&app, GIRLFRIEND_PASSWORD).await;

    let response = app
        .oneshot(
            Request::post("/api/companion")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "userMessage": "hello",
                        "userName": "Mira",
                        "history": [],
                        "annoyanceLevel": 0
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let reply = body_json(response).await;
    assert_eq!(reply["action"], "NONE");
    assert_eq!(reply["gesture"], "SHIVER");
}
