mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;

use common::{body_json, refresh_cookie, set_cookie_header, TestApp};
use inkwell::auth::google::GoogleIdentity;
use inkwell::db;

fn refresh_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/auth/refresh");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn signup_creates_account_once() {
    let app = TestApp::new();
    let body = json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "password": "engine"
    });

    let response = app.post_json("/auth/signup", body.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let conn = app.state.db.get().unwrap();
    let user = db::users::find_by_email(&conn, "ada@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(user.username, "Ada Lovelace");
    assert!(!user.is_google_id);
    assert_ne!(user.password_hash.as_deref(), Some("engine"));
    drop(conn);

    let duplicate = app.post_json("/auth/signup", body).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(app.count("users"), 1);
}

#[tokio::test]
async fn signup_requires_credentials() {
    let app = TestApp::new();
    let response = app
        .post_json(
            "/auth/signup",
            json!({ "firstName": "Ada", "lastName": "L", "email": "ada@example.com" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.count("users"), 0);
}

#[tokio::test]
async fn signin_returns_profile_token_and_cookie() {
    let app = TestApp::new();
    let user = app.seed_user("Ada Lovelace", "ada@example.com", "engine");

    let (body, cookie) = app.sign_in("ada@example.com", "engine").await;

    assert_eq!(body["user"]["id"], user.id.as_str());
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("refreshToken").is_none());

    let access = body["accessToken"].as_str().unwrap();
    let claims = app.state.tokens.verify_access(access).unwrap();
    assert_eq!(claims.id, user.id);

    let token = cookie.strip_prefix("refreshToken=").unwrap();
    let stored = app.find_user(&user.id).unwrap().refresh_token;
    assert_eq!(stored.as_deref(), Some(token));
}

#[tokio::test]
async fn signin_rejects_bad_credentials_without_cookie() {
    let app = TestApp::new();
    app.seed_user("Ada", "ada@example.com", "engine");

    let wrong = app
        .post_json(
            "/auth/signin",
            json!({ "email": "ada@example.com", "password": "nope" }),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(refresh_cookie(&wrong).is_none());

    let unknown = app
        .post_json(
            "/auth/signin",
            json!({ "email": "who@example.com", "password": "engine" }),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let missing = app
        .post_json("/auth/signin", json!({ "email": "ada@example.com" }))
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn passwords_are_not_trimmed() {
    let app = TestApp::new();
    app.seed_user("Ada", "ada@example.com", "  engine  ");

    let trimmed = app
        .post_json(
            "/auth/signin",
            json!({ "email": "ada@example.com", "password": "engine" }),
        )
        .await;
    assert_eq!(trimmed.status(), StatusCode::UNAUTHORIZED);

    let (body, _) = app.sign_in("ada@example.com", "  engine  ").await;
    assert!(body["accessToken"].is_string());

    let spaces_only = app
        .post_json(
            "/auth/signup",
            json!({
                "firstName": "Grace",
                "lastName": "Hopper",
                "email": "grace@example.com",
                "password": "   "
            }),
        )
        .await;
    assert_eq!(spaces_only.status(), StatusCode::CREATED);

    let empty = app
        .post_json(
            "/auth/signup",
            json!({
                "firstName": "Joan",
                "lastName": "Clarke",
                "email": "joan@example.com",
                "password": ""
            }),
        )
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_issues_access_token_without_rotation() {
    let app = TestApp::new();
    let user = app.seed_user("Ada", "ada@example.com", "engine");
    let (_, cookie) = app.sign_in("ada@example.com", "engine").await;

    let response = app.send(refresh_request(Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(refresh_cookie(&response).is_none());

    let body = body_json(response).await;
    let claims = app
        .state
        .tokens
        .verify_access(body["accessToken"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.id, user.id);
    assert_eq!(body["user"]["username"], "Ada");
}

#[tokio::test]
async fn refresh_without_cookie_is_no_content() {
    let app = TestApp::new();
    let response = app.send(refresh_request(None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn refresh_with_unknown_token_is_forbidden_and_clears_cookie() {
    let app = TestApp::new();
    let response = app
        .send(refresh_request(Some("refreshToken=forged.token.value")))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let cleared = set_cookie_header(&response).unwrap();
    assert!(cleared.starts_with("refreshToken=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn newer_signin_replaces_previous_session() {
    let app = TestApp::new();
    app.seed_user("Ada", "ada@example.com", "engine");

    let (_, first) = app.sign_in("ada@example.com", "engine").await;
    let (_, second) = app.sign_in("ada@example.com", "engine").await;
    assert_ne!(first, second);

    let stale = app.send(refresh_request(Some(&first))).await;
    assert_eq!(stale.status(), StatusCode::FORBIDDEN);

    let current = app.send(refresh_request(Some(&second))).await;
    assert_eq!(current.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_token_bound_to_another_user() {
    let app = TestApp::new();
    let user = app.seed_user("Ada", "ada@example.com", "engine");

    let foreign = app.state.tokens.issue_refresh("someone-else").unwrap();
    {
        let conn = app.state.db.get().unwrap();
        db::users::replace_refresh_token(&conn, &user.id, &foreign).unwrap();
    }

    let response = app
        .send(refresh_request(Some(&format!("refreshToken={}", foreign))))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signout_ends_session() {
    let app = TestApp::new();
    let user = app.seed_user("Ada", "ada@example.com", "engine");
    let (_, cookie) = app.sign_in("ada@example.com", "engine").await;

    let response = app
        .send(
            Request::post("/auth/signout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie_header(&response).unwrap().contains("Max-Age=0"));
    assert_eq!(app.find_user(&user.id).unwrap().refresh_token, None);

    let after = app.send(refresh_request(Some(&cookie))).await;
    assert_eq!(after.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signout_without_session_still_succeeds() {
    let app = TestApp::new();
    let response = app
        .send(Request::post("/auth/signout").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let stale = app
        .send(
            Request::post("/auth/signout")
                .header(header::COOKIE, "refreshToken=unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(stale.status(), StatusCode::NO_CONTENT);
}

fn grace() -> GoogleIdentity {
    GoogleIdentity {
        subject: "google-sub-1".to_string(),
        name: "Grace Hopper".to_string(),
        email: "grace@example.com".to_string(),
        picture: Some("https://lh3.test/grace.png".to_string()),
    }
}

#[tokio::test]
async fn google_login_creates_then_reuses_account() {
    let app = TestApp::new();
    app.identity.register("code-1", grace());
    app.identity.register("code-2", grace());

    let first = app.post_json("/auth/google", json!({ "code": "code-1" })).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(refresh_cookie(&first).is_some());
    let body = body_json(first).await;
    assert_eq!(body["user"]["username"], "Grace Hopper");
    assert_eq!(body["user"]["isGoogleId"], true);
    assert_eq!(body["user"]["avatar"], "https://lh3.test/grace.png");

    let second = app.post_json("/auth/google", json!({ "code": "code-2" })).await;
    assert_eq!(second.status(), StatusCode::OK);
    let again = body_json(second).await;
    assert_eq!(again["user"]["id"], body["user"]["id"]);
    assert_eq!(app.count("users"), 1);
}

#[tokio::test]
async fn google_login_failures() {
    let app = TestApp::new();

    let bad_code = app.post_json("/auth/google", json!({ "code": "nope" })).await;
    assert_eq!(bad_code.status(), StatusCode::NOT_FOUND);

    let no_code = app.post_json("/auth/google", json!({})).await;
    assert_eq!(no_code.status(), StatusCode::BAD_REQUEST);

    app.seed_user("Grace", "grace@example.com", "pw");
    app.identity.register("code-1", grace());
    let taken = app.post_json("/auth/google", json!({ "code": "code-1" })).await;
    assert_eq!(taken.status(), StatusCode::CONFLICT);
    assert_eq!(app.count("users"), 1);
}

#[tokio::test]
async fn delete_account_removes_user_and_avatar() {
    let app = TestApp::new();
    let user = app.seed_user("Ada", "ada@example.com", "engine");
    {
        let conn = app.state.db.get().unwrap();
        conn.execute(
            "UPDATE users SET avatar_public_id = 'avatar-1', avatar_url = 'https://cdn.test/a.png' WHERE id = ?1",
            [&user.id],
        )
        .unwrap();
    }

    let response = app
        .send(
            Request::post("/auth/delete")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, "refreshToken=whatever")
                .body(Body::from(json!({ "id": user.id }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie_header(&response).unwrap().contains("Max-Age=0"));
    assert!(app.find_user(&user.id).is_none());
    assert_eq!(app.assets.deleted(), vec!["avatar-1".to_string()]);
}

#[tokio::test]
async fn delete_account_errors() {
    let app = TestApp::new();
    let user = app.seed_user("Ada", "ada@example.com", "engine");
    {
        let conn = app.state.db.get().unwrap();
        conn.execute(
            "UPDATE users SET avatar_public_id = 'avatar-1' WHERE id = ?1",
            [&user.id],
        )
        .unwrap();
    }

    let missing = app.post_json("/auth/delete", json!({})).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let unknown = app.post_json("/auth/delete", json!({ "id": "nobody" })).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    app.assets.set_fail_delete(true);
    let refused = app.post_json("/auth/delete", json!({ "id": user.id })).await;
    assert_eq!(refused.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.find_user(&user.id).is_some());
}

#[tokio::test]
async fn me_requires_valid_access_token() {
    let app = TestApp::new();
    let user = app.seed_user("Ada", "ada@example.com", "engine");
    let (body, _) = app.sign_in("ada@example.com", "engine").await;
    let access = body["accessToken"].as_str().unwrap();

    let response = app
        .send(
            Request::get("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], user.id.as_str());

    let anonymous = app.get("/auth/me").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forged = app
        .send(
            Request::get("/auth/me")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}
