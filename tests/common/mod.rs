#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use inkwell::assets::staging::StagingDir;
use inkwell::assets::{AssetError, AssetHost};
use inkwell::auth::google::{GoogleIdentity, IdentityError, IdentityProvider};
use inkwell::auth::tokens::TokenService;
use inkwell::config::{AuthConfig, Config};
use inkwell::db;
use inkwell::db::models::{Asset, Credentials, NewUser, User};
use inkwell::db::posts::{self, NewPost};
use inkwell::state::AppState;

/// In-memory asset host recording every upload and delete.
#[derive(Default)]
pub struct FakeAssetHost {
    counter: AtomicUsize,
    pub fail_upload: AtomicBool,
    pub fail_delete: AtomicBool,
    refused: Mutex<Vec<String>>,
    pub uploaded: Mutex<Vec<Vec<u8>>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeAssetHost {
    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Makes deletes of this one asset fail while others still succeed.
    pub fn refuse_delete(&self, public_id: &str) {
        self.refused.lock().unwrap().push(public_id.to_string());
    }

    pub fn uploads(&self) -> usize {
        self.uploaded.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetHost for FakeAssetHost {
    async fn upload(&self, path: &Path) -> Result<Asset, AssetError> {
        let bytes = tokio::fs::read(path).await?;
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(AssetError::Rejected("upload refused".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.uploaded.lock().unwrap().push(bytes);
        Ok(Asset {
            public_id: format!("asset-{}", n),
            url: format!("https://cdn.test/asset-{}.png", n),
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), AssetError> {
        if self.fail_delete.load(Ordering::SeqCst)
            || self.refused.lock().unwrap().iter().any(|id| id == public_id)
        {
            return Err(AssetError::Rejected("delete refused".into()));
        }
        self.deleted.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

/// Identity provider answering from a fixed table of codes.
#[derive(Default)]
pub struct FakeIdentityProvider {
    identities: Mutex<HashMap<String, GoogleIdentity>>,
}

impl FakeIdentityProvider {
    pub fn register(&self, code: &str, identity: GoogleIdentity) {
        self.identities
            .lock()
            .unwrap()
            .insert(code.to_string(), identity);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn exchange(&self, code: &str) -> Result<GoogleIdentity, IdentityError> {
        self.identities
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("invalid_grant".into()))
    }
}

pub struct TestApp {
    _tmp: TempDir,
    pub state: AppState,
    pub assets: Arc<FakeAssetHost>,
    pub identity: Arc<FakeIdentityProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        let mut config = Config::default();
        config.auth = AuthConfig {
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            ..AuthConfig::default()
        };
        config.storage.path = Some(tmp.path().join("staging"));

        let assets = Arc::new(FakeAssetHost::default());
        let identity = Arc::new(FakeIdentityProvider::default());

        let state = AppState {
            db: pool,
            tokens: Arc::new(TokenService::new(&config.auth)),
            assets: assets.clone(),
            identity: identity.clone(),
            staging: StagingDir::new(tmp.path().join("staging")),
            config,
        };

        Self {
            _tmp: tmp,
            state,
            assets,
            identity,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        inkwell::app(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> Response<Body> {
        self.send(json_request(method, uri, body)).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.json(Method::POST, uri, body).await
    }

    /// Local account with a cheap bcrypt hash, inserted directly.
    pub fn seed_user(&self, username: &str, email: &str, password: &str) -> User {
        let conn = self.state.db.get().unwrap();
        db::users::create(
            &conn,
            &NewUser {
                username: username.to_string(),
                email: email.to_string(),
                avatar_url: None,
                credentials: Credentials::Password(bcrypt::hash(password, 4).unwrap()),
            },
        )
        .unwrap()
    }

    pub fn seed_post(&self, title: &str, category: &str) -> String {
        let conn = self.state.db.get().unwrap();
        let image = Asset {
            public_id: format!("seed-{}", title),
            url: format!("https://cdn.test/seed-{}.png", title),
        };
        posts::create(
            &conn,
            &NewPost {
                title,
                category,
                content: "body text",
                image: &image,
            },
        )
        .unwrap()
    }

    pub fn seed_comment(&self, text: &str, user_id: &str, post_id: &str) -> String {
        let conn = self.state.db.get().unwrap();
        db::comments::create(&conn, text, user_id, post_id).unwrap()
    }

    pub fn find_user(&self, id: &str) -> Option<User> {
        let conn = self.state.db.get().unwrap();
        db::users::find_by_id(&conn, id).unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    /// Signs in through the API and returns the body and the refresh cookie pair.
    pub async fn sign_in(&self, email: &str, password: &str) -> (Value, String) {
        let response = self
            .post_json(
                "/auth/signin",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status(), 200);
        let cookie = refresh_cookie(&response).expect("refresh cookie");
        (body_json(response).await, cookie)
    }

    pub async fn stage_image(&self, img_id: &str, bytes: &[u8]) -> Response<Body> {
        let (content_type, body) =
            multipart_body(&[Part::file("postImg", "photo.png", "image/png", bytes)]);
        self.send(
            Request::post(format!("/post/upload-post-img?imgId={}", img_id))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub fn staging_dir(&self) -> &Path {
        self.state.staging.path()
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// `name=value` of the first Set-Cookie header, if any.
pub fn refresh_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn set_cookie_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub struct Part<'a> {
    name: &'a str,
    file: Option<(&'a str, &'a str)>,
    data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file: None,
            data: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, file_name: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            file: Some((file_name, content_type)),
            data,
        }
    }
}

const BOUNDARY: &str = "inkwell-test-boundary";

/// Hand-built multipart/form-data body and its content type.
pub fn multipart_body(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file {
            Some((file_name, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        part.name, file_name, content_type
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}
