//! Helpers shared by the HTTP-level tests.

#![allow(dead_code, reason = "not every test uses every helper")]

use std::time::Duration;

use application::{api, bootstrap::bootstrap, config, secure, Gate, Policy};
use axum::{
    body::{self, Body},
    routing::get,
    Router,
};
use http::{header, Request, Response, StatusCode};
use secrecy::SecretBox;
use service::{
    command,
    domain::user,
    infra::{Directory, Memory},
    Command as _,
};
use tower::ServiceExt as _;

pub use application::Service;

/// Password of every seeded account.
pub const PASSWORD: &str = "123456";

/// Creates a [`Service`] over an in-memory directory seeded with an `admin`,
/// a `kim` manager of `North Branch` and a `lee` salesperson.
pub async fn service(jwt: &config::Jwt) -> Service {
    let service = Service::new(
        service::Config::try_from(jwt).unwrap(),
        Directory::Memory(Memory::default()),
    );
    bootstrap(&service, &config::Bootstrap::default()).await.unwrap();

    for (username, role) in
        [("kim", user::Role::Manager), ("lee", user::Role::Sales)]
    {
        _ = service
            .execute(command::CreateUser {
                username: user::Username::new(username).unwrap(),
                password: SecretBox::init_with(|| {
                    user::Password::new(PASSWORD).unwrap()
                }),
                real_name: user::RealName::new("Test User").unwrap(),
                email: None,
                phone: None,
                department: user::Department::new("North Branch"),
                role: Some(role),
            })
            .await
            .unwrap();
    }

    service
}

/// Handler standing in for a business endpoint.
async fn stub() -> &'static str {
    "ok"
}

/// Builds the protected [`Router`] with stub business endpoints.
pub fn app(service: &Service, jwt: &config::Jwt, policy: Policy) -> Router {
    let routes = Router::new()
        .route("/customers", get(stub).post(stub).delete(stub))
        .route("/users", get(stub).post(stub))
        .route("/admin/settings", get(stub))
        .merge(api::router());

    secure(routes, Gate::new(service.clone(), jwt).unwrap(), policy)
}

/// Creates a [`config::Jwt`] issuing access tokens living for `ttl`.
pub fn jwt(ttl: Duration) -> config::Jwt {
    config::Jwt {
        expiration: ttl,
        ..config::Jwt::default()
    }
}

/// Sends the `req`uest to the `app`.
pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

/// Reads the JSON body of the `res`ponse.
pub async fn json(res: Response<Body>) -> serde_json::Value {
    let bytes = body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Creates a request without a body.
pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Creates a request with a bearer `token`.
pub fn authorized(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Creates a request with a JSON `body`.
pub fn with_json(
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Logs the `username` in, returning its access and refresh tokens.
pub async fn login(app: &Router, username: &str) -> (String, String) {
    let res = send(
        app,
        with_json(
            "POST",
            "/auth/login",
            &serde_json::json!({
                "username": username,
                "password": PASSWORD,
            }),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = json(res).await;
    (
        body["data"]["token"].as_str().unwrap().to_owned(),
        body["data"]["refreshToken"].as_str().unwrap().to_owned(),
    )
}
