//! Request gate and route authorization over the real router.

mod support;

use std::time::Duration;

use application::{gate, Policy};
use axum::body::Body;
use common::operations::{By, Select, Update};
use http::{header, Request, StatusCode};
use service::{
    domain::user,
    infra::{Database as _, Directory},
};

use self::support::{app, authorized, json, jwt, login, request, send};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test]
async fn anonymous_is_unauthorized_on_protected_route() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());

    let res = send(&app, request("GET", "/customers")).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json(res).await;
    assert_eq!(body["code"], 401);
    assert_eq!(body["path"], "/customers");
    assert_eq!(
        body["detail"],
        "Please provide a valid access token in the request header",
    );
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn sales_reads_customers() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, authorized("GET", "/customers", &token)).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(gate::EXPIRING_HEADER).is_none());
}

#[tokio::test]
async fn sales_cannot_create_users() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, authorized("POST", "/users", &token)).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = json(res).await;
    assert_eq!(body["code"], 403);
    assert_eq!(body["message"], "Access denied, insufficient permissions");
    assert_eq!(
        body["suggestion"],
        "Please contact the system administrator for the required privileges",
    );
}

#[tokio::test]
async fn customer_deletion_requires_manager() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (sales, _) = login(&app, "lee").await;
    let (manager, _) = login(&app, "kim").await;

    let res = send(&app, authorized("DELETE", "/customers", &sales)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json(res).await["detail"],
        "Deleting requires higher privileges",
    );

    let res = send(&app, authorized("DELETE", "/customers", &manager)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_admin_reaches_admin_routes() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (admin, _) = login(&app, "admin").await;
    let (manager, _) = login(&app, "kim").await;

    let res = send(&app, authorized("GET", "/admin/settings", &admin)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res =
        send(&app, authorized("GET", "/admin/settings", &manager)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = send(&app, request("GET", "/admin/settings")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(res).await["detail"],
        "This resource requires administrator privileges, please log in as \
         an administrator",
    );
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (_, refresh) = login(&app, "lee").await;

    let res = send(&app, authorized("GET", "/customers", &refresh)).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(res).await["detail"],
        "Access token is invalid, please log in again",
    );
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;
    let tampered = format!("{token}x");

    let res = send(&app, authorized("GET", "/customers", &tampered)).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_prefix_is_explained() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let req = Request::builder()
        .uri("/customers")
        .header(header::AUTHORIZATION, format!("Token {token}"))
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(res).await["detail"],
        "Access token must start with 'Bearer '",
    );
}

#[tokio::test]
async fn token_is_taken_from_query_and_cookie() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res =
        send(&app, request("GET", &format!("/customers?token={token}"))).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = Request::builder()
        .uri("/customers")
        .header(header::COOKIE, format!("theme=dark; jwt={token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn expiring_token_is_flagged() {
    let jwt = jwt(Duration::from_secs(20 * 60));
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, authorized("GET", "/customers", &token)).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[gate::EXPIRING_HEADER], "true");
    let remaining: u64 = res.headers()[gate::REMAINING_HEADER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(remaining <= 20 * 60 * 1000, "{remaining}");
    assert!(remaining > 19 * 60 * 1000, "{remaining}");
}

#[tokio::test]
async fn principal_does_not_leak_into_next_request() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, authorized("GET", "/customers", &token)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = send(&app, request("GET", "/customers")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_account_loses_access_immediately() {
    let jwt = jwt(DAY);
    let service = support::service(&jwt).await;
    let app = app(&service, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    deactivate(service.database(), "lee").await;

    let res = send(&app, authorized("GET", "/customers", &token)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_change_applies_on_next_request() {
    let jwt = jwt(DAY);
    let service = support::service(&jwt).await;
    let app = app(&service, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, authorized("DELETE", "/customers", &token)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let username = user::Username::new("lee").unwrap();
    let mut lee = service
        .database()
        .execute(Select(By::<Option<user::User>, _>::new(&username)))
        .await
        .unwrap()
        .unwrap();
    lee.role = Some(user::Role::Manager);
    service.database().execute(Update(lee)).await.unwrap();

    let res = send(&app, authorized("DELETE", "/customers", &token)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn debug_details_are_opt_in() {
    let jwt = jwt(DAY);
    let app = app(
        &support::service(&jwt).await,
        &jwt,
        Policy { debug: true },
    );
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, authorized("POST", "/users", &token)).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = json(res).await;
    assert_eq!(body["debug"]["username"], "lee");
    assert_eq!(body["debug"]["authenticated"], true);
    assert!(body["debug"]["authorities"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a == "ROLE_SALES"));
}

#[tokio::test]
async fn unknown_route_is_still_gated() {
    let jwt = jwt(DAY);
    let app = app(&support::service(&jwt).await, &jwt, Policy::default());
    let (token, _) = login(&app, "lee").await;

    let res = send(&app, request("GET", "/nowhere")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(&app, authorized("GET", "/nowhere", &token)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

/// Marks the `username` account as inactive right in the directory.
async fn deactivate(db: &Directory, username: &str) {
    let username = user::Username::new(username).unwrap();
    let mut found = db
        .execute(Select(By::<Option<user::User>, _>::new(&username)))
        .await
        .unwrap()
        .unwrap();
    found.status = user::Status::Inactive;
    db.execute(Update(found)).await.unwrap();
}
