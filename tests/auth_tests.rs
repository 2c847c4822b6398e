//! Cookie authentication and user administration

mod common;

use axum::extract::FromRequestParts;
use axum::http::{Method, Request, StatusCode, header};
use common::*;
use feattie_chat_api::api::AuthToken;
use feattie_chat_api::core::Error;
use serde_json::json;
use serial_test::serial;

#[tokio::test]
async fn test_extract_token_from_cookie() {
    let req = Request::builder()
        .header(header::COOKIE, "theme=dark; jwt=abc.def.ghi")
        .body(())
        .unwrap();

    let (mut parts, _) = req.into_parts();
    let result = AuthToken::from_request_parts(&mut parts, &()).await;

    assert_eq!(result.unwrap().0, "abc.def.ghi");
}

#[tokio::test]
async fn test_extract_token_missing_cookie() {
    let req = Request::builder().body(()).unwrap();

    let (mut parts, _) = req.into_parts();
    let result = AuthToken::from_request_parts(&mut parts, &()).await;

    assert!(matches!(result, Err(Error::Unauthenticated)));
}

#[tokio::test]
async fn test_extract_token_empty_cookie() {
    let req = Request::builder()
        .header(header::COOKIE, "jwt=")
        .body(())
        .unwrap();

    let (mut parts, _) = req.into_parts();
    let result = AuthToken::from_request_parts(&mut parts, &()).await;

    assert!(matches!(result, Err(Error::Unauthenticated)));
}

#[tokio::test]
#[serial]
async fn test_register_login_and_me() {
    let _pool = setup_test_db().await;
    let app = create_test_app();

    let response = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "  Jane@Example.COM ", "password": PASSWORD, "firstName": "Jane" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json["email"], "jane@example.com");
    assert_eq!(response.json["role"], "USER");
    assert!(response.json.get("passwordHash").is_none());

    let login = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "jane@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    let set_cookie = login.set_cookie.unwrap();
    assert!(set_cookie.starts_with("jwt="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));

    let cookie = set_cookie.split(';').next().unwrap().to_owned();
    let me = call(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json["firstName"], "Jane");
    assert!(me.json["lastLoginAt"].is_string());

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_register_rejects_bad_input() {
    let _pool = setup_test_db().await;
    let app = create_test_app();

    register(&app, "taken@example.com").await;

    let duplicate = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "TAKEN@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.json["code"], "conflict");

    let short = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "new@example.com", "password": "123" })),
    )
    .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let no_email = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "password": PASSWORD })),
    )
    .await;
    assert_eq!(no_email.status, StatusCode::BAD_REQUEST);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_login_failures_are_unauthorized() {
    let pool = setup_test_db().await;
    let app = create_test_app();

    let user_id = register(&app, "user@example.com").await;

    let wrong_password = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "user@example.com", "password": "wrong password" })),
    )
    .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert!(wrong_password.set_cookie.is_none());

    let unknown = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.json["message"], wrong_password.json["message"]);

    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();
    let disabled = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "user@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(disabled.status, StatusCode::UNAUTHORIZED);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_me_requires_valid_cookie() {
    let _pool = setup_test_db().await;
    let app = create_test_app();

    let missing = call(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json["code"], "unauthenticated");

    let forged = call(
        &app,
        Method::GET,
        "/api/auth/me",
        Some("jwt=eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.invalid"),
        None,
    )
    .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_logout_clears_cookie() {
    let _pool = setup_test_db().await;
    let app = create_test_app();

    let response = call(&app, Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let set_cookie = response.set_cookie.unwrap();
    assert!(set_cookie.starts_with("jwt="));
    assert!(set_cookie.contains("Max-Age=0"));

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_user_administration_requires_admin() {
    let pool = setup_test_db().await;
    let app = create_test_app();

    let admin = admin_cookie(&app, &pool).await;
    let user_id = register(&app, "member@example.com").await;
    let member = login(&app, "member@example.com").await;

    let forbidden = call(&app, Method::GET, "/api/users", Some(&member), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let users = call(&app, Method::GET, "/api/users", Some(&admin), None).await;
    assert_eq!(users.status, StatusCode::OK);
    assert_eq!(users.json.as_array().unwrap().len(), 2);

    let promoted = call(
        &app,
        Method::PUT,
        &format!("/api/users/{user_id}/role"),
        Some(&admin),
        Some(json!({ "role": "ADMIN" })),
    )
    .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.json["role"], "ADMIN");

    // the role is read from the database, so the old cookie now carries admin rights
    let now_allowed = call(&app, Method::GET, "/api/users", Some(&member), None).await;
    assert_eq!(now_allowed.status, StatusCode::OK);

    let missing = call(
        &app,
        Method::PUT,
        "/api/users/9999/role",
        Some(&admin),
        Some(json!({ "role": "USER" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_admin_cannot_demote_themselves() {
    let pool = setup_test_db().await;
    let app = create_test_app();

    let admin = admin_cookie(&app, &pool).await;
    let me = call(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
    let admin_id = me.json["id"].as_i64().unwrap();

    let response = call(
        &app,
        Method::PUT,
        &format!("/api/users/{admin_id}/role"),
        Some(&admin),
        Some(json!({ "role": "USER" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    cleanup_test_db();
}
