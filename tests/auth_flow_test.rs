//! End-to-end tests of the HTTP surface, driven through the filter tree

use chrono::{Datelike, Utc};
use cocampus_auth::auth::principal::NewPrincipal;
use cocampus_auth::auth::role::{AccountStatus, Role};
use cocampus_auth::config::ServerConfig;
use cocampus_auth::core::server::{AppState, Backends};
use cocampus_auth::handlers::api_routes;
use cocampus_auth::storage::memory::{
    MemoryPrincipalStore, MemorySequenceStore, MemoryWalletProvisioner,
};
use cocampus_auth::storage::token_revocation::MemoryTokenRevocationStore;
use cocampus_auth::storage::traits::PrincipalStore;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use warp::http::Response;
use warp::hyper::body::Bytes;
use warp::{Filter, Reply};

const PASSWORD: &str = "Passw0rd!";

fn routes_with(
    config: ServerConfig,
) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone + 'static {
    let state = AppState::in_memory(&config).unwrap();
    api_routes(state)
}

fn routes() -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone + 'static {
    routes_with(ServerConfig::for_testing())
}

async fn call<F>(
    routes: &F,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Bytes>
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {}", token));
    }
    if let Some(body) = body {
        request = request.json(&body);
    }
    request.reply(routes).await
}

fn body_of(response: &Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

async fn register<F>(routes: &F, email: &str, role: &str) -> Value
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let response = call(
        routes,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": PASSWORD,
            "name": "Test User",
            "phone": "9876543210",
            "role": role,
            "department": "CSE"
        })),
    )
    .await;
    assert_eq!(response.status(), 201, "register failed: {:?}", response.body());
    body_of(&response)["data"].clone()
}

async fn login<F>(routes: &F, email: &str, password: &str) -> Response<Bytes>
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    call(
        routes,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

fn token(data: &Value) -> String {
    data["token"].as_str().unwrap().to_string()
}

fn refresh_token(data: &Value) -> String {
    data["refreshToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_register_assigns_student_id_and_rejects_duplicate_email() {
    let routes = routes();
    let data = register(&routes, "a@x.edu", "student").await;

    let pattern = Regex::new(&format!(r"^STU{}\d{{3}}$", Utc::now().year())).unwrap();
    let user_id = data["user"]["userId"].as_str().unwrap();
    assert!(pattern.is_match(user_id), "unexpected user id {}", user_id);
    assert_eq!(data["user"]["role"], "student");
    assert!(data["user"].get("password").is_none());
    assert!(data["user"].get("passwordDigest").is_none());
    assert!(!token(&data).is_empty());
    assert!(!refresh_token(&data).is_empty());

    let duplicate = call(
        &routes,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "A@X.edu",
            "password": PASSWORD,
            "name": "Someone Else",
            "role": "student"
        })),
    )
    .await;
    assert_eq!(duplicate.status(), 400);
    let body = body_of(&duplicate);
    assert_eq!(body["status"], "error");
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["message"], "User already exists with this email");
}

#[tokio::test]
async fn test_register_validation() {
    let routes = routes();
    for body in [
        json!({ "email": "bad-address", "password": PASSWORD, "name": "X", "role": "student" }),
        json!({ "email": "b@x.edu", "password": "short", "name": "X", "role": "student" }),
        json!({ "email": "b@x.edu", "password": PASSWORD, "name": "X", "role": "janitor" }),
        json!({ "email": "b@x.edu", "password": PASSWORD, "role": "student" }),
    ] {
        let response = call(&routes, "POST", "/api/v1/auth/register", None, Some(body)).await;
        assert_eq!(response.status(), 400);
    }
}

#[tokio::test]
async fn test_wrong_password_three_times_is_uniform() {
    let routes = routes();
    register(&routes, "a@x.edu", "student").await;

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = login(&routes, "a@x.edu", "wrong-password").await;
        assert_eq!(response.status(), 401);
        bodies.push(body_of(&response));
    }
    let unknown = login(&routes, "ghost@x.edu", PASSWORD).await;
    assert_eq!(unknown.status(), 401);
    bodies.push(body_of(&unknown));

    assert!(bodies.iter().all(|b| *b == bodies[0]));
    assert_eq!(bodies[0]["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_by_user_id_and_portal() {
    let routes = routes();
    let data = register(&routes, "w@x.edu", "warden").await;
    let user_id = data["user"]["userId"].as_str().unwrap().to_string();
    assert!(user_id.starts_with("WRD"));

    let response = call(
        &routes,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "userId": user_id, "password": PASSWORD, "role": "warden" })),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert!(body_of(&response)["data"]["user"]["lastLoginAt"].is_string());

    let wrong_portal = call(
        &routes,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "userId": user_id, "password": PASSWORD, "role": "student" })),
    )
    .await;
    assert_eq!(wrong_portal.status(), 403);

    let both = call(
        &routes,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "w@x.edu", "userId": user_id, "password": PASSWORD })),
    )
    .await;
    assert_eq!(both.status(), 400);
}

#[tokio::test]
async fn test_missing_header_is_unauthenticated() {
    let routes = routes();
    let response = call(&routes, "GET", "/api/v1/auth/me", None, None).await;
    assert_eq!(response.status(), 401);
    assert_eq!(body_of(&response)["message"], "Not authorized. Please log in again");

    let response = warp::test::request()
        .method("GET")
        .path("/api/v1/auth/me")
        .header("authorization", "Token abc")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_me_returns_profile() {
    let routes = routes();
    let data = register(&routes, "a@x.edu", "student").await;

    let response = call(&routes, "GET", "/api/v1/auth/me", Some(&token(&data)), None).await;
    assert_eq!(response.status(), 200);
    let body = body_of(&response);
    assert_eq!(body["data"]["user"]["email"], "a@x.edu");
    assert_eq!(body["data"]["user"]["department"], "CSE");
}

#[tokio::test]
async fn test_student_token_on_admin_routes_is_forbidden() {
    let routes = routes();
    let student = register(&routes, "a@x.edu", "student").await;
    let student_token = token(&student);
    let student_id = student["user"]["id"].as_str().unwrap();

    for (method, path) in [
        ("GET", "/api/v1/admin/dashboard".to_string()),
        ("GET", format!("/api/v1/users/{}", student_id)),
        ("POST", "/api/v1/admin/provisioning/retry".to_string()),
    ] {
        let response = call(&routes, method, &path, Some(&student_token), None).await;
        assert_eq!(response.status(), 403, "{} {}", method, path);
        assert_eq!(
            body_of(&response)["message"],
            "You do not have access to this resource"
        );
    }
}

#[tokio::test]
async fn test_portal_gating() {
    let routes = routes();
    let student = token(&register(&routes, "s@x.edu", "student").await);
    let warden = token(&register(&routes, "w@x.edu", "warden").await);

    let ok = call(&routes, "GET", "/api/v1/hostel/dashboard", Some(&warden), None).await;
    assert_eq!(ok.status(), 200);
    assert_eq!(body_of(&ok)["data"]["portal"], "hostel");

    let denied = call(&routes, "GET", "/api/v1/hostel/dashboard", Some(&student), None).await;
    assert_eq!(denied.status(), 403);

    let sports = call(&routes, "GET", "/api/v1/sports/dashboard", Some(&student), None).await;
    assert_eq!(sports.status(), 200);

    let unknown = call(&routes, "GET", "/api/v1/library/dashboard", Some(&student), None).await;
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn test_suspended_account_is_locked_out() {
    let routes = routes();
    let admin = token(&register(&routes, "admin@x.edu", "admin").await);
    let student = register(&routes, "a@x.edu", "student").await;
    let student_id = student["user"]["id"].as_str().unwrap();

    let response = call(
        &routes,
        "PUT",
        &format!("/api/v1/users/{}/status", student_id),
        Some(&admin),
        Some(json!({ "status": "suspended" })),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_of(&response)["data"]["user"]["status"], "suspended");

    // Previously issued, unexpired token no longer works
    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&token(&student)), None).await;
    assert_eq!(me.status(), 401);

    let refresh = call(
        &routes,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token(&student) })),
    )
    .await;
    assert_eq!(refresh.status(), 401);

    // Correct password, still refused
    let response = login(&routes, "a@x.edu", PASSWORD).await;
    assert_eq!(response.status(), 403);
    assert_eq!(
        body_of(&response)["message"],
        "Your account is not active. Please contact admin"
    );
}

#[tokio::test]
async fn test_change_password() {
    let routes = routes();
    let data = register(&routes, "a@x.edu", "student").await;
    let access = token(&data);

    let wrong = call(
        &routes,
        "PUT",
        "/api/v1/auth/change-password",
        Some(&access),
        Some(json!({ "currentPassword": "not-my-password", "newPassword": "N3wPassword!" })),
    )
    .await;
    assert_eq!(wrong.status(), 401);
    assert_eq!(body_of(&wrong)["message"], "Current password is incorrect");

    let changed = call(
        &routes,
        "PUT",
        "/api/v1/auth/change-password",
        Some(&access),
        Some(json!({ "currentPassword": PASSWORD, "newPassword": "N3wPassword!" })),
    )
    .await;
    assert_eq!(changed.status(), 200);

    assert_eq!(login(&routes, "a@x.edu", PASSWORD).await.status(), 401);
    assert_eq!(login(&routes, "a@x.edu", "N3wPassword!").await.status(), 200);

    // Tokens issued before the change stay valid until they expire
    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(me.status(), 200);
}

#[tokio::test]
async fn test_refresh_rotation_and_replay() {
    let routes = routes();
    let data = register(&routes, "a@x.edu", "student").await;
    let original = refresh_token(&data);

    let rotated = call(
        &routes,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": original })),
    )
    .await;
    assert_eq!(rotated.status(), 200);
    let rotated = body_of(&rotated)["data"].clone();
    assert_ne!(refresh_token(&rotated), original);

    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&token(&rotated)), None).await;
    assert_eq!(me.status(), 200);

    let replay = call(
        &routes,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": original })),
    )
    .await;
    assert_eq!(replay.status(), 401);

    // An access token is not a refresh token
    let wrong_class = call(
        &routes,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": token(&data) })),
    )
    .await;
    assert_eq!(wrong_class.status(), 401);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let routes = routes();
    let data = register(&routes, "a@x.edu", "student").await;

    let response = call(
        &routes,
        "GET",
        "/api/v1/auth/me",
        Some(&refresh_token(&data)),
        None,
    )
    .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_logout_revokes_tokens() {
    let routes = routes();
    let first = register(&routes, "a@x.edu", "student").await;
    let second = body_of(&login(&routes, "a@x.edu", PASSWORD).await)["data"].clone();

    // No body at all
    let response = call(&routes, "POST", "/api/v1/auth/logout", Some(&token(&first)), None).await;
    assert_eq!(response.status(), 200);
    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&token(&first)), None).await;
    assert_eq!(me.status(), 401);

    // Other sessions are unaffected
    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&token(&second)), None).await;
    assert_eq!(me.status(), 200);

    // With the refresh token in the body, it is revoked too
    let response = call(
        &routes,
        "POST",
        "/api/v1/auth/logout",
        Some(&token(&second)),
        Some(json!({ "refreshToken": refresh_token(&second) })),
    )
    .await;
    assert_eq!(response.status(), 200);
    let refresh = call(
        &routes,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token(&second) })),
    )
    .await;
    assert_eq!(refresh.status(), 401);
}

#[tokio::test]
async fn test_repeated_failures_are_throttled() {
    let routes = routes();
    register(&routes, "a@x.edu", "student").await;

    for _ in 0..5 {
        assert_eq!(login(&routes, "a@x.edu", "wrong-password").await.status(), 401);
    }
    let throttled = login(&routes, "a@x.edu", PASSWORD).await;
    assert_eq!(throttled.status(), 429);
    assert!(throttled.headers().contains_key("retry-after"));
    assert_eq!(
        body_of(&throttled)["message"],
        "Too many failed login attempts. Please try again later"
    );

    // Other identifiers are unaffected
    register(&routes, "b@x.edu", "student").await;
    assert_eq!(login(&routes, "b@x.edu", PASSWORD).await.status(), 200);
}

#[tokio::test]
async fn test_admin_user_lookup_and_session_revocation() {
    let routes = routes();
    let admin = token(&register(&routes, "admin@x.edu", "admin").await);
    let student = register(&routes, "a@x.edu", "student").await;
    let student_id = student["user"]["id"].as_str().unwrap();

    let response = call(
        &routes,
        "GET",
        &format!("/api/v1/users/{}", student_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_of(&response)["data"]["user"]["email"], "a@x.edu");

    let missing = call(&routes, "GET", "/api/v1/users/nobody", Some(&admin), None).await;
    assert_eq!(missing.status(), 404);

    let response = call(
        &routes,
        "POST",
        &format!("/api/v1/users/{}/revoke-sessions", student_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(response.status(), 200);
    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&token(&student)), None).await;
    assert_eq!(me.status(), 401);

    let retry = call(
        &routes,
        "POST",
        "/api/v1/admin/provisioning/retry",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(retry.status(), 200);
    assert_eq!(body_of(&retry)["data"]["pending"], 0);
}

#[tokio::test]
async fn test_health_and_headers() {
    let routes = routes();
    let response = call(&routes, "GET", "/health", None, None).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_of(&response)["status"], "success");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let missing = call(&routes, "GET", "/api/v1/nothing-here", None, None).await;
    assert_eq!(missing.status(), 404);
    assert_eq!(body_of(&missing)["status"], "error");
    assert_eq!(missing.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_detail_only_in_development_mode() {
    let production = routes();
    let body = body_of(&call(&production, "GET", "/api/v1/auth/me", None, None).await);
    assert!(body.get("detail").is_none());

    let mut config = ServerConfig::for_testing();
    config.development_mode = true;
    let development = routes_with(config);
    let body = body_of(&call(&development, "GET", "/api/v1/auth/me", None, None).await);
    assert_eq!(body["detail"], "Unauthenticated: missing bearer token");
}

#[tokio::test]
async fn test_custom_api_version() {
    let mut config = ServerConfig::for_testing();
    config.api_version = "v2".to_string();
    let routes = routes_with(config);

    let response = call(&routes, "GET", "/api/v2/auth/me", None, None).await;
    assert_eq!(response.status(), 401);
    let response = call(&routes, "GET", "/api/v1/auth/me", None, None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_admin_creates_lists_and_resets_users() {
    let routes = routes();
    let admin = token(&register(&routes, "admin@x.edu", "admin").await);
    let student = token(&register(&routes, "a@x.edu", "student").await);
    let year = Utc::now().year();

    let new_faculty = json!({
        "email": "Prof@X.edu",
        "password": "TempPass123",
        "name": "Prof. Rao",
        "role": "faculty",
        "department": "ECE"
    });
    let forbidden = call(&routes, "POST", "/api/v1/users", Some(&student), Some(new_faculty.clone())).await;
    assert_eq!(forbidden.status(), 403);

    let created = call(&routes, "POST", "/api/v1/users", Some(&admin), Some(new_faculty.clone())).await;
    assert_eq!(created.status(), 201);
    let data = body_of(&created)["data"].clone();
    assert_eq!(data["userId"], format!("FAC{}001", year));
    assert_eq!(data["user"]["email"], "prof@x.edu");
    assert!(data.get("temporaryPassword").is_none());
    let faculty_id = data["user"]["id"].as_str().unwrap().to_string();

    let duplicate = call(&routes, "POST", "/api/v1/users", Some(&admin), Some(new_faculty)).await;
    assert_eq!(duplicate.status(), 400);

    let listed = call(&routes, "GET", "/api/v1/users?role=faculty", Some(&admin), None).await;
    assert_eq!(listed.status(), 200);
    let listed = body_of(&listed);
    assert_eq!(listed["data"]["count"], 1);
    assert_eq!(listed["data"]["users"][0]["id"], faculty_id.as_str());

    let all = call(&routes, "GET", "/api/v1/users", Some(&admin), None).await;
    assert_eq!(body_of(&all)["data"]["count"], 3);

    let bad_filter = call(&routes, "GET", "/api/v1/users?role=janitor", Some(&admin), None).await;
    assert_eq!(bad_filter.status(), 400);

    let stats = call(&routes, "GET", "/api/v1/users/stats", Some(&admin), None).await;
    assert_eq!(stats.status(), 200);
    let stats = body_of(&stats)["data"].clone();
    assert_eq!(stats["totalUsers"], 3);
    assert_eq!(stats["activeUsers"], 3);
    assert_eq!(stats["totalStudents"], 1);
    assert_eq!(stats["totalFaculty"], 1);
    assert_eq!(stats["usersByRole"]["admin"], 1);

    let reset_path = format!("/api/v1/users/{}/reset-password", faculty_id);
    let short = call(&routes, "PUT", &reset_path, Some(&admin), Some(json!({ "newPassword": "short" }))).await;
    assert_eq!(short.status(), 400);
    let missing = call(
        &routes,
        "PUT",
        "/api/v1/users/nobody/reset-password",
        Some(&admin),
        Some(json!({ "newPassword": "Resetted123" })),
    )
    .await;
    assert_eq!(missing.status(), 404);
    let reset = call(&routes, "PUT", &reset_path, Some(&admin), Some(json!({ "newPassword": "Resetted123" }))).await;
    assert_eq!(reset.status(), 200);
    assert_eq!(body_of(&reset)["data"]["email"], "prof@x.edu");
    assert!(body_of(&reset)["data"].get("newPassword").is_none());

    assert_eq!(login(&routes, "prof@x.edu", "TempPass123").await.status(), 401);
    assert_eq!(login(&routes, "prof@x.edu", "Resetted123").await.status(), 200);

    let promoted = call(
        &routes,
        "PUT",
        &format!("/api/v1/users/{}", faculty_id),
        Some(&admin),
        Some(json!({ "role": "hod" })),
    )
    .await;
    assert_eq!(promoted.status(), 200);
    assert_eq!(body_of(&promoted)["data"]["user"]["role"], "hod");

    let deleted = call(
        &routes,
        "DELETE",
        &format!("/api/v1/users/{}", faculty_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(deleted.status(), 200);
    assert_eq!(login(&routes, "prof@x.edu", "Resetted123").await.status(), 403);
}

#[tokio::test]
async fn test_update_profile() {
    let routes = routes();
    let data = register(&routes, "a@x.edu", "student").await;
    let access = token(&data);

    let response = call(
        &routes,
        "PUT",
        "/api/v1/auth/profile",
        Some(&access),
        Some(json!({ "phone": "9000000001", "role": "admin", "profile": { "semester": 5 } })),
    )
    .await;
    assert_eq!(response.status(), 200);
    let user = body_of(&response)["data"]["user"].clone();
    assert_eq!(user["phone"], "9000000001");
    assert_eq!(user["role"], "student");
    assert_eq!(user["profile"]["semester"], 5);

    // The token still matches the stored role
    let me = call(&routes, "GET", "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(body_of(&me)["data"]["user"]["phone"], "9000000001");

    let empty = call(&routes, "PUT", "/api/v1/auth/profile", Some(&access), Some(json!({}))).await;
    assert_eq!(empty.status(), 400);

    let anonymous = call(&routes, "PUT", "/api/v1/auth/profile", None, Some(json!({ "name": "X" }))).await;
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn test_corrupt_stored_digest_is_a_server_error() {
    let mut config = ServerConfig::for_testing();
    config.login_max_failures = 1;
    let principals = Arc::new(MemoryPrincipalStore::new());
    let state = AppState::new(
        &config,
        Backends {
            principals: principals.clone(),
            sequences: Arc::new(MemorySequenceStore::new()),
            wallets: Arc::new(MemoryWalletProvisioner::new()),
            revocations: Arc::new(MemoryTokenRevocationStore::new(config.refresh_token_ttl)),
        },
    )
    .unwrap();
    let routes = api_routes(state);

    principals
        .insert(NewPrincipal {
            human_id: "STU2024001".to_string(),
            email: "c@x.edu".to_string(),
            password_digest: "garbage".to_string(),
            name: "Corrupt".to_string(),
            phone: None,
            department: None,
            role: Role::Student,
            status: AccountStatus::Active,
            attributes: HashMap::new(),
        })
        .await
        .unwrap();

    // Not counted as failed logins: the second attempt is not throttled
    for _ in 0..2 {
        let response = login(&routes, "c@x.edu", PASSWORD).await;
        assert_eq!(response.status(), 500);
        assert_eq!(body_of(&response)["message"], "Internal Server Error");
    }
}

