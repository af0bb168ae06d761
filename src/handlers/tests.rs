//! End-to-end request tests against the in-memory store

use super::AppState;
use crate::db::Stores;
use crate::models::Role;
use crate::routes::build_router;
use crate::services::notifications::testing::RecordingMailer;
use crate::services::TokenService;
use crate::validation::Registration;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: AppState,
    mailer: Arc<RecordingMailer>,
}

impl TestApp {
    async fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            Stores::in_memory(),
            TokenService::new(b"test-secret"),
            mailer.clone(),
            None,
            Duration::days(365),
            false,
        );
        state
            .credentials
            .create_user(
                Registration {
                    username: "root".to_string(),
                    email: "root@x.com".to_string(),
                    password: "adminpass".to_string(),
                },
                Role::Admin,
            )
            .await
            .unwrap();

        Self {
            router: build_router(state.clone()),
            state,
            mailer,
        }
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(&self, username: &str) {
        let (status, _) = self
            .call(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@x.com", username),
                    "password": "secret1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn login(&self, username: &str, password: &str, role: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": password, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.login("root", "adminpass", "admin").await
    }

    async fn file_leak(&self, token: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/complaints",
                Some(token),
                Some(json!({
                    "title": "Leak",
                    "description": "pipe",
                    "department": "Maintenance",
                    "priority": "High",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn count_mails(&self, to: &str, subject: &str) -> usize {
        self.mailer
            .sent()
            .await
            .iter()
            .filter(|m| m.to == to && m.subject == subject)
            .count()
    }

    /// Detached notifications land shortly after the response. Wait for the
    /// first one, then let the rest settle before counting.
    async fn mails_to(&self, to: &str, subject: &str) -> usize {
        for _ in 0..50 {
            if self.count_mails(to, subject).await > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.count_mails(to, subject).await
    }

    async fn send_raw(&self, uri: &str, token: &str, body: &'static str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }
}

#[tokio::test]
async fn test_submit_triage_resolve_scenario() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;

    let (status, created) = app
        .call(
            "POST",
            "/complaints",
            Some(&alice),
            Some(json!({
                "title": "Leak",
                "description": "pipe",
                "department": "Maintenance",
                "priority": "High",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["status"], "New");
    assert_eq!(created["data"]["owner"]["username"], "alice");
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let alice_id = created["data"]["ownerId"].clone();

    let admin = app.admin_token().await;
    let (status, listed) = app.call("GET", "/admin/complaints", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["id"].as_str())
        .collect();
    assert!(ids.contains(&id.as_str()));

    let uri = format!("/admin/complaints/{}", id);
    let (status, _) = app
        .call("PUT", &uri, Some(&admin), Some(json!({ "status": "Resolved" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, fetched) = app.call("GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["status"], "Resolved");
    assert_eq!(fetched["data"]["ownerId"], alice_id);
    assert_eq!(fetched["data"]["owner"]["username"], "alice");

    assert_eq!(app.mails_to("alice@x.com", "Complaint Updated").await, 1);
}

#[tokio::test]
async fn test_other_user_cannot_delete_or_edit() {
    let app = TestApp::new().await;
    app.register("alice").await;
    app.register("bobby").await;
    let alice = app.login("alice", "secret1", "user").await;
    let bobby = app.login("bobby", "secret1", "user").await;
    let id = app.file_leak(&alice).await;
    let uri = format!("/complaints/{}", id);

    let (status, body) = app.call("DELETE", &uri, Some(&bobby), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    // Payload validity does not matter to a stranger.
    let (status, _) = app
        .call("PUT", &uri, Some(&bobby), Some(json!({ "priority": "Urgent" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("GET", &uri, Some(&bobby), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = app.call("GET", "/complaints", Some(&bobby), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 0);

    let (status, fetched) = app.call("GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["title"], "Leak");
}

#[tokio::test]
async fn test_owner_edit_and_delete() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;
    let id = app.file_leak(&alice).await;
    let uri = format!("/complaints/{}", id);

    let (status, updated) = app
        .call("PUT", &uri, Some(&alice), Some(json!({ "title": "Big leak" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["title"], "Big leak");
    assert_eq!(updated["data"]["status"], "New");

    let (status, _) = app
        .call("PUT", &uri, Some(&alice), Some(json!({ "priority": "Urgent" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_can_delete_but_not_edit_archived_complaint() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;
    let id = app.file_leak(&alice).await;
    let uri = format!("/complaints/{}", id);

    let archived = app
        .state
        .complaints
        .archive_sweep(Duration::seconds(-1))
        .await
        .unwrap();
    assert_eq!(archived, 1);

    let (status, fetched) = app.call("GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["archived"], true);

    let (status, _) = app
        .call("PUT", &uri, Some(&alice), Some(json!({ "title": "Big leak" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_malformed_and_expired_tokens() {
    let app = TestApp::new().await;

    let (status, body) = app.call("GET", "/complaints", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token, authorization denied");

    let (status, _) = app.call("GET", "/complaints", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let root = app
        .state
        .stores
        .users
        .find_by_login("root")
        .await
        .unwrap()
        .unwrap();
    let stale = app
        .state
        .tokens
        .issue_at(&root.identity(), Utc::now() - Duration::hours(2))
        .unwrap();
    let (status, _) = app.call("GET", "/admin/complaints", Some(&stale), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_guard_rejects_regular_users() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;

    for uri in ["/admin/complaints", "/admin/users", "/admin/complaints/stats"] {
        let (status, _) = app.call("GET", uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        let (status, _) = app.call("GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_registration_and_login_errors() {
    let app = TestApp::new().await;
    app.register("alice").await;

    let (status, body) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "email": "other@x.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username or Email already exists");

    let (status, _) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "carol", "email": "carol@x.com", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let attempts = [
        (json!({ "username": "alice", "password": "wrong1", "role": "user" }), StatusCode::UNAUTHORIZED),
        (json!({ "username": "nobody", "password": "secret1", "role": "user" }), StatusCode::UNAUTHORIZED),
        (json!({ "username": "alice", "password": "secret1", "role": "admin" }), StatusCode::FORBIDDEN),
        (json!({ "username": "alice", "password": "secret1", "role": "superuser" }), StatusCode::BAD_REQUEST),
    ];
    for (body, expected) in attempts {
        let (status, _) = app.call("POST", "/auth/login", None, Some(body.clone())).await;
        assert_eq!(status, expected, "{}", body);
    }

    // Email works as the login identifier too.
    app.login("alice@x.com", "secret1", "user").await;
}

#[tokio::test]
async fn test_internal_notes_hidden_from_owner() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;
    let admin = app.admin_token().await;
    let id = app.file_leak(&alice).await;

    let (status, noted) = app
        .call(
            "POST",
            &format!("/admin/complaints/{}/notes", id),
            Some(&admin),
            Some(json!({ "note": "called plumber" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(noted["data"]["internalNotes"][0]["text"], "called plumber");

    let (_, own) = app
        .call("GET", &format!("/complaints/{}", id), Some(&alice), None)
        .await;
    assert!(own["data"].get("internalNotes").is_none());
}

#[tokio::test]
async fn test_report_stats_and_archive() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;
    let admin = app.admin_token().await;
    app.file_leak(&alice).await;

    let response = app
        .send("GET", "/admin/complaints/report", Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("Title,User,Department,Priority,Status,Assigned To,Created At\n"));
    assert!(csv.contains("Leak,alice,Maintenance,High,New,Unassigned,"));

    let (status, stats) = app
        .call("GET", "/admin/complaints/stats", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["totalComplaints"], 1);
    assert_eq!(stats["data"]["highPriorityComplaints"], 1);
    assert_eq!(stats["data"]["complaintsByCategory"][0]["_id"], "Maintenance");

    let (status, archived) = app
        .call("POST", "/admin/complaints/archive", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["data"]["archived"], 0);

    let (status, _) = app
        .call(
            "POST",
            "/admin/complaints/archive",
            Some(&admin),
            Some(json!({ "olderThanDays": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_archive_rejects_malformed_body() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;
    let admin = app.admin_token().await;
    let id = app.file_leak(&alice).await;

    let (status, body) = app
        .call(
            "POST",
            "/admin/complaints/archive",
            Some(&admin),
            Some(json!({ "olderThanDays": "thirty" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {}", body);
    assert_eq!(body["success"], false);

    let status = app
        .send_raw("/admin/complaints/archive", &admin, "{not json")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, fetched) = app
        .call("GET", &format!("/complaints/{}", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["archived"], false);
}

#[tokio::test]
async fn test_reference_data_admin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let root = app
        .state
        .stores
        .users
        .find_by_login("root")
        .await
        .unwrap()
        .unwrap();

    let (status, department) = app
        .call(
            "POST",
            "/admin/departments",
            Some(&admin),
            Some(json!({ "name": "Maintenance", "manager": root.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(department["data"]["manager"]["username"], "root");

    let department_uri = format!("/admin/departments/{}", department["data"]["id"].as_str().unwrap());
    let (status, renamed) = app
        .call("PUT", &department_uri, Some(&admin), Some(json!({ "name": "Facilities" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["data"]["manager"]["username"], "root");

    let (status, cleared) = app
        .call("PUT", &department_uri, Some(&admin), Some(json!({ "manager": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["data"]["name"], "Facilities");
    assert!(cleared["data"]["manager"].is_null());

    let (status, _) = app
        .call(
            "POST",
            "/admin/departments",
            Some(&admin),
            Some(json!({ "name": "IT", "manager": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, category) = app
        .call("POST", "/admin/categories", Some(&admin), Some(json!({ "name": "Water" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .call("POST", "/admin/categories", Some(&admin), Some(json!({ "name": "Water" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let category_uri = format!("/admin/categories/{}", category["data"]["id"].as_str().unwrap());
    let (status, _) = app.call("DELETE", &category_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("DELETE", &category_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, users) = app.call("GET", "/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(users["data"][0].get("passwordHash").is_none());
    assert!(users["data"][0].get("password_hash").is_none());
}

#[tokio::test]
async fn test_malformed_id_and_security_headers() {
    let app = TestApp::new().await;
    app.register("alice").await;
    let alice = app.login("alice", "secret1", "user").await;

    let response = app.send("GET", "/complaints/not-a-uuid", Some(&alice), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["X-Frame-Options"], "DENY");
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
}
