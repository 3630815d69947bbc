#![cfg(feature = "web")]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use gleemanager::app::{AppState, router};
use gleemanager::auth::bootstrap_admin;
use gleemanager::config::Config;

const ADMIN_PASSWORD: &str = "admin-secret";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_upload_limit(Config::default().max_upload_bytes)
    }

    fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("database"),
            static_dir: dir.path().join("static"),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            max_upload_bytes,
            ..Config::default()
        };
        let state = Arc::new(AppState::open(config).unwrap());
        bootstrap_admin(&state.store, Some(ADMIN_PASSWORD)).unwrap();
        TestApp {
            router: router(state).unwrap(),
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/login",
                None,
                Some(json!({"username": username, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_employee(&self, admin: &str, username: &str, display_name: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/users",
                Some(admin),
                Some(json!({
                    "username": username,
                    "display_name": display_name,
                    "email": format!("{}@example.com", username),
                    "password": "employee-pass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn download(&self, token: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn upload(
        &self,
        token: &str,
        uri: &str,
        field: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "gleeboundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nRates\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"kind\"\r\n\r\nkilometers\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                b = boundary,
                f = field,
                n = file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn login_is_required_and_checked() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/api/login",
            None,
            Some(json!({"username": "admin", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");

    let (status, _) = app.call("GET", "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call("GET", "/api/me", Some("not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login("admin", ADMIN_PASSWORD).await;
    let (status, me) = app.call("GET", "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());

    let (status, _) = app.call("POST", "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_is_same_site() {
    let app = TestApp::new();
    let credentials = json!({"username": "admin", "password": ADMIN_PASSWORD});
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(credentials.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session="), "{}", cookie);
    assert!(cookie.contains("HttpOnly"), "{}", cookie);
    assert!(cookie.contains("SameSite=Lax"), "{}", cookie);
    assert!(cookie.contains("Path=/"), "{}", cookie);
}

#[tokio::test]
async fn holiday_workflow_feeds_the_calendar() {
    let app = TestApp::new();
    let admin = app.login("admin", ADMIN_PASSWORD).await;
    let anna = app.create_employee(&admin, "anna", "Anna").await;
    let bram = app.create_employee(&admin, "bram", "Bram").await;
    let anna_token = app.login("anna", "employee-pass").await;
    let bram_token = app.login("bram", "employee-pass").await;

    let (status, body) = app
        .call("POST", "/api/holidays", Some(&anna_token), Some(json!({"dates": ["2024-05-32"]})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    let (status, _) = app
        .call("POST", "/api/holidays", Some(&anna_token), Some(json!({"dates": []})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, first) = app
        .call(
            "POST",
            "/api/holidays",
            Some(&anna_token),
            Some(json!({"dates": ["2024-05-04", "2024-05-03", "2024-05-04"], "notes": "wedding"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "pending");
    assert_eq!(first["dates"], json!(["2024-05-03", "2024-05-04"]));
    let first_id = first["id"].as_str().unwrap().to_string();

    let (_, second) = app
        .call(
            "POST",
            "/api/holidays",
            Some(&bram_token),
            Some(json!({"dates": ["2024-05-04", "2024-05-05"]})),
        )
        .await;
    let second_id = second["id"].as_str().unwrap().to_string();

    // employees only see their own requests and cannot decide
    let (_, own) = app.call("GET", "/api/holidays", Some(&bram_token), None).await;
    assert_eq!(own.as_array().unwrap().len(), 1);
    let (status, _) = app
        .call("POST", &format!("/api/holidays/{}/approve", first_id), Some(&bram_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = app
        .call("POST", &format!("/api/holidays/{}/approve", first_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    let (status, _) = app
        .call("POST", &format!("/api/holidays/{}/reject", first_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, set) = app
        .call("GET", &format!("/api/holidays/set/{}/2024/5", anna), Some(&bram_token), None)
        .await;
    assert_eq!(set["days"], json!([3, 4]));

    let (status, layout) = app.call("GET", "/api/calendar/2024/5", Some(&bram_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(layout["days_in_month"], 31);
    let spans = layout["spans"].as_array().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0]["owner_id"], anna.as_str());
    assert_eq!(spans[0]["start"], 3);
    assert_eq!(spans[0]["end"], 4);
    assert_eq!(spans[0]["slot"], 0);
    assert_eq!(spans[0]["comment_text"], "wedding");

    // previewing the pending request of bram puts it in the next free lane
    let preview_uri = format!("/api/calendar/2024/5?preview={}", second_id);
    let (status, _) = app.call("GET", &preview_uri, Some(&bram_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, previewed) = app.call("GET", &preview_uri, Some(&admin), None).await;
    let preview: Vec<&Value> = previewed["spans"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["is_preview"] == true)
        .collect();
    assert_eq!(preview.len(), 1);
    assert_eq!(preview[0]["owner_id"], format!("preview-{}", second_id));
    assert_eq!(preview[0]["display_name"], "Bram");
    assert_eq!(preview[0]["slot"], 1);

    let (_, june) = app.call("GET", "/api/calendar/2024/6", Some(&admin), None).await;
    assert_eq!(june["spans"], json!([]));
    let (status, _) = app.call("GET", "/api/calendar/2024/13", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, bytes) = app
        .send(
            Request::builder()
                .uri("/api/calendar/2024/5/xlsx")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..2], b"PK");

    // bram may withdraw his pending request, but not anna's approved one
    let (status, _) = app
        .call("DELETE", &format!("/api/holidays/{}", first_id), Some(&bram_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call("DELETE", &format!("/api/holidays/{}", second_id), Some(&bram_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let _ = bram;
}

#[tokio::test]
async fn routes_build_the_kilometer_map() {
    let app = TestApp::new();
    let admin = app.login("admin", ADMIN_PASSWORD).await;
    let anna = app.create_employee(&admin, "anna", "Anna").await;
    let anna_token = app.login("anna", "employee-pass").await;

    let (status, company) = app
        .call("POST", "/api/companies", Some(&admin), Some(json!({"name": "Acme"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let company_id = company["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .call("POST", "/api/companies", Some(&admin), Some(json!({"name": "acme"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, project) = app
        .call(
            "POST",
            "/api/projects",
            Some(&admin),
            Some(json!({"company_id": company_id, "name": "Bridge"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = project["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(
            "POST",
            "/api/routes",
            Some(&anna_token),
            Some(json!({
                "date": "2024-05-02",
                "origin": "Home",
                "destination": "Site",
                "kilometers": -3.0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let trips = [
        ("2024-05-02", 12.5, true),
        ("2024-05-02", 10.0, false),
        ("2024-05-09", 4.0, false),
    ];
    for (date, km, round_trip) in trips {
        let (status, body) = app
            .call(
                "POST",
                "/api/routes",
                Some(&anna_token),
                Some(json!({
                    "date": date,
                    "origin": "Home",
                    "destination": "Site",
                    "project_id": project_id,
                    "kilometers": km,
                    "round_trip": round_trip,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
    app.call(
        "POST",
        "/api/routes",
        Some(&admin),
        Some(json!({
            "date": "2024-05-02",
            "origin": "HQ",
            "destination": "Bank",
            "kilometers": 7.0,
        })),
    )
    .await;

    let (_, routes) = app.call("GET", "/api/routes?month=2024-05", Some(&anna_token), None).await;
    assert_eq!(routes.as_array().unwrap().len(), 3);
    let (status, _) = app.call("GET", "/api/routes?month=May", Some(&anna_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, map) = app.call("GET", "/api/kilometers/2024/5", Some(&anna_token), None).await;
    assert_eq!(map["total_kilometers"], 39.0);
    assert_eq!(map["days"][0]["kilometers"], 35.0);
    assert_eq!(map["projects"][0]["project_name"], "Bridge");

    let (_, all) = app.call("GET", "/api/kilometers/2024/5", Some(&admin), None).await;
    assert_eq!(all["total_kilometers"], 46.0);
    let (_, anna_only) = app
        .call("GET", &format!("/api/kilometers/2024/5?user={}", anna), Some(&admin), None)
        .await;
    assert_eq!(anna_only["total_kilometers"], 39.0);

    let (status, _) = app
        .call("DELETE", &format!("/api/companies/{}", company_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // deleting the project keeps its routes, unlinked
    let (status, _) = app
        .call("DELETE", &format!("/api/projects/{}", project_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("GET", &format!("/api/projects/{}", project_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, routes) = app.call("GET", "/api/routes?month=2024-05", Some(&anna_token), None).await;
    let routes = routes.as_array().unwrap();
    assert_eq!(routes.len(), 3);
    assert!(routes.iter().all(|r| r["project_id"].is_null()));
    let (_, map) = app.call("GET", "/api/kilometers/2024/5", Some(&anna_token), None).await;
    assert_eq!(map["total_kilometers"], 39.0);

    let (status, _) = app
        .call("DELETE", &format!("/api/companies/{}", company_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn templates_must_be_workbooks() {
    let app = TestApp::new();
    let admin = app.login("admin", ADMIN_PASSWORD).await;

    let (status, _) = app
        .upload(&admin, "/api/templates", "file", "rates.csv", b"a,b\n")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .upload(&admin, "/api/templates", "file", "rates.xlsx", b"not a zip")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let workbook = b"PK\x03\x04fake workbook body";
    let (status, template) = app
        .upload(&admin, "/api/templates", "file", "rates.xlsx", workbook)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", template);
    assert_eq!(template["name"], "Rates");
    assert_eq!(template["kind"], "kilometers");
    let id = template["id"].as_str().unwrap().to_string();

    let (status, bytes) = app
        .send(
            Request::builder()
                .uri(format!("/api/templates/{}/download", id))
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, workbook.to_vec());

    let (status, _) = app
        .call("DELETE", &format!("/api/templates/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("GET", &format!("/api/templates/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn backup_and_restore() {
    let app = TestApp::new();
    let admin = app.login("admin", ADMIN_PASSWORD).await;

    let (status, backup) = app
        .send(
            Request::builder()
                .uri("/api/admin/backup")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.call("POST", "/api/companies", Some(&admin), Some(json!({"name": "Later Co"})))
        .await;
    let (_, companies) = app.call("GET", "/api/companies", Some(&admin), None).await;
    assert_eq!(companies.as_array().unwrap().len(), 1);

    let (status, _) = app
        .upload(&admin, "/api/admin/restore", "snapshot", "broken.bin.gz", b"garbage")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, summary) = app
        .upload(&admin, "/api/admin/restore", "snapshot", "backup.bin.gz", &backup)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", summary);
    assert_eq!(summary["users"], 1);
    assert_eq!(summary["companies"], 0);

    // sessions do not survive a restore
    let (status, _) = app.call("GET", "/api/companies", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let admin = app.login("admin", ADMIN_PASSWORD).await;
    let (_, companies) = app.call("GET", "/api/companies", Some(&admin), None).await;
    assert_eq!(companies, json!([]));
}

/// Zip signature followed by random bytes gzip cannot shrink
fn random_workbook(len: usize) -> Vec<u8> {
    let mut bytes = b"PK\x03\x04".to_vec();
    let mut body = vec![0u8; len - bytes.len()];
    StdRng::seed_from_u64(42).fill_bytes(&mut body);
    bytes.extend_from_slice(&body);
    bytes
}

#[tokio::test]
async fn large_templates_survive_backup_and_restore() {
    let app = TestApp::new();
    let admin = app.login("admin", ADMIN_PASSWORD).await;
    let workbook = random_workbook(3 * 1024 * 1024);

    let (status, template) = app
        .upload(&admin, "/api/templates", "file", "big.xlsx", &workbook)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", template);
    let id = template["id"].as_str().unwrap().to_string();

    let (status, backup) = app.download(&admin, "/api/admin/backup").await;
    assert_eq!(status, StatusCode::OK);
    assert!(backup.len() > workbook.len());

    let (status, _) = app
        .call("DELETE", &format!("/api/templates/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, summary) = app
        .upload(&admin, "/api/admin/restore", "snapshot", "backup.bin.gz", &backup)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", summary);
    assert_eq!(summary["templates"], 1);

    let admin = app.login("admin", ADMIN_PASSWORD).await;
    let (status, bytes) = app
        .download(&admin, &format!("/api/templates/{}/download", id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, workbook);
}

#[tokio::test]
async fn uploads_over_the_limit_are_refused() {
    let app = TestApp::with_upload_limit(1024 * 1024);
    let admin = app.login("admin", ADMIN_PASSWORD).await;
    let workbook = random_workbook(2 * 1024 * 1024);

    let (status, _) = app
        .upload(&admin, "/api/templates", "file", "big.xlsx", &workbook)
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let (status, _) = app
        .upload(&admin, "/api/admin/restore", "snapshot", "big.bin.gz", &workbook)
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (_, templates) = app.call("GET", "/api/templates", Some(&admin), None).await;
    assert_eq!(templates, json!([]));
    let small = b"PK\x03\x04small workbook";
    let (status, _) = app
        .upload(&admin, "/api/templates", "file", "small.xlsx", small)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}
