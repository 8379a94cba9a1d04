//! # Medicine Tracker Backend
//!
//! A personal medicine tracker: daily medicines (tablets and syrups) grouped
//! by time of day, each with an optional prescription image.
//!
//! ## Architecture
//!
//! ```text
//! Browser (server-rendered pages + static/app.js)
//!     ↓
//! IO Layer (REST API, views)
//!     ↓
//! Domain Layer (MedicineService)
//!     ↓
//! Storage Layer (SQLite repository, prescription file store)
//! ```
//!
//! [`initialize_backend`] builds the storage handles once and injects them
//! into the services; [`create_router`] wires every route around that state.

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, http::Method, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::Config;
use crate::domain::MedicineService;
use crate::storage::{DbConnection, FileStore, MedicineRepository};

/// Headroom for the form fields that travel alongside an image upload
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub medicine_service: MedicineService,
}

/// Open the database and upload directory and build the services
pub async fn initialize_backend(config: &Config) -> Result<AppState> {
    info!("Setting up database");
    let db_conn = DbConnection::new(&config.database_path).await?;

    info!("Setting up prescription store at {}", config.upload_dir.display());
    let files = FileStore::new(&config.upload_dir, config.max_upload_bytes)
        .await
        .with_context(|| format!("Failed to prepare upload directory {}", config.upload_dir.display()))?;

    Ok(build_state(db_conn, files))
}

fn build_state(db_conn: DbConnection, files: FileStore) -> AppState {
    let repository = Arc::new(MedicineRepository::new(db_conn));
    AppState {
        medicine_service: MedicineService::new(repository, files),
    }
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(io::rest::router())
        .merge(io::views::router())
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + FORM_OVERHEAD_BYTES))
        .layer(cors)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use shared::{Medicine, MedicineListResponse, PrescriptionUploadResponse};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "medicine-test-boundary";
    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

    struct TestApp {
        router: Router,
        _dir: TempDir,
    }

    async fn setup_test() -> TestApp {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path: dir.path().join("unused.sqlite"),
            upload_dir: dir.path().join("prescriptions"),
            static_dir: std::path::PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
            max_upload_bytes: 1024,
        };

        let db_conn = DbConnection::init_test().await.expect("Failed to init test db");
        let files = FileStore::new(&config.upload_dir, config.max_upload_bytes)
            .await
            .expect("Failed to create file store");

        TestApp {
            router: create_router(build_state(db_conn, files), &config),
            _dir: dir,
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn send_json(&self, method: &str, uri: &str, body: Value) -> Response {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        async fn get(&self, uri: &str) -> Response {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
        }

        async fn create(&self, name: &str, times: &[&str]) -> Medicine {
            let response = self
                .send_json(
                    "POST",
                    "/medicines",
                    json!({"name": name, "type": "tablet", "dosage": "500mg", "time_of_day": times}),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            body_json(response).await
        }
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    /// Build a multipart body from text fields and an optional (file name, bytes) image
    fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"prescription\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(method: &str, uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_list_delete_round_trip() {
        let app = setup_test().await;

        let created = app.create("Paracetamol", &["morning"]).await;
        assert!(created.id > 0);
        assert!(created.active);

        let response = app.get("/medicines").await;
        assert_eq!(response.status(), StatusCode::OK);
        let list: MedicineListResponse = body_json(response).await;
        assert!(list.medicines.iter().any(|m| m.id == created.id && m.name == "Paracetamol"));

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/medicines/{}", created.id))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.send(delete).await.status(), StatusCode::NO_CONTENT);

        let response = app.get(&format!("/medicines/{}", created.id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_filter_and_order() {
        let app = setup_test().await;
        app.create("A", &["morning"]).await;
        app.create("B", &["evening"]).await;
        app.create("C", &["morning"]).await;

        let list: MedicineListResponse = body_json(app.get("/medicines").await).await;
        let names: Vec<_> = list.medicines.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "B"]);

        let list: MedicineListResponse = body_json(app.get("/medicines?time_of_day=evening").await).await;
        let names: Vec<_> = list.medicines.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["B"]);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let app = setup_test().await;

        let response = app
            .send_json(
                "POST",
                "/medicines",
                json!({"name": "X", "type": "tablet", "dosage": "1", "time_of_day": ["morning"], "colour": "red"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send_json(
                "POST",
                "/medicines",
                json!({"name": "  ", "type": "tablet", "dosage": "1", "time_of_day": ["morning"]}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "VALIDATION_ERROR");

        let request = Request::builder()
            .method("POST")
            .uri("/medicines")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("Paracetamol"))
            .unwrap();
        assert_eq!(app.send(request).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_multipart_create_and_serve_prescription() {
        let app = setup_test().await;

        let body = multipart_body(
            &[
                ("name", "Cough syrup"),
                ("type", "syrup"),
                ("dosage", "10ml"),
                ("time_of_day", "morning"),
                ("time_of_day", "evening"),
            ],
            Some(("scan.PNG", PNG_BYTES)),
        );
        let response = app.send(multipart_request("POST", "/medicines", body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Medicine = body_json(response).await;
        let path = created.prescription_path.expect("prescription stored");
        assert!(path.ends_with(".png"));

        let response = app.get(&format!("/prescriptions/{path}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(body_bytes(response).await, PNG_BYTES);
    }

    #[tokio::test]
    async fn test_replace_prescription_removes_old_image() {
        let app = setup_test().await;
        let created = app.create("Ibuprofen", &["afternoon"]).await;

        let uri = format!("/medicines/{}/prescription", created.id);
        let response = app
            .send(multipart_request("POST", &uri, multipart_body(&[], Some(("first.jpg", &b"first"[..])))))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let first: PrescriptionUploadResponse = body_json(response).await;

        let response = app
            .send(multipart_request("POST", &uri, multipart_body(&[], Some(("second.webp", &b"second"[..])))))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let second: PrescriptionUploadResponse = body_json(response).await;

        assert_ne!(first.url, second.url);
        assert_eq!(app.get(&first.url).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.get(&second.url).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type_and_oversize() {
        let app = setup_test().await;
        let created = app.create("Vitamin D", &["morning"]).await;
        let uri = format!("/medicines/{}/prescription", created.id);

        let response = app
            .send(multipart_request("POST", &uri, multipart_body(&[], Some(("notes.pdf", &b"%PDF"[..])))))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "UNSUPPORTED_TYPE");

        let big = vec![0u8; 2048];
        let response = app
            .send(multipart_request("POST", &uri, multipart_body(&[], Some(("big.png", big.as_slice())))))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let fetched: Medicine = body_json(app.get(&format!("/medicines/{}", created.id)).await).await;
        assert!(fetched.prescription_path.is_none());
    }

    #[tokio::test]
    async fn test_partial_update() {
        let app = setup_test().await;
        let created = app.create("Aspirin", &["morning"]).await;
        let uri = format!("/medicines/{}", created.id);

        let response = app
            .send_json("PATCH", &uri, json!({"dosage": "75mg", "active": false}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Medicine = body_json(response).await;
        assert_eq!(updated.name, "Aspirin");
        assert_eq!(updated.dosage, "75mg");
        assert!(!updated.active);

        let response = app.send_json("PUT", "/medicines/9999", json!({"name": "Ghost"})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_urls_get_json_errors() {
        let app = setup_test().await;
        app.create("A", &["morning"]).await;

        let response = app.get("/medicines?time_of_day=night").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "VALIDATION_ERROR");

        let response = app.get("/medicines/abc").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "VALIDATION_ERROR");

        let response = app.get("/ui/medicines/abc/edit").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_empty_time_filter_lists_everything() {
        let app = setup_test().await;
        app.create("A", &["morning"]).await;
        app.create("B", &["evening"]).await;

        let response = app.get("/medicines?time_of_day=").await;
        assert_eq!(response.status(), StatusCode::OK);
        let list: MedicineListResponse = body_json(response).await;
        assert_eq!(list.medicines.len(), 2);

        assert_eq!(app.get("/?time_of_day=").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let app = setup_test().await;
        let created = app.create("Vitamin C", &["morning"]).await;

        let huge = vec![0u8; 2 * 1024 * 1024];
        let uri = format!("/medicines/{}/prescription", created.id);
        let response = app
            .send(multipart_request("POST", &uri, multipart_body(&[], Some(("huge.png", huge.as_slice())))))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let error: Value = body_json(response).await;
        assert_eq!(error["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_multipart_edit_replaces_then_removes_prescription() {
        let app = setup_test().await;

        let body = multipart_body(
            &[("name", "Amoxicillin"), ("type", "tablet"), ("dosage", "250mg"), ("time_of_day", "morning")],
            Some(("old.png", PNG_BYTES)),
        );
        let response = app.send(multipart_request("POST", "/medicines", body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Medicine = body_json(response).await;
        let old_path = created.prescription_path.expect("prescription stored");
        let uri = format!("/medicines/{}", created.id);

        // Same fields the edit form submits
        let body = multipart_body(
            &[
                ("name", "Amoxicillin"),
                ("type", "tablet"),
                ("dosage", "500mg"),
                ("time_of_day", "morning"),
                ("time_of_day", "evening"),
                ("notes", ""),
                ("active", "true"),
            ],
            Some(("new.jpg", &b"new image"[..])),
        );
        let response = app.send(multipart_request("PUT", &uri, body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Medicine = body_json(response).await;
        let new_path = updated.prescription_path.expect("replacement stored");
        assert_ne!(new_path, old_path);
        assert!(new_path.ends_with(".jpg"));
        assert_eq!(updated.dosage, "500mg");
        assert_eq!(updated.time_of_day.len(), 2);

        assert_eq!(app.get(&format!("/prescriptions/{old_path}")).await.status(), StatusCode::NOT_FOUND);
        let response = app.get(&format!("/prescriptions/{new_path}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"new image");

        let body = multipart_body(&[("remove_prescription", "on")], None);
        let response = app.send(multipart_request("PATCH", &uri, body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cleared: Medicine = body_json(response).await;
        assert!(cleared.prescription_path.is_none());
        assert_eq!(app.get(&format!("/prescriptions/{new_path}")).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_prescription_path_traversal_is_not_found() {
        let app = setup_test().await;
        let response = app.get("/prescriptions/..%2F..%2Fetc%2Fpasswd.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pages_render() {
        let app = setup_test().await;
        let created = app.create("Metformin", &["evening"]).await;

        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("Metformin"));
        assert!(html.contains("theme-toggle"));

        let response = app.get(&format!("/ui/medicines/{}/edit", created.id)).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(app.get("/ui/medicines/new").await.status(), StatusCode::OK);
        assert_eq!(app.get("/ui/medicines/9999/edit").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            app.get(&format!("/ui/medicines/{}/prescription", created.id)).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_static_assets_served() {
        let app = setup_test().await;
        let response = app.get("/static/app.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        let script = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(script.contains("medicine-tracker-theme"));
    }
}
