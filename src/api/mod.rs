//! HTTP surface.
//!
//! Every protected route is declared once in [`access_table`], together with
//! the roles allowed to call it. The router is built from that table, so the
//! table is the single source of truth for authorization.

pub mod auth;
mod documents;
pub mod error;
mod extract;
mod patients;
mod prescriptions;
pub mod rate_limit;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{delete, get, patch, post, put, MethodRouter},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::db::Role;
use crate::AppState;

const RECEPTIONIST: &[Role] = &[Role::Receptionist];
const DOCTOR: &[Role] = &[Role::Doctor];
const STAFF: &[Role] = &[Role::Receptionist, Role::Doctor];

/// One protected route and the roles allowed to call it
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
    pub roles: &'static [Role],
    handler: MethodRouter<Arc<AppState>>,
}

fn endpoint(
    method: Method,
    path: &'static str,
    roles: &'static [Role],
    handler: MethodRouter<Arc<AppState>>,
) -> Endpoint {
    Endpoint {
        method,
        path,
        roles,
        handler,
    }
}

/// Every authenticated route, relative to the API prefix
pub fn access_table() -> Vec<Endpoint> {
    vec![
        // Patients
        endpoint(Method::POST, "/patients", RECEPTIONIST, post(patients::create_patient)),
        endpoint(Method::GET, "/patients", STAFF, get(patients::list_patients)),
        endpoint(Method::GET, "/patients/search", STAFF, get(patients::search_patients)),
        endpoint(Method::GET, "/patients/:id", STAFF, get(patients::get_patient)),
        endpoint(Method::PUT, "/patients/:id", RECEPTIONIST, put(patients::update_patient)),
        endpoint(Method::DELETE, "/patients/:id", RECEPTIONIST, delete(patients::delete_patient)),
        endpoint(Method::PATCH, "/patients/:id/medical", DOCTOR, patch(patients::update_medical)),
        // Prescriptions
        endpoint(
            Method::POST,
            "/patients/:id/prescriptions",
            DOCTOR,
            post(prescriptions::create_prescription),
        ),
        endpoint(
            Method::GET,
            "/patients/:id/prescriptions",
            STAFF,
            get(prescriptions::list_prescriptions),
        ),
        // Documents
        endpoint(Method::POST, "/patients/:id/documents", STAFF, post(documents::upload_document)),
        endpoint(Method::GET, "/patients/:id/documents", STAFF, get(documents::list_documents)),
        endpoint(Method::DELETE, "/documents/:id", RECEPTIONIST, delete(documents::delete_document)),
    ]
}

/// Protected routes: rate limit, then auth gate, then the per-route role gate
fn protected_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let router = access_table()
        .into_iter()
        .fold(Router::new(), |router, endpoint| {
            let handler = endpoint
                .handler
                .route_layer(middleware::from_fn_with_state(endpoint.roles, auth::role_gate));
            router.route(endpoint.path, handler)
        });

    router
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_api))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route(
            "/login",
            post(auth::login).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_login,
            )),
        )
        .merge(protected_routes(&state));

    let prefix = format!("/{}", state.config.server.api_prefix.trim_matches('/'));
    let router = Router::new().route("/healthz", get(health));
    let router = if prefix == "/" {
        router.merge(api_routes)
    } else {
        router.nest(&prefix, api_routes)
    };

    router
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenIssuer;
    use crate::config::Config;
    use crate::db::User;
    use crate::storage::testing::MemoryObjectStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "medportal-test-boundary";

    struct TestApp {
        router: Router,
        store: Arc<MemoryObjectStore>,
        receptionist: String,
        doctor: String,
        doctor_id: i64,
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config
    }

    async fn app_with(config: Config, store: MemoryObjectStore) -> TestApp {
        let db = crate::db::init_in_memory().await.unwrap();
        let store = Arc::new(store);
        let state = Arc::new(AppState::new(config, db, store.clone()));

        state
            .auth
            .create_user("reception", "front-desk-pass", Role::Receptionist)
            .await
            .unwrap();
        let doctor = state
            .auth
            .create_user("drhouse", "vicodin-free", Role::Doctor)
            .await
            .unwrap();

        let router = create_router(state);
        let receptionist = login(&router, "reception", "front-desk-pass").await;
        let doctor_token = login(&router, "drhouse", "vicodin-free").await;

        TestApp {
            router,
            store,
            receptionist,
            doctor: doctor_token,
            doctor_id: doctor.id,
        }
    }

    async fn app() -> TestApp {
        app_with(test_config(), MemoryObjectStore::new()).await
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn login(router: &Router, username: &str, password: &str) -> String {
        let (status, body) = send(
            router,
            json_request(Method::POST, "/api/v1/login", None, json!({ "username": username, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn upload_request(uri: &str, token: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"document\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                b = BOUNDARY,
                f = file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_patient(app: &TestApp, name: &str) -> i64 {
        let (status, body) = send(
            &app.router,
            json_request(
                Method::POST,
                "/api/v1/patients",
                Some(&app.receptionist),
                json!({ "name": name, "age": 30, "address": "X" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }

    #[test]
    fn test_access_table_is_exact() {
        let rows: Vec<(Method, &str, Vec<Role>)> = access_table()
            .into_iter()
            .map(|e| (e.method, e.path, e.roles.to_vec()))
            .collect();

        let r = Role::Receptionist;
        let d = Role::Doctor;
        assert_eq!(
            rows,
            vec![
                (Method::POST, "/patients", vec![r]),
                (Method::GET, "/patients", vec![r, d]),
                (Method::GET, "/patients/search", vec![r, d]),
                (Method::GET, "/patients/:id", vec![r, d]),
                (Method::PUT, "/patients/:id", vec![r]),
                (Method::DELETE, "/patients/:id", vec![r]),
                (Method::PATCH, "/patients/:id/medical", vec![d]),
                (Method::POST, "/patients/:id/prescriptions", vec![d]),
                (Method::GET, "/patients/:id/prescriptions", vec![r, d]),
                (Method::POST, "/patients/:id/documents", vec![r, d]),
                (Method::GET, "/patients/:id/documents", vec![r, d]),
                (Method::DELETE, "/documents/:id", vec![r]),
            ]
        );
    }

    #[tokio::test]
    async fn test_role_gate_for_every_role_and_endpoint() {
        let app = app().await;

        for endpoint in access_table() {
            let uri = format!("/api/v1{}", endpoint.path.replace(":id", "1"));
            for (role, token) in [(Role::Receptionist, &app.receptionist), (Role::Doctor, &app.doctor)] {
                let request = empty_request(endpoint.method.clone(), &uri, Some(token));
                let (status, body) = send(&app.router, request).await;

                if endpoint.roles.contains(&role) {
                    assert_ne!(status, StatusCode::FORBIDDEN, "{} {} as {}", endpoint.method, uri, role);
                    assert_ne!(status, StatusCode::UNAUTHORIZED, "{} {} as {}", endpoint.method, uri, role);
                } else {
                    assert_eq!(status, StatusCode::FORBIDDEN, "{} {} as {}", endpoint.method, uri, role);
                    assert_eq!(body["code"], "forbidden");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_every_endpoint_requires_a_token() {
        let app = app().await;
        for endpoint in access_table() {
            let uri = format!("/api/v1{}", endpoint.path.replace(":id", "1"));
            let (status, body) = send(&app.router, empty_request(endpoint.method.clone(), &uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", endpoint.method, uri);
            assert_eq!(body["code"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn test_malformed_authorization_headers() {
        let app = app().await;
        for value in [
            "Basic abc".to_string(),
            "Bearer".to_string(),
            format!("bearer {}", app.doctor),
            format!("Bearer {} extra", app.doctor),
            "Bearer not-a-token".to_string(),
        ] {
            let request = Request::builder()
                .uri("/api/v1/patients")
                .header(header::AUTHORIZATION, value.clone())
                .body(Body::empty())
                .unwrap();
            let (status, _) = send(&app.router, request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", value);
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let app = app().await;
        let expired = TokenIssuer::new("test-secret", -1)
            .issue(&User {
                id: app.doctor_id,
                username: "drhouse".to_string(),
                password_hash: String::new(),
                role: Role::Doctor,
                created_at: String::new(),
            })
            .unwrap();

        let (status, body) = send(&app.router, empty_request(Method::GET, "/api/v1/patients", Some(&expired))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token expired");
    }

    #[tokio::test]
    async fn test_login_failures() {
        let app = app().await;
        let (wrong, wrong_body) = send(
            &app.router,
            json_request(Method::POST, "/api/v1/login", None, json!({ "username": "drhouse", "password": "nope" })),
        )
        .await;
        let (unknown, unknown_body) = send(
            &app.router,
            json_request(Method::POST, "/api/v1/login", None, json!({ "username": "ghost", "password": "nope" })),
        )
        .await;
        assert_eq!(wrong, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_body, unknown_body);

        let (malformed, body) = send(
            &app.router,
            json_request(Method::POST, "/api/v1/login", None, json!({ "username": "drhouse" })),
        )
        .await;
        assert_eq!(malformed, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let mut config = test_config();
        config.rate_limit.login_requests_per_window = 3;
        let app = app_with(config, MemoryObjectStore::new()).await;

        // Two of the three attempts were spent logging in during setup
        let attempt = || json_request(Method::POST, "/api/v1/login", None, json!({ "username": "x", "password": "y" }));
        let (status, _) = send(&app.router, attempt()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = app.router.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = app().await;
        let (status, body) = send(&app.router, empty_request(Method::GET, "/healthz", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_doctor_cannot_create_patient() {
        let app = app().await;
        let (status, _) = send(
            &app.router,
            json_request(
                Method::POST,
                "/api/v1/patients",
                Some(&app.doctor),
                json!({ "name": "A", "age": 30, "address": "X" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_medical_update_keeps_demographics() {
        let app = app().await;
        let id = create_patient(&app, "A").await;

        let (status, body) = send(
            &app.router,
            json_request(
                Method::PATCH,
                &format!("/api/v1/patients/{}/medical", id),
                Some(&app.doctor),
                json!({ "diagnosis": "Flu" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diagnosis"], "Flu");

        let (status, body) = send(
            &app.router,
            empty_request(Method::GET, &format!("/api/v1/patients/{}", id), Some(&app.receptionist)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diagnosis"], "Flu");
        assert_eq!(body["name"], "A");

        // Demographic update leaves the diagnosis alone
        let (status, body) = send(
            &app.router,
            json_request(
                Method::PUT,
                &format!("/api/v1/patients/{}", id),
                Some(&app.receptionist),
                json!({ "name": "B", "age": 31, "address": "Y", "diagnosis": "Healthy" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "B");
        assert_eq!(body["diagnosis"], "Flu");
    }

    #[tokio::test]
    async fn test_create_patient_validation_details() {
        let app = app().await;
        let (status, body) = send(
            &app.router,
            json_request(
                Method::POST,
                "/api/v1/patients",
                Some(&app.receptionist),
                json!({ "name": "", "age": 0, "address": "X" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
        assert!(body["details"]["name"].is_array());
        assert!(body["details"]["age"].is_array());
    }

    #[tokio::test]
    async fn test_search_and_missing_query() {
        let app = app().await;
        create_patient(&app, "Alice").await;
        create_patient(&app, "bob").await;
        create_patient(&app, "Malik").await;

        let (status, body) = send(
            &app.router,
            empty_request(Method::GET, "/api/v1/patients/search?q=LI", Some(&app.doctor)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Alice", "Malik"]);

        let (status, _) = send(
            &app.router,
            empty_request(Method::GET, "/api/v1/patients/search", Some(&app.doctor)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_prescription_doctor_comes_from_token() {
        let app = app().await;
        let id = create_patient(&app, "A").await;

        let (status, body) = send(
            &app.router,
            json_request(
                Method::POST,
                &format!("/api/v1/patients/{}/prescriptions", id),
                Some(&app.doctor),
                json!({
                    "medication": "Amoxicillin",
                    "dosage": "500mg",
                    "frequency": "3x daily",
                    "doctor_id": app.doctor_id + 100
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["doctor_id"], app.doctor_id);
        assert_eq!(body["patient_id"], id);

        let (status, body) = send(
            &app.router,
            empty_request(
                Method::GET,
                &format!("/api/v1/patients/{}/prescriptions", id),
                Some(&app.receptionist),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_list_and_delete_document() {
        let app = app().await;
        let id = create_patient(&app, "A").await;

        let (status, document) = send(
            &app.router,
            upload_request(&format!("/api/v1/patients/{}/documents", id), &app.doctor, "scan.png", b"\x89PNG"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", document);
        assert_eq!(document["file_name"], "scan.png");
        assert_eq!(document["mime_type"], "image/png");
        assert!(document.get("external_object_id").is_none());
        assert_eq!(app.store.len(), 1);

        let (_, listed) = send(
            &app.router,
            empty_request(Method::GET, &format!("/api/v1/patients/{}/documents", id), Some(&app.doctor)),
        )
        .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let doc_id = document["id"].as_i64().unwrap();
        let (status, _) = send(
            &app.router,
            empty_request(Method::DELETE, &format!("/api/v1/documents/{}", doc_id), Some(&app.receptionist)),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.store.len(), 0);
    }

    #[tokio::test]
    async fn test_upload_store_failure_leaves_no_metadata() {
        let app = app_with(test_config(), MemoryObjectStore::failing_store()).await;
        let id = create_patient(&app, "A").await;

        let (status, body) = send(
            &app.router,
            upload_request(&format!("/api/v1/patients/{}/documents", id), &app.receptionist, "a.pdf", b"%PDF"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "upload_failed");

        let (_, listed) = send(
            &app.router,
            empty_request(Method::GET, &format!("/api/v1/patients/{}/documents", id), Some(&app.receptionist)),
        )
        .await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let mut config = test_config();
        config.server.max_upload_bytes = 1024;
        let app = app_with(config, MemoryObjectStore::new()).await;
        let id = create_patient(&app, "A").await;

        let (status, body) = send(
            &app.router,
            upload_request(
                &format!("/api/v1/patients/{}/documents", id),
                &app.receptionist,
                "scan.pdf",
                &[0u8; 4096],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "payload_too_large");
        assert_eq!(app.store.stores(), 0);
    }

    #[tokio::test]
    async fn test_upload_requires_document_field() {
        let app = app().await;
        let id = create_patient(&app, "A").await;

        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/patients/{}/documents", id))
            .header(header::AUTHORIZATION, format!("Bearer {}", app.receptionist))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["document"].is_array());
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_not_found() {
        let app = app().await;
        let (status, body) = send(
            &app.router,
            empty_request(Method::DELETE, "/api/v1/documents/9999", Some(&app.receptionist)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_delete_patient_releases_documents() {
        let app = app().await;
        let id = create_patient(&app, "A").await;
        send(
            &app.router,
            upload_request(&format!("/api/v1/patients/{}/documents", id), &app.receptionist, "a.pdf", b"%PDF"),
        )
        .await;
        assert_eq!(app.store.len(), 1);

        let (status, _) = send(
            &app.router,
            empty_request(Method::DELETE, &format!("/api/v1/patients/{}", id), Some(&app.receptionist)),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.store.len(), 0);

        let (status, _) = send(
            &app.router,
            empty_request(Method::GET, &format!("/api/v1/patients/{}", id), Some(&app.doctor)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_path_id_is_bad_request() {
        let app = app().await;
        let (status, body) = send(
            &app.router,
            empty_request(Method::GET, "/api/v1/patients/abc", Some(&app.doctor)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }
}
