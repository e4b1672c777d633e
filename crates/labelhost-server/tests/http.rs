use std::fs;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use labelhost_config::{FeatureFlags, LocalFilesConfig, ServerConfig};
use labelhost_files::DISABLED_MESSAGE;
use labelhost_server::db::SqliteStore;
use labelhost_server::{router, ServerState};
use tempfile::TempDir;
use tower::ServiceExt;

const MEMBER: &str = "member-token";
const OUTSIDER: &str = "outsider-token";
const ADMIN: &str = "admin-token";
const NO_ORG: &str = "no-org-token";

const IMAGE: &[u8] = b"\x89PNG\r\n\x1a\n not really an image but long enough to slice into ranges \
with some extra padding bytes so a hundred byte range fits inside the file comfortably";

struct App {
    root: TempDir,
    router: Router,
}

/// Document root holding `projA/img.png`, with a storage at `projA` owned by a
/// project in the member's organization.
fn app(serving_enabled: bool, flags: FeatureFlags) -> App {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("projA")).unwrap();
    fs::create_dir_all(root.path().join("projA2")).unwrap();
    fs::write(root.path().join("projA/img.png"), IMAGE).unwrap();
    fs::write(root.path().join("projA2/other.txt"), b"other").unwrap();
    fs::write(root.path().join("outside.txt"), b"outside any storage").unwrap();

    let store = SqliteStore::in_memory().unwrap();
    let org = store.create_organization("Acme").unwrap();
    let other_org = store.create_organization("Other").unwrap();
    let project = store.create_project("Images", org).unwrap();
    store.add_local_storage(&root.path().join("projA"), project).unwrap();

    let member = store.create_user("member@example.com", Some(org), false).unwrap();
    store.create_token(member, MEMBER).unwrap();
    let outsider = store.create_user("outsider@example.com", Some(other_org), false).unwrap();
    store.create_token(outsider, OUTSIDER).unwrap();
    let admin = store.create_user("admin@example.com", Some(org), true).unwrap();
    store.create_token(admin, ADMIN).unwrap();
    let no_org = store.create_user("new@example.com", None, false).unwrap();
    store.create_token(no_org, NO_ORG).unwrap();

    let config = ServerConfig {
        local_files: LocalFilesConfig {
            serving_enabled,
            document_root: root.path().to_path_buf(),
        },
        ..ServerConfig::default()
    };
    let state = Arc::new(ServerState::new(config, Arc::new(store), flags));
    App { root, router: router(state) }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &App, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn serves_file_from_readable_storage() {
    let app = app(true, FeatureFlags::default());
    let response = send(&app, get("/data/local-files/?d=projA/img.png", Some(MEMBER))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body(response).await, IMAGE);
}

#[tokio::test]
async fn range_request_returns_partial_content() {
    let app = app(true, FeatureFlags::default());
    let mut request = get("/data/local-files/?d=projA/img.png", Some(MEMBER));
    request.headers_mut().insert(header::RANGE, "bytes=0-99".parse().unwrap());

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        format!("bytes 0-99/{}", IMAGE.len()).as_str()
    );
    assert_eq!(body(response).await, &IMAGE[..100]);
}

#[tokio::test]
async fn repeated_requests_are_identical() {
    let app = app(true, FeatureFlags::default());
    let first = body(send(&app, get("/data/local-files/?d=projA/img.png", Some(MEMBER))).await).await;
    let second = body(send(&app, get("/data/local-files/?d=projA/img.png", Some(MEMBER))).await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn disabled_serving_is_forbidden_for_everyone() {
    let app = app(false, FeatureFlags::default());
    for (uri, token) in [
        ("/data/local-files/?d=projA/img.png", Some(MEMBER)),
        ("/data/local-files/?d=projA/img.png", None),
        ("/data/local-files/?d=../../etc/passwd", Some(OUTSIDER)),
        ("/data/local-files/", Some(ADMIN)),
    ] {
        let response = send(&app, get(uri, token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body(response).await, DISABLED_MESSAGE.as_bytes());
    }
}

#[tokio::test]
async fn repeated_d_is_refused_with_message_when_disabled() {
    let app = app(false, FeatureFlags::default());
    let response = send(&app, get("/data/local-files/?d=a&d=b", Some(MEMBER))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(response).await, DISABLED_MESSAGE.as_bytes());
}

#[tokio::test]
async fn repeated_d_uses_last_value() {
    let app = app(true, FeatureFlags::default());
    let response = send(&app, get("/data/local-files/?d=nope.png&d=projA/img.png", Some(MEMBER))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, IMAGE);

    let response = send(&app, get("/data/local-files/?d=projA/img.png&d=nope.png", Some(MEMBER))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_or_pathless_requests_are_forbidden() {
    let app = app(true, FeatureFlags::default());
    for (uri, token) in [
        ("/data/local-files/?d=projA/img.png", None),
        ("/data/local-files/?d=projA/img.png", Some("unknown-token")),
        ("/data/local-files/", Some(MEMBER)),
        ("/data/local-files/?d=", Some(MEMBER)),
    ] {
        let response = send(&app, get(uri, token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn traversal_is_not_found() {
    let app = app(true, FeatureFlags::default());
    for d in [
        "../../etc/passwd",
        "projA/../../etc/passwd",
        "..%5C..%5Cetc%5Cpasswd",
        "projA%5C..%5C..%5Csecret",
    ] {
        let uri = format!("/data/local-files/?d={d}");
        let response = send(&app, get(&uri, Some(MEMBER))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{d}");
        assert!(body(response).await.is_empty());
    }
}

#[tokio::test]
async fn no_project_access_is_not_found() {
    let app = app(true, FeatureFlags::default());
    for token in [OUTSIDER, NO_ORG] {
        let response = send(&app, get("/data/local-files/?d=projA/img.png", Some(token))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body(response).await.is_empty());
    }
}

#[tokio::test]
async fn paths_outside_storages_are_not_found() {
    let app = app(true, FeatureFlags::default());
    for d in ["outside.txt", "projA2/other.txt", "projA/missing.png"] {
        let uri = format!("/data/local-files/?d={d}");
        let response = send(&app, get(&uri, Some(MEMBER))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{d}");
    }
    assert!(app.root.path().join("outside.txt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_to_another_storage_is_not_found() {
    let app = app(true, FeatureFlags::default());
    fs::create_dir_all(app.root.path().join("projB")).unwrap();
    fs::write(app.root.path().join("projB/secret.txt"), b"other org secret").unwrap();
    std::os::unix::fs::symlink(
        app.root.path().join("projB/secret.txt"),
        app.root.path().join("projA/link.txt"),
    )
    .unwrap();

    let response = send(&app, get("/data/local-files/?d=projA/link.txt", Some(MEMBER))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn health_reports_up() {
    let app = app(false, FeatureFlags::default());
    let response = send(&app, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body(response).await).unwrap();
    assert_eq!(json, serde_json::json!({"status": "UP"}));
}

#[tokio::test]
async fn index_redirects_by_auth_state() {
    let app = app(false, FeatureFlags::default());
    let cases = [
        (Some(MEMBER), "/projects/"),
        (Some(NO_ORG), "/user/login/"),
        (None, "/user/login/"),
    ];
    for (token, location) in cases {
        let response = send(&app, get("/", token)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], location);
    }
}

#[tokio::test]
async fn version_json_and_page() {
    let app = app(false, FeatureFlags::default());

    let response = send(&app, get("/api/version", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body(response).await).unwrap();
    assert_eq!(json["edition"], "Community");
    assert_eq!(json["labelhost-server"]["package"], "labelhost-server");

    let page = String::from_utf8(body(send(&app, get("/version", Some(MEMBER))).await).await).unwrap();
    assert!(page.starts_with("<pre>") && page.ends_with("</pre>"));
    assert!(!page.contains("LOCAL_FILES_SERVING_ENABLED"));

    let page = String::from_utf8(body(send(&app, get("/version", Some(ADMIN))).await).await).unwrap();
    assert!(page.contains("LOCAL_FILES_SERVING_ENABLED"));
    assert!(!page.contains("DATABASE_URL"));
}

#[tokio::test]
async fn feature_flags_require_authentication() {
    let flags = FeatureFlags::from_json(r#"{"ff_front_dev_1234_short": true}"#).unwrap();
    let app = app(false, flags);

    let response = send(&app, get("/feature-flags", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body(response).await.is_empty());

    let response = send(&app, get("/feature-flags", Some(MEMBER))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(body(response).await).unwrap();
    let json_text = page.strip_prefix("<pre>").unwrap().strip_suffix("</pre>").unwrap();
    let json: serde_json::Value = serde_json::from_str(json_text).unwrap();
    assert_eq!(json["ff_front_dev_1234_short"], true);
    assert_eq!(json["$system"]["VERSION_EDITION"], "Community");
    assert_eq!(json["$system"]["FEATURE_FLAGS_FROM_FILE"], false);
    assert!(json["$system"]["CLOUD_INSTANCE"].is_null());
    assert!(json_text.contains("\n    \""));
}
