use std::collections::HashSet;
use std::time::{Duration, Instant};

use actix_web::{HttpRequest, HttpResponse, get, http::header, post, web};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    AppState,
    error::AppError,
    models::tree::{TreeResponse, TreeTimings},
    tree::{self, TreeSnapshot},
};

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(web::scope("/api").service(get_tree));
}

#[get("/healthz")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "canopy-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Clone)]
struct TreeRequest {
    path: String,
    open_paths: HashSet<String>,
    update_path: String,
    include_timings: bool,
    log_timings: bool,
}

// Total decode of the untrusted body: a malformed payload or wrongly-typed
// field degrades to its default instead of rejecting the request.
fn parse_tree_request(body: &[u8]) -> TreeRequest {
    let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let text = |name: &str| payload.get(name).and_then(Value::as_str).unwrap_or("");
    let flag = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };

    TreeRequest {
        path: tree::normalize_api_path(text("path")),
        open_paths: tree::normalize_open_paths(payload.get("open_paths")),
        update_path: tree::normalize_api_path(text("update_path")),
        include_timings: flag("include_timings"),
        log_timings: flag("log_timings"),
    }
}

fn authorize(req: &HttpRequest, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let supplied = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if supplied == Some(expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("missing or invalid API token".into()))
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[post("/tree")]
async fn get_tree(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, state.api_token.as_deref())?;

    let started = Instant::now();
    let request = parse_tree_request(&body);

    let storage = state.storage.as_ref();
    if !storage.supports_tree() {
        return Err(AppError::Unsupported(
            "storage backend does not support the filesystem tree endpoint".into(),
        ));
    }

    let expanded = tree::expanded_paths(&request.path, &request.open_paths, &request.update_path);

    let walk_started = Instant::now();
    let TreeSnapshot { items, listed_dirs } =
        tree::collect_tree(storage, &request.path, &expanded);
    let tree_ms = duration_ms(walk_started.elapsed());

    let item_count = items.len();
    let response = TreeResponse {
        items,
        timings: request.include_timings.then(|| TreeTimings {
            tree_ms,
            listed_dirs,
            item_count,
        }),
    };

    let encode_started = Instant::now();
    let encoded = serde_json::to_string(&response)?;
    let encode_ms = duration_ms(encode_started.elapsed());
    let total_ms = duration_ms(started.elapsed());

    if request.log_timings {
        info!(
            path = %request.path,
            tree_ms,
            encode_ms,
            total_ms,
            item_count,
            listed_dirs,
            "tree request"
        );
    }

    Ok(HttpResponse::Ok()
        .content_type(header::ContentType::json())
        .insert_header(("X-Canopy-Tree-Ms", format!("{tree_ms:.3}")))
        .insert_header(("X-Canopy-Encode-Ms", format!("{encode_ms:.3}")))
        .insert_header(("X-Canopy-Total-Ms", format!("{total_ms:.3}")))
        .insert_header(("X-Canopy-Item-Count", item_count.to_string()))
        .insert_header(("X-Canopy-Listed-Dirs", listed_dirs.to_string()))
        .body(encoded))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use actix_web::{App, test};

    use super::*;
    use crate::storage::{ChildEntry, LocalStorage, StorageBackend};

    fn app_state(root: &Path, token: Option<&str>) -> web::Data<AppState> {
        web::Data::new(AppState {
            storage: Arc::new(LocalStorage::new(root.to_path_buf(), false)),
            api_token: token.map(str::to_string),
        })
    }

    #[actix_web::test]
    async fn tree_returns_flattened_items_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.txt"), b"").unwrap();
        fs::write(dir.path().join("readme.md"), b"").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(app_state(dir.path(), None))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/tree")
            .set_json(json!({ "path": "", "open_paths": ["docs"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        for name in [
            "x-canopy-tree-ms",
            "x-canopy-encode-ms",
            "x-canopy-total-ms",
            "x-canopy-item-count",
            "x-canopy-listed-dirs",
        ] {
            assert!(resp.headers().contains_key(name), "missing header {name}");
        }
        assert_eq!(resp.headers().get("x-canopy-item-count").unwrap(), "3");
        assert_eq!(resp.headers().get("x-canopy-listed-dirs").unwrap(), "2");

        let body: Value = test::read_body_json(resp).await;
        let paths: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, ["docs", "docs/a.txt", "readme.md"]);
        assert!(body.get("timings").is_none());
    }

    #[actix_web::test]
    async fn tree_includes_timings_on_request() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(app_state(dir.path(), None))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/tree")
            .set_json(json!({ "include_timings": true }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let timings = &body["timings"];
        assert!(timings["tree_ms"].is_number());
        assert_eq!(timings["listed_dirs"], 1);
        assert_eq!(timings["item_count"], 1);
    }

    #[actix_web::test]
    async fn tree_tolerates_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(app_state(dir.path(), None))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/tree")
            .set_payload("not json at all")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    struct UnsupportedStorage;

    impl StorageBackend for UnsupportedStorage {
        fn supports_tree(&self) -> bool {
            false
        }
        fn resolve(&self, _api_path: &str) -> PathBuf {
            PathBuf::new()
        }
        fn is_directory(&self, _location: &Path) -> bool {
            false
        }
        fn can_write(&self, _location: &Path) -> bool {
            false
        }
        fn list_children(&self, _location: &Path) -> io::Result<Vec<ChildEntry>> {
            Ok(Vec::new())
        }
        fn allow_hidden(&self) -> bool {
            false
        }
    }

    #[actix_web::test]
    async fn tree_answers_501_without_capability() {
        let state = web::Data::new(AppState {
            storage: Arc::new(UnsupportedStorage),
            api_token: None,
        });
        let app = test::init_service(App::new().app_data(state).configure(register)).await;

        let req = test::TestRequest::post()
            .uri("/api/tree")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 501);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("not support"));
    }

    #[actix_web::test]
    async fn tree_rejects_bad_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(dir.path(), Some("sesame")))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/tree")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 401);

        let req = test::TestRequest::post()
            .uri("/api/tree")
            .insert_header((header::AUTHORIZATION, "Bearer sesame"))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn healthz_reports_service() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(app_state(dir.path(), None))
                .configure(register),
        )
        .await;

        let req = test::TestRequest::get().uri("/healthz").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "canopy-backend");
    }
}
