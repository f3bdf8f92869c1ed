use super::*;

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct Recorded {
    created: Vec<Value>,
    seeded: Vec<(String, Value)>,
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

fn recording_router(recorded: Arc<Mutex<Recorded>>, seed_status: StatusCode) -> Router {
    Router::new()
        .route(
            "/api/v1/processos/",
            post(
                |State(recorded): State<Arc<Mutex<Recorded>>>, Json(body): Json<Value>| async move {
                    recorded.lock().expect("lock").created.push(body.clone());
                    Json(json!({
                        "id": "proc-7",
                        "user_id": body["user_id"],
                        "status": "draft",
                        "created_at": "2026-01-05T10:00:00Z",
                    }))
                },
            ),
        )
        .route(
            "/api/v1/processos/:id/dados-gerais",
            put(
                move |State(recorded): State<Arc<Mutex<Recorded>>>,
                      Path(id): Path<String>,
                      Json(body): Json<Value>| async move {
                    recorded.lock().expect("lock").seeded.push((id, body));
                    seed_status
                },
            ),
        )
        .with_state(recorded)
}

#[tokio::test]
async fn create_process_posts_draft_and_seeds_general_data() {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let base = serve(recording_router(recorded.clone(), StatusCode::OK)).await;
    let service = HttpProcessService::new(&base, Duration::from_secs(5)).expect("service");

    let process_id = service
        .create_process(&UserId::new("user-1"))
        .await
        .expect("create");

    assert_eq!(process_id, ProcessId::new("proc-7"));
    let recorded = recorded.lock().expect("lock");
    assert_eq!(recorded.created.len(), 1);
    assert_eq!(recorded.created[0]["user_id"], "user-1");
    assert_eq!(recorded.created[0]["status"], "draft");
    assert_eq!(recorded.seeded.len(), 1);
    assert_eq!(recorded.seeded[0].0, "proc-7");
    assert_eq!(recorded.seeded[0].1["processo_id"], "proc-7");
}

#[tokio::test]
async fn failed_seed_does_not_fail_creation() {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let base = serve(recording_router(
        recorded.clone(),
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
    .await;
    let service = HttpProcessService::new(&base, Duration::from_secs(5)).expect("service");

    let process_id = service
        .create_process(&UserId::new("user-1"))
        .await
        .expect("create");
    assert_eq!(process_id.as_str(), "proc-7");
}

#[tokio::test]
async fn rejected_creation_reports_server_message() {
    let router = Router::new().route(
        "/api/v1/processos/",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "user_id required"})),
            )
        }),
    );
    let base = serve(router).await;
    let service = HttpProcessService::new(&base, Duration::from_secs(5)).expect("service");

    let error = service
        .create_process(&UserId::new(""))
        .await
        .expect_err("rejected");
    assert!(format!("{error:#}").contains("user_id required"));
}

#[tokio::test]
async fn missing_process_service_fails() {
    assert!(MissingProcessService
        .create_process(&UserId::new("u"))
        .await
        .is_err());
}

#[test]
fn invalid_base_url_is_rejected() {
    assert!(HttpProcessService::new("not a url", Duration::from_secs(1)).is_err());
}
