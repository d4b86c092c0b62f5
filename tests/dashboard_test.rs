use acervo_etl::adapters::MemoryStore;
use acervo_etl::config::DashboardConfig;
use acervo_etl::dashboard::{router, DashboardState, RetryResponse};
use acervo_etl::domain::model::{QueueState, ThesisDocument};
use acervo_etl::domain::ports::{ArchiveStore, QueueStore};
use acervo_etl::Stores;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tower::ServiceExt;

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn thesis(registro: &str, rubro: &str, epoca: &str, materia: &str, minute: u32) -> ThesisDocument {
    ThesisDocument {
        registro: registro.to_string(),
        rubro: rubro.to_string(),
        texto: "texto".to_string(),
        epoca: epoca.to_string(),
        materia: materia.to_string(),
        vector_busqueda: vec![0.5],
        fuente: Some("Repositorio Bicentenario".to_string()),
        procesado: true,
        actualizado_en: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()),
    }
}

/// Five queued registers: two failed, one completed, one claimed, one pending.
async fn populated() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let ids: Vec<String> = (1..=5).map(|i| i.to_string()).collect();
    store.enqueue_batch(&ids).await.unwrap();

    for _ in 0..4 {
        store.claim_next().await.unwrap();
    }
    store.mark_failed("1", "HTTP 404").await.unwrap();
    store.mark_failed("2", "HTTP 500").await.unwrap();
    store.mark_completed("3").await.unwrap();

    store
        .upsert(&thesis("3", "AMPARO DIRECTO", "Décima Época", "Común", 1))
        .await
        .unwrap();
    store
        .upsert(&thesis("9", "<b>DERECHOS</b>", "Novena Época", "Penal", 2))
        .await
        .unwrap();
    store
}

fn ready_state(store: Arc<MemoryStore>) -> DashboardState {
    DashboardState::with_stores(DashboardConfig::default(), Stores::shared(store))
}

#[tokio::test]
async fn test_health_answers_before_store_is_ready() {
    let state = DashboardState::new(DashboardConfig::default());
    assert!(!state.is_ready());

    let response = router(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn test_dashboard_shows_connecting_page_until_ready() {
    let state = DashboardState::new(DashboardConfig::default());
    let app = router(state.clone());

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(response).await.contains("Conectando"));

    let response = app.clone().oneshot(get("/api/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.install(Stores::shared(Arc::new(MemoryStore::new())));
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_dashboard_renders_counts_and_recent_rows() {
    let app = router(ready_state(populated().await));

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    assert!(html.contains("<strong>Total en cola:</strong> 5"));
    assert!(html.contains("<strong>Pendientes:</strong> 1"));
    assert!(html.contains("<strong>Procesando:</strong> 1"));
    assert!(html.contains("<strong>Completados:</strong> 1"));
    assert!(html.contains("<strong>Errores:</strong> 2"));
    assert!(html.contains("AMPARO DIRECTO..."));
    assert!(html.contains("&lt;b&gt;DERECHOS&lt;/b&gt;"));
    assert!(!html.contains("<b>DERECHOS"));

    // newest first
    let newer = html.find("DERECHOS").unwrap();
    let older = html.find("AMPARO").unwrap();
    assert!(newer < older);
}

#[tokio::test]
async fn test_dashboard_filters_by_epoca_and_materia() {
    let app = router(ready_state(populated().await));

    let response = app
        .clone()
        .oneshot(get("/?epoca=D%C3%A9cima%20%C3%89poca&materia="))
        .await
        .unwrap();
    let html = body_text(response).await;
    assert!(html.contains("AMPARO DIRECTO"));
    assert!(!html.contains("DERECHOS"));
    assert!(html.contains(r#"value="Décima Época""#));

    let response = app.oneshot(get("/?materia=Laboral")).await.unwrap();
    let html = body_text(response).await;
    assert!(html.contains("Últimos 0 registros procesados"));
}

#[tokio::test]
async fn test_stats_endpoint_returns_json_counts() {
    let app = router(ready_state(populated().await));

    let response = app.oneshot(get("/api/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(stats["total"], 5);
    assert_eq!(stats["failed"], 2);
    assert_eq!(stats["pending"], 1);
}

#[tokio::test]
async fn test_retry_requeues_failed_entries() {
    let store = populated().await;
    let app = router(ready_state(store.clone()));

    let response = app.oneshot(post("/reintentar-errores")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: RetryResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body.requeued, 2);
    assert_eq!(body.limit, None);
    assert_eq!(store.count(Some(QueueState::Failed)).await.unwrap(), 0);
    assert_eq!(store.count(Some(QueueState::Pending)).await.unwrap(), 3);
    assert!(store.entry("1").await.unwrap().reintentado_en.is_some());
}

#[tokio::test]
async fn test_retry_honours_limit() {
    let store = populated().await;
    let app = router(ready_state(store.clone()));

    let response = app
        .oneshot(post("/reintentar-errores?limit=1"))
        .await
        .unwrap();
    let raw = body_text(response).await;
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(json["reintentos"], 1);
    assert_eq!(json["limit"], 1);
    assert!(json["mensaje"].is_string());
    assert_eq!(store.count(Some(QueueState::Failed)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_retry_rejects_zero_limit() {
    let store = populated().await;
    let app = router(ready_state(store.clone()));

    let response = app
        .oneshot(post("/reintentar-errores?limit=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.count(Some(QueueState::Failed)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_retry_rejects_negative_and_non_numeric_limits() {
    let store = populated().await;
    let app = router(ready_state(store.clone()));

    for uri in ["/reintentar-errores?limit=-3", "/reintentar-errores?limit=abc"] {
        let response = app.clone().oneshot(post(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("limit"));
    }
    assert_eq!(store.count(Some(QueueState::Failed)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_retry_requires_post() {
    let app = router(ready_state(populated().await));
    let response = app.oneshot(get("/reintentar-errores")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
