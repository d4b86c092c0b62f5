use acervo_etl::adapters::{MemoryStore, OpenAiEmbedder, ScjnClient};
use acervo_etl::config::{EmbeddingConfig, SourceConfig};
use acervo_etl::core::worker::ProcessOutcome;
use acervo_etl::domain::model::QueueState;
use acervo_etl::domain::ports::QueueStore;
use acervo_etl::{RecordProcessor, Stores};
use httpmock::prelude::*;
use std::sync::Arc;

fn source_for(server: &MockServer) -> Arc<ScjnClient> {
    let config = SourceConfig {
        endpoint: server.url("/tesis"),
        timeout_seconds: 5,
    };
    Arc::new(ScjnClient::new(&config).unwrap())
}

fn embedder_for(server: &MockServer, attempts: u32) -> Arc<OpenAiEmbedder> {
    let config = EmbeddingConfig {
        endpoint: server.url("/v1"),
        api_key: Some("test-key".to_string()),
        attempts,
        retry_delay_ms: 0,
        timeout_seconds: 5,
        ..EmbeddingConfig::default()
    };
    Arc::new(OpenAiEmbedder::new(&config).unwrap())
}

async fn claimed(store: &MemoryStore, registro: &str) -> acervo_etl::domain::model::QueueEntry {
    store.enqueue_batch(&[registro.to_string()]).await.unwrap();
    store.claim_next().await.unwrap().unwrap()
}

#[tokio::test]
async fn test_processes_thesis_end_to_end() {
    let scjn = MockServer::start();
    let openai = MockServer::start();

    let thesis_mock = scjn.mock(|when, then| {
        when.method(GET).path("/tesis/2031000");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "rubro": "SUSPENSIÓN DEFINITIVA. PROCEDENCIA",
                "texto": "El juzgador debe ponderar la apariencia del buen derecho.",
                "epoca": "Undécima Época",
                "materias": [{"clave": "C", "descripcion": "Común"}]
            }));
    });

    let embedding_mock = openai.mock(|when, then| {
        when.method(POST)
            .path("/v1/embeddings")
            .header("Authorization", "Bearer test-key")
            .body_contains("text-embedding-3-small")
            .body_contains("SUSPENSI");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "data": [{"embedding": [0.25, -0.5, 1.0]}]
            }));
    });

    let store = Arc::new(MemoryStore::new());
    let processor = RecordProcessor::new(
        Stores::shared(store.clone()),
        source_for(&scjn),
        embedder_for(&openai, 1),
    );

    let entry = claimed(&store, "2031000").await;
    let outcome = processor.process_entry(&entry).await;

    assert_eq!(outcome, ProcessOutcome::Completed);
    thesis_mock.assert();
    embedding_mock.assert();

    let doc = store.document("2031000").await.unwrap();
    assert_eq!(doc.rubro, "SUSPENSIÓN DEFINITIVA. PROCEDENCIA");
    assert_eq!(doc.epoca, "Undécima Época");
    assert_eq!(doc.materia, "Común");
    assert_eq!(doc.vector_busqueda, vec![0.25, -0.5, 1.0]);
    assert_eq!(doc.fuente.as_deref(), Some("Repositorio Bicentenario"));
    assert!(doc.procesado);

    let entry = store.entry("2031000").await.unwrap();
    assert_eq!(entry.estado, QueueState::Completed);
    assert!(entry.completado_en.is_some());
}

#[tokio::test]
async fn test_missing_thesis_is_permanent_failure() {
    let scjn = MockServer::start();
    let openai = MockServer::start();

    scjn.mock(|when, then| {
        when.method(GET).path("/tesis/999");
        then.status(404);
    });
    let embedding_mock = openai.mock(|when, then| {
        when.method(POST).path("/v1/embeddings");
        then.status(200);
    });

    let store = Arc::new(MemoryStore::new());
    let processor = RecordProcessor::new(
        Stores::shared(store.clone()),
        source_for(&scjn),
        embedder_for(&openai, 1),
    );

    let entry = claimed(&store, "999").await;
    let outcome = processor.process_entry(&entry).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Failed {
            reason: "HTTP 404".to_string(),
            transient: false,
        }
    );
    embedding_mock.assert_hits(0);

    let entry = store.entry("999").await.unwrap();
    assert_eq!(entry.estado, QueueState::Failed);
    assert_eq!(entry.mensaje_error.as_deref(), Some("HTTP 404"));
    assert!(entry.error_en.is_some());
    assert_eq!(store.archive_len().await, 0);
}

#[tokio::test]
async fn test_server_errors_count_as_transient() {
    let scjn = MockServer::start();
    let openai = MockServer::start();

    scjn.mock(|when, then| {
        when.method(GET).path("/tesis/1000");
        then.status(503);
    });

    let store = Arc::new(MemoryStore::new());
    let processor = RecordProcessor::new(
        Stores::shared(store.clone()),
        source_for(&scjn),
        embedder_for(&openai, 1),
    );

    let entry = claimed(&store, "1000").await;
    let outcome = processor.process_entry(&entry).await;

    assert!(outcome.is_transient_failure());
    assert_eq!(
        store.entry("1000").await.unwrap().mensaje_error.as_deref(),
        Some("HTTP 503")
    );
}

#[tokio::test]
async fn test_unreachable_source_is_transient_failure() {
    // bind then drop to get a port nothing listens on
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let openai = MockServer::start();
    let source = Arc::new(
        ScjnClient::new(&SourceConfig {
            endpoint: format!("http://127.0.0.1:{}/tesis", port),
            timeout_seconds: 2,
        })
        .unwrap(),
    );

    let store = Arc::new(MemoryStore::new());
    let processor =
        RecordProcessor::new(Stores::shared(store.clone()), source, embedder_for(&openai, 1));

    let entry = claimed(&store, "31").await;
    let outcome = processor.process_entry(&entry).await;

    assert!(outcome.is_transient_failure());
    let entry = store.entry("31").await.unwrap();
    assert_eq!(entry.estado, QueueState::Failed);
    assert!(entry
        .mensaje_error
        .unwrap()
        .starts_with("API request failed"));
}

#[tokio::test]
async fn test_blank_rubro_is_rejected_before_embedding() {
    let scjn = MockServer::start();
    let openai = MockServer::start();

    scjn.mock(|when, then| {
        when.method(GET).path("/tesis/42");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({ "rubro": "", "texto": "cuerpo" }));
    });
    let embedding_mock = openai.mock(|when, then| {
        when.method(POST).path("/v1/embeddings");
        then.status(200);
    });

    let store = Arc::new(MemoryStore::new());
    let processor = RecordProcessor::new(
        Stores::shared(store.clone()),
        source_for(&scjn),
        embedder_for(&openai, 1),
    );

    let entry = claimed(&store, "42").await;
    let outcome = processor.process_entry(&entry).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Failed {
            reason: "missing rubro or texto".to_string(),
            transient: false,
        }
    );
    embedding_mock.assert_hits(0);
}

#[tokio::test]
async fn test_embedding_retries_then_marks_failed() {
    let scjn = MockServer::start();
    let openai = MockServer::start();

    scjn.mock(|when, then| {
        when.method(GET).path("/tesis/7");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({ "rubro": "RUBRO", "texto": "TEXTO" }));
    });
    let embedding_mock = openai.mock(|when, then| {
        when.method(POST).path("/v1/embeddings");
        then.status(500);
    });

    let store = Arc::new(MemoryStore::new());
    let processor = RecordProcessor::new(
        Stores::shared(store.clone()),
        source_for(&scjn),
        embedder_for(&openai, 3),
    );

    let entry = claimed(&store, "7").await;
    let outcome = processor.process_entry(&entry).await;

    embedding_mock.assert_hits(3);
    assert!(outcome.is_transient_failure());

    let entry = store.entry("7").await.unwrap();
    assert_eq!(entry.estado, QueueState::Failed);
    assert!(entry
        .mensaje_error
        .unwrap()
        .starts_with("embedding failed:"));
    assert!(store.document("7").await.is_none());
}

#[tokio::test]
async fn test_already_archived_register_is_skipped() {
    let scjn = MockServer::start();
    let openai = MockServer::start();

    let store = Arc::new(MemoryStore::new());
    let stores = Stores::shared(store.clone());
    stores
        .archive
        .upsert(&acervo_etl::domain::model::ThesisDocument {
            registro: "5".to_string(),
            rubro: "R".to_string(),
            texto: "T".to_string(),
            epoca: "N/D".to_string(),
            materia: "N/D".to_string(),
            vector_busqueda: vec![0.1],
            fuente: None,
            procesado: true,
            actualizado_en: None,
        })
        .await
        .unwrap();

    let thesis_mock = scjn.mock(|when, then| {
        when.method(GET).path("/tesis/5");
        then.status(200);
    });

    let processor = RecordProcessor::new(stores, source_for(&scjn), embedder_for(&openai, 1));
    let entry = claimed(&store, "5").await;

    assert_eq!(processor.process_entry(&entry).await, ProcessOutcome::Skipped);
    thesis_mock.assert_hits(0);
    assert_eq!(
        store.entry("5").await.unwrap().estado,
        QueueState::Completed
    );
}
