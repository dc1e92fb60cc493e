use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use docboard::{
    LockedRepository, Repository,
    backends::{FileBackend, PostgresBackend, RemoteBackend, StorageBackend},
    config::RemoteConfig,
    models::{NewDocument, Visibility},
    repository::sample_collection,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Mutex};

// --- File Backend ---

#[tokio::test]
async fn test_file_missing_or_blank_is_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let backend = FileBackend::new(&path);

    assert_eq!(backend.load().await.unwrap(), Value::Null);

    std::fs::write(&path, "  \n").unwrap();
    assert_eq!(backend.load().await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_file_round_trip_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("data.json");
    let backend = FileBackend::new(&path);

    backend.save(&sample_collection()).await.unwrap();

    assert!(path.exists());
    assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    let raw = backend.load().await.unwrap();
    assert_eq!(raw["public"].as_array().unwrap().len(), 3);
    assert_eq!(raw["public"][0]["created_at"], "01/01/2024 10:00");
}

#[tokio::test]
async fn test_file_with_invalid_json_is_not_seeded_over() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, "{ not json").unwrap();

    let repo = LockedRepository::new(FileBackend::new(&path));
    assert!(repo.read().await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn test_file_legacy_array_is_read_and_rewritten_canonically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(
        &path,
        r#"[{"id":"old","title":"Tài liệu cũ","url":"https://x.io","category":"Văn"}]"#,
    )
    .unwrap();

    let repo = LockedRepository::new(FileBackend::new(&path));
    assert_eq!(repo.read().await.unwrap().public.len(), 1);

    repo.add(NewDocument {
        title: "Mới".to_string(),
        url: "https://x.io/new".to_string(),
        category: "Văn".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    let stored: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored["public"].as_array().unwrap().len(), 2);
    assert_eq!(stored["private"], json!([]));
}

// --- Remote Backend (in-process document store) ---

#[derive(Clone, Default)]
struct FakeStore {
    bins: Arc<Mutex<Vec<(String, Value)>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("X-Master-Key").and_then(|v| v.to_str().ok()) == Some("test-master-key")
}

async fn create_bin(
    State(store): State<FakeStore>,
    headers: HeaderMap,
    Json(record): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid X-Master-Key" })));
    }
    let mut bins = store.bins.lock().await;
    let id = format!("bin{}", bins.len() + 1);
    bins.push((id.clone(), record));
    (StatusCode::OK, Json(json!({ "record": {}, "metadata": { "id": id } })))
}

async fn read_bin(
    State(store): State<FakeStore>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid X-Master-Key" })));
    }
    let bins = store.bins.lock().await;
    match bins.iter().find(|(bin, _)| *bin == id) {
        Some((_, record)) => (
            StatusCode::OK,
            Json(json!({ "record": record, "metadata": { "id": id } })),
        ),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Bin not found" }))),
    }
}

async fn update_bin(
    State(store): State<FakeStore>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(record): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid X-Master-Key" })));
    }
    let mut bins = store.bins.lock().await;
    match bins.iter_mut().find(|(bin, _)| *bin == id) {
        Some(entry) => {
            entry.1 = record;
            (StatusCode::OK, Json(json!({ "record": entry.1.clone(), "metadata": {} })))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Bin not found" }))),
    }
}

async fn spawn_fake_store() -> (String, FakeStore) {
    let store = FakeStore::default();
    let app = Router::new()
        .route("/b", post(create_bin))
        .route("/b/{id}", get(read_bin).put(update_bin))
        .with_state(store.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}/b"), store)
}

fn remote_config(base_url: &str, api_key: &str, bin_id_file: Option<std::path::PathBuf>) -> RemoteConfig {
    RemoteConfig {
        base_url: base_url.to_string(),
        api_key: api_key.to_string(),
        bin_id: None,
        bin_id_file,
        bin_name: "docboard_test".to_string(),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_remote_creates_bin_and_remembers_it() {
    let (base, store) = spawn_fake_store().await;
    let dir = tempfile::tempdir().unwrap();
    let id_file = dir.path().join("bin_id.txt");

    let backend = RemoteBackend::new(remote_config(&base, "test-master-key", Some(id_file.clone()))).unwrap();
    assert_eq!(backend.load().await.unwrap(), Value::Null);

    assert_eq!(backend.current_bin_id().await.as_deref(), Some("bin1"));
    assert_eq!(std::fs::read_to_string(&id_file).unwrap(), "bin1");
    assert_eq!(store.bins.lock().await.len(), 1);

    // A restarted process picks the remembered bin up again.
    let restarted = RemoteBackend::new(remote_config(&base, "test-master-key", Some(id_file))).unwrap();
    assert_eq!(restarted.current_bin_id().await.as_deref(), Some("bin1"));
}

#[tokio::test]
async fn test_remote_repository_seeds_and_persists() {
    let (base, store) = spawn_fake_store().await;
    let backend = RemoteBackend::new(remote_config(&base, "test-master-key", None)).unwrap();
    let repo = LockedRepository::new(backend);

    let seeded = repo.read().await.unwrap();
    assert_eq!(seeded, sample_collection());

    let key = repo
        .add(NewDocument {
            title: "Đề cương".to_string(),
            url: "https://x.io/dc".to_string(),
            category: "Sử".to_string(),
            visibility: Visibility::Private,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(key.is_some());

    let bins = store.bins.lock().await;
    assert_eq!(bins.len(), 1, "saves must reuse the existing bin");
    assert_eq!(bins[0].1["private"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_remote_rejection_surfaces_service_message() {
    let (base, _store) = spawn_fake_store().await;
    let backend = RemoteBackend::new(remote_config(&base, "wrong-key", None)).unwrap();

    let err = backend.load().await.unwrap_err();
    assert!(err.to_string().contains("Invalid X-Master-Key"), "{err}");
}

#[tokio::test]
async fn test_remote_unknown_bin_is_an_error_not_a_new_bin() {
    let (base, store) = spawn_fake_store().await;
    let mut config = remote_config(&base, "test-master-key", None);
    config.bin_id = Some("missing".to_string());
    let backend = RemoteBackend::new(config).unwrap();

    assert!(backend.load().await.is_err());
    assert!(store.bins.lock().await.is_empty());
}

#[tokio::test]
async fn test_remote_unreachable_store_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = remote_config(&format!("http://127.0.0.1:{port}/b"), "k", None);
    config.bin_id = Some("bin1".to_string());
    config.timeout = Duration::from_millis(500);
    let backend = RemoteBackend::new(config).unwrap();

    assert!(backend.load().await.is_err());
}

// --- Postgres Backend ---

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres database"]
async fn test_postgres_round_trip() {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let backend = PostgresBackend::connect(&db_url).await.unwrap();
    let repo = LockedRepository::new(backend);

    repo.reset().await.unwrap();
    let key = repo
        .add(NewDocument {
            title: "SQL".to_string(),
            url: "https://x.io/sql".to_string(),
            category: "Tin".to_string(),
            visibility: Visibility::Private,
            ..Default::default()
        })
        .await
        .unwrap();

    let collection = repo.read().await.unwrap();
    assert_eq!(collection.public, sample_collection().public);
    assert_eq!(collection.private[0].access_key, key);
}
