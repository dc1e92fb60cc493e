use docboard::{
    AppConfig, AppState, DiskUploadStore, LockedRepository, RepositoryState, Views,
    auth::SESSION_COOKIE,
    backends::FileBackend,
    create_router,
    uploads::UploadState,
};
use reqwest::{StatusCode, redirect::Policy};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub data_dir: TempDir,
}

impl TestApp {
    fn data_file(&self) -> std::path::PathBuf {
        self.data_dir.path().join("data.json")
    }
}

async fn spawn_app() -> TestApp {
    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let config = AppConfig {
        port,
        public_base_url: address.clone(),
        ..AppConfig::default()
    };

    let repo = Arc::new(LockedRepository::new(FileBackend::new(data_dir.path().join("data.json"))))
        as RepositoryState;
    let uploads = Arc::new(DiskUploadStore::new(data_dir.path().join("uploads"), &address)) as UploadState;

    let state = AppState {
        repo,
        uploads,
        config,
        views: Arc::new(Views::new().expect("templates compile")),
    };
    let router = create_router(state);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, data_dir }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("client")
}

async fn login(app: &TestApp, client: &reqwest::Client) -> String {
    let response = client
        .post(format!("{}/login", app.address))
        .form(&[("password", AppConfig::default().admin_password)])
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE}=")))
        .map(str::to_string)
        .expect("session cookie")
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    // The first read seeded the file.
    assert!(app.data_file().exists());
}

#[tokio::test]
async fn test_document_lifecycle_persists_to_file() {
    let app = spawn_app().await;
    let client = client();
    let cookie = login(&app, &client).await;

    // Create
    let added: Value = client
        .post(format!("{}/api/admin/documents", app.address))
        .header("Cookie", &cookie)
        .json(&json!({ "title": "Ôn thi", "url": "https://x.io/on", "category": "Hóa", "type": "private" }))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    let key = added["key"].as_str().unwrap().to_string();

    let stored: Value = serde_json::from_str(&std::fs::read_to_string(app.data_file()).unwrap()).unwrap();
    let id = stored["private"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(stored["private"][0]["access_key"], key.as_str());
    assert_eq!(stored["private"][0]["category"], "Hóa");

    // Unlock
    let response = client
        .post(format!("{}/access_private/{}", app.address, id))
        .form(&[("key", key.as_str())])
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "https://x.io/on");

    // Delete
    let response = client
        .delete(format!("{}/api/admin/documents/{}", app.address, id))
        .header("Cookie", &cookie)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::OK);

    let stored: Value = serde_json::from_str(&std::fs::read_to_string(app.data_file()).unwrap()).unwrap();
    assert_eq!(stored["private"], json!([]));
}

#[tokio::test]
async fn test_uploaded_file_is_served_back() {
    let app = spawn_app().await;
    let client = client();
    let cookie = login(&app, &client).await;

    let boundary = "XdocboardBoundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nGhi chú\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\nChung\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"ghi chu.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello board\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let response = client
        .post(format!("{}/admin/upload", app.address))
        .header("Cookie", &cookie)
        .header("Content-Type", format!("multipart/form-data; boundary={boundary}"))
        .body(body)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let listing: Value = client
        .get(format!("{}/api/documents", app.address))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    let url = listing["public"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["title"] == "Ghi chú")
        .and_then(|d| d["url"].as_str())
        .unwrap()
        .to_string();
    assert!(url.starts_with(&format!("{}/uploads/", app.address)));

    let served = client.get(&url).send().await.expect("req fail");
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.text().await.unwrap(), "hello board");
}
