#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use student_records_api::auth::JwtKeys;
use student_records_api::database::MemoryStudentRepository;
use student_records_api::services::StudentService;
use student_records_api::storage::AttachmentStore;
use student_records_api::{app, RouterOptions};

pub const MAX_FILE_SIZE: usize = 3 * 1024 * 1024;
const SECRET: &str = "integration-test-secret";

/// An API instance on its own port, uploads dir and in-memory store
pub struct TestServer {
    pub base_url: String,
    pub token: String,
    pub client: Client,
    uploads: TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let uploads = TempDir::new().context("failed to create uploads dir")?;
        let attachments = AttachmentStore::open(uploads.path(), MAX_FILE_SIZE).await?;
        let service = StudentService::new(Arc::new(MemoryStudentRepository::new()), attachments);

        let keys = JwtKeys::new(SECRET, 1);
        let token = keys.generate("integration-tests")?;
        let router = app(Arc::new(service), keys, &RouterOptions::default());

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            token,
            client: Client::new(),
            uploads,
            handle,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.client.get(self.url("/health")).send().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request with the bearer token already attached
    pub fn authed(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path)).bearer_auth(&self.token)
    }

    pub fn uploads_dir(&self) -> &std::path::Path {
        self.uploads.path()
    }

    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.uploads.path().join(filename)
    }

    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// POST a student and return the created record
    pub async fn create_student(&self, form: Form) -> Result<serde_json::Value> {
        let res = self
            .authed(reqwest::Method::POST, "/api/students")
            .multipart(form)
            .send()
            .await?;
        anyhow::ensure!(res.status() == reqwest::StatusCode::CREATED, "create failed: {}", res.status());
        Ok(res.json().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn student_form(first: &str, last: &str) -> Form {
    Form::new()
        .text("first_name", first.to_string())
        .text("last_name", last.to_string())
        .text("email", format!("{}.{}@example.com", first, last).to_lowercase())
        .text("phone", "555-0100")
        .text("gender", "female")
}

pub fn image_part(filename: &str, mime: &str, size: usize) -> Part {
    Part::bytes(vec![0x89u8; size])
        .file_name(filename.to_string())
        .mime_str(mime)
        .expect("valid mime")
}
