//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint, plus an [`EventStream`]
//! reader for `GET /events`.

use super::constants::*;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;
use tokio::time::Instant;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    pub async fn upload(&self, filename: &str, content: &[u8]) -> Response {
        let part = Part::bytes(content.to_vec()).file_name(filename.to_string());
        self.upload_form(Form::new().part("file", part)).await
    }

    pub async fn upload_form(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// Uploads and returns the new file id, panicking on any failure
    pub async fn upload_ok(&self, filename: &str, content: &[u8]) -> i64 {
        let response = self.upload(filename, content).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.expect("Invalid upload response");
        body["id"].as_i64().expect("Upload response without id")
    }

    pub async fn options_upload(&self) -> Response {
        self.client
            .request(reqwest::Method::OPTIONS, format!("{}/upload", self.base_url))
            .send()
            .await
            .expect("OPTIONS request failed")
    }

    pub async fn list_files(&self) -> Response {
        self.client
            .get(format!("{}/files", self.base_url))
            .send()
            .await
            .expect("List request failed")
    }

    pub async fn download(&self, id: i64) -> Response {
        self.client
            .get(format!("{}/files/{}", self.base_url, id))
            .send()
            .await
            .expect("Download request failed")
    }

    /// Opens `GET /events` and returns a reader over its frames
    pub async fn open_events(&self) -> EventStream {
        // No overall timeout: the response body never ends on its own
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");
        let response = client
            .get(format!("{}/events", self.base_url))
            .header("Origin", "http://example.com")
            .send()
            .await
            .expect("Events request failed");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        EventStream::new(response)
    }
}

/// Incremental reader over a text-event-stream response.
pub struct EventStream {
    pub headers: HeaderMap,
    response: Response,
    buffer: String,
}

#[allow(dead_code)]
impl EventStream {
    fn new(response: Response) -> Self {
        Self {
            headers: response.headers().clone(),
            response,
            buffer: String::new(),
        }
    }

    /// Reads the next raw frame, including its trailing blank line.
    ///
    /// Returns `None` if the stream ends or nothing arrives within `wait`.
    pub async fn next_frame_within(&mut self, wait: Duration) -> Option<String> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                return Some(frame);
            }
            let chunk = tokio::time::timeout_at(deadline, self.response.chunk()).await;
            match chunk {
                Ok(Ok(Some(bytes))) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                Ok(Ok(None)) | Ok(Err(_)) | Err(_) => return None,
            }
        }
    }

    /// Reads the next frame, panicking if none arrives in time
    pub async fn next_frame(&mut self) -> String {
        self.next_frame_within(Duration::from_millis(FRAME_TIMEOUT_MS))
            .await
            .expect("Timed out waiting for an event frame")
    }

    /// Reads the next frame and parses its `data:` payload as JSON
    pub async fn next_json(&mut self) -> serde_json::Value {
        let frame = self.next_frame().await;
        let payload = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap_or_else(|| panic!("Malformed frame: {:?}", frame));
        serde_json::from_str(payload).expect("Frame payload is not JSON")
    }

    /// Asserts that no frame arrives during the quiet period
    pub async fn expect_silence(&mut self) {
        let frame = self
            .next_frame_within(Duration::from_millis(QUIET_PERIOD_MS))
            .await;
        assert!(frame.is_none(), "Expected no frame, got {:?}", frame);
    }

    /// Waits for the server to close the stream
    pub async fn expect_end(&mut self) {
        let deadline = Instant::now() + Duration::from_millis(FRAME_TIMEOUT_MS);
        loop {
            match tokio::time::timeout_at(deadline, self.response.chunk()).await {
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) | Ok(Err(_)) => return,
                Err(_) => panic!("Event stream did not end"),
            }
        }
    }
}
