//! Wiremock-backed stand-in for the directory service.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock directory service with helpers for the endpoints under test.
pub struct MockDirectoryServer {
    pub server: MockServer,
}

impl MockDirectoryServer {
    /// Start a fresh mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the mock server.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Accept any session login with 204.
    pub async fn mock_login(&self) {
        Mock::given(method("POST"))
            .and(path("/api/v1/session/login"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// Accept logins and assert they happen exactly `times` times.
    pub async fn mock_login_expected(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/session/login"))
            .respond_with(ResponseTemplate::new(204))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer the sync endpoint with a 200 change summary.
    pub async fn mock_sync(&self, summary: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/v1/principals/sync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(summary))
            .mount(&self.server)
            .await;
    }

    /// Like [`MockDirectoryServer::mock_sync`] with an expected call count.
    pub async fn mock_sync_expected(&self, summary: serde_json::Value, times: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/principals/sync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(summary))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Reject the sync endpoint with the given status and body.
    pub async fn mock_sync_rejection(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/v1/principals/sync"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Answer the "list all principals" endpoint.
    pub async fn mock_principals(&self, principals: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1/principals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(principals))
            .mount(&self.server)
            .await;
    }

    /// Answer the user metadata listing.
    pub async fn mock_user_headers(&self, headers: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1/metadata/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(headers))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the server has seen so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|reqs| reqs.len())
            .unwrap_or(0)
    }
}
