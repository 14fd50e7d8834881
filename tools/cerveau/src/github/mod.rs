//! Remote repository metadata: a thin GitHub REST client behind a TTL cache.

pub mod cache;
pub mod client;
pub mod views;

pub use cache::ResponseCache;
pub use client::{GitHubClient, RepoSummary};
pub use views::render_repo_table;

use crate::errors::CerveauError;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER_AGENT: &str = "cerveau";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub trait HttpTransport: Send + Sync {
    fn get_json(
        &self,
        url: &str,
        bearer_token: &str,
        query: &[(String, String)],
    ) -> Result<Value, CerveauError>;
}

pub struct ReqwestTransport;

impl HttpTransport for ReqwestTransport {
    fn get_json(
        &self,
        url: &str,
        bearer_token: &str,
        query: &[(String, String)],
    ) -> Result<Value, CerveauError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CerveauError::Http(format!("build client: {e}")))?;
        let response = client
            .get(url)
            .bearer_auth(bearer_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(query)
            .send()
            .map_err(|e| CerveauError::Http(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CerveauError::Http(format!("GET {url}: status {status}")));
        }
        response
            .json::<Value>()
            .map_err(|e| CerveauError::Http(format!("GET {url}: invalid json: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub token: String,
    pub query: Vec<(String, String)>,
}

/// Queued responses in FIFO order; every request is recorded.
#[derive(Default, Clone)]
pub struct FakeTransport {
    responses: Arc<Mutex<VecDeque<Result<Value, CerveauError>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeTransport {
    pub fn push_response(&self, response: Result<Value, CerveauError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl HttpTransport for FakeTransport {
    fn get_json(
        &self,
        url: &str,
        bearer_token: &str,
        query: &[(String, String)],
    ) -> Result<Value, CerveauError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedRequest {
                url: url.to_string(),
                token: bearer_token.to_string(),
                query: query.to_vec(),
            });
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(CerveauError::Http("no fake response queued".to_string())))
    }
}
