use super::{HttpTransport, ResponseCache};
use crate::errors::CerveauError;
use crate::logging::append_run_log;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

pub struct GitHubClient<'a> {
    transport: &'a dyn HttpTransport,
    cache: ResponseCache<'a>,
    token: String,
    api_base: String,
    default_owner: Option<String>,
}

impl<'a> GitHubClient<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        cache: ResponseCache<'a>,
        token: impl Into<String>,
        api_base: impl Into<String>,
        default_owner: Option<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            default_owner,
        }
    }

    pub fn list_repos(
        &self,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RepoSummary>, CerveauError> {
        let owner = owner
            .map(str::to_string)
            .or_else(|| self.default_owner.clone())
            .ok_or_else(|| {
                CerveauError::InvalidConfig(
                    "no owner given and github.default_owner is unset".to_string(),
                )
            })?;
        let query = vec![(
            "per_page".to_string(),
            limit.min(MAX_PAGE_SIZE).to_string(),
        )];
        let data = self.get(
            &format!("/users/{owner}/repos"),
            &query,
            &format!("repos_{owner}_{limit}"),
        )?;
        let mut repos: Vec<RepoSummary> = serde_json::from_value(data)
            .map_err(|e| CerveauError::Http(format!("unexpected repo list shape: {e}")))?;
        repos.truncate(limit);
        Ok(repos)
    }

    pub fn get_repo(&self, full_name: &str) -> Result<Value, CerveauError> {
        self.get(
            &format!("/repos/{full_name}"),
            &[],
            &format!("repo_{}", full_name.replace('/', "_")),
        )
    }

    fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        cache_key: &str,
    ) -> Result<Value, CerveauError> {
        if let Some(cached) = self.cache.get(cache_key) {
            return Ok(cached);
        }
        let url = format!("{}{path}", self.api_base);
        append_run_log("info", "gh.request.started", json!({ "url": url }));
        let data = match self.transport.get_json(&url, &self.token, query) {
            Ok(data) => data,
            Err(err) => {
                append_run_log(
                    "error",
                    "gh.request.failed",
                    json!({ "url": url, "error": err.to_string() }),
                );
                return Err(err);
            }
        };
        append_run_log("info", "gh.request.succeeded", json!({ "url": url }));
        if let Err(err) = self.cache.put(cache_key, &data) {
            append_run_log(
                "warn",
                "cache.store_failed",
                json!({ "key": cache_key, "error": err.to_string() }),
            );
        }
        Ok(data)
    }
}
