//! REST client for the file explorer, project list and agent config.
//!
//! Every call is a single request; failures come back as `ApiError` for the
//! caller to show. Nothing here touches the conversation state.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use agentlink_protocol::rest::{AgentConfig, FileNode, ProjectList};

use crate::endpoint;
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_CHARS: usize = 300;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    origin: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base =
            endpoint::parse_base(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            origin: endpoint::api_origin(&base),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Workspace tree; with `path`, the listing below that directory.
    pub async fn file_tree(&self, path: Option<&str>) -> Result<Vec<FileNode>, ApiError> {
        let mut url = self.url("/api/files/tree")?;
        if let Some(path) = path {
            url.query_pairs_mut().append_pair("path", path);
        }
        self.json(self.http.get(url), "file tree").await
    }

    /// Raw file content (text files come back as UTF-8, others as-is).
    pub async fn file_content(&self, path: &str) -> Result<Bytes, ApiError> {
        let url = self.url(&files_path(path))?;
        self.bytes(self.http.get(url), "file content").await
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(&files_path(path))?;
        self.bytes(self.http.request(Method::DELETE, url), "delete file")
            .await?;
        Ok(())
    }

    pub async fn download_file(&self, path: &str) -> Result<Bytes, ApiError> {
        let url = self.url(&format!("/api/download/file/{}", encode_path(path)))?;
        self.bytes(self.http.get(url), "download file").await
    }

    /// Folder contents as a zip archive.
    pub async fn download_folder(&self, path: &str) -> Result<Bytes, ApiError> {
        let url = self.url(&format!("/api/download/folder/{}", encode_path(path)))?;
        self.bytes(self.http.get(url), "download folder").await
    }

    pub async fn projects(&self) -> Result<ProjectList, ApiError> {
        let url = self.url("/api/projects")?;
        self.json(self.http.get(url), "projects").await
    }

    pub async fn agent_config(&self) -> Result<AgentConfig, ApiError> {
        let url = self.url("/api/config")?;
        self.json(self.http.get(url), "agent config").await
    }

    /// Agent config, or the built-in defaults when the server has none.
    pub async fn agent_config_or_default(&self) -> AgentConfig {
        match self.agent_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    component = "api",
                    event = "api.config.fallback",
                    error = %e,
                    "Agent config unavailable, using defaults"
                );
                AgentConfig::default()
            }
        }
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&format!("{}{}", self.origin, path))
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        label: &str,
    ) -> Result<T, ApiError> {
        let body = self.bytes(request, label).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn bytes(&self, request: RequestBuilder, label: &str) -> Result<Bytes, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(
            component = "api",
            event = "api.response",
            request = label,
            status = status.as_u16(),
            "REST response"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_CHARS),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// `/api/files` + path, always with exactly one separating slash.
fn files_path(path: &str) -> String {
    format!("/api/files/{}", encode_path(path.trim_start_matches('/')))
}

/// Percent-encode each segment, keeping the `/` separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:8000/app").expect("valid base url")
    }

    #[test]
    fn origin_drops_the_page_path() {
        assert_eq!(client().origin(), "http://localhost:8000");
        assert!(ApiClient::new("nope").is_err());
    }

    #[test]
    fn segments_are_encoded_and_separators_kept() {
        assert_eq!(encode_path("out/my file#1.txt"), "out/my%20file%231.txt");
        assert_eq!(encode_path("/abs/dir"), "/abs/dir");
    }

    #[test]
    fn file_paths_get_a_single_slash() {
        assert_eq!(files_path("/work/out/a.csv"), "/api/files/work/out/a.csv");
        assert_eq!(files_path("out/a.csv"), "/api/files/out/a.csv");
    }

    #[test]
    fn tree_query_is_encoded() {
        let mut url = client().url("/api/files/tree").expect("url");
        url.query_pairs_mut().append_pair("path", "out dir/x&y");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/files/tree?path=out+dir%2Fx%26y"
        );
    }

    #[test]
    fn download_urls_keep_the_given_path() {
        let api = client();
        let url = api
            .url(&format!("/api/download/folder/{}", encode_path("out/run 1")))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/download/folder/out/run%201"
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "é".repeat(400);
        let short = truncate(&body, 10);
        assert_eq!(short.chars().count(), 11);
        assert_eq!(truncate("fine", 10), "fine");
    }
}
