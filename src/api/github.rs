//! Implements the `RemoteStore` trait against the GitHub repository contents API.

use crate::api::{RemoteFile, RemoteStore, GITHUB_API_URL};
use crate::{Error, Result};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::trace;

const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

/// Talks to `https://api.github.com/repos/{owner}/{repo}/contents/{path}`.
///
/// File bodies are base64 on the wire; this client decodes and encodes them so
/// callers only ever see plain text. Status mapping: 404 on read means the file
/// does not exist, 401 means the token is invalid, and 409/422 on a write means
/// the supplied SHA is stale.
pub struct GithubStore {
    client: reqwest::Client,
    owner: String,
    repo: String,
    branch: String,
    token: String,
}

impl GithubStore {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            token: token.into(),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{GITHUB_API_URL}/repos/{}/{}/contents/{path}",
            self.owner, self.repo
        )
    }

    async fn get_contents(&self, path: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait::async_trait]
impl RemoteStore for GithubStore {
    async fn read(&self, path: &str) -> Result<RemoteFile> {
        trace!("read {path}");
        let response = self.get_contents(path).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(RemoteFile::default()),
            StatusCode::UNAUTHORIZED => Err(unauthorized()),
            status if status.is_success() => {
                let body: ContentsResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Remote(format!("malformed contents response: {e}")))?;
                let content = decode_content(&body.content)
                    .with_context(|| format!("Failed to decode the content of {path}"))?;
                Ok(RemoteFile {
                    content,
                    sha: Some(body.sha),
                    exists: true,
                })
            }
            status => Err(remote_error("read", path, status, response).await),
        }
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        sha: Option<&str>,
        message: &str,
    ) -> Result<String> {
        trace!("write {path}");
        let mut body = serde_json::json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": self.branch,
        });
        // The SHA is attached only when overwriting an existing file.
        if let Some(sha) = sha {
            body["sha"] = serde_json::Value::String(sha.to_string());
        }

        let response = self
            .client
            .put(self.contents_url(path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(unauthorized()),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(Error::Conflict {
                path: path.to_string(),
            }),
            status if status.is_success() => {
                let body: WriteResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Remote(format!("malformed write response: {e}")))?;
                Ok(body.content.sha)
            }
            status => Err(remote_error("write", path, status, response).await),
        }
    }

    async fn delete(&self, path: &str, sha: &str, message: &str) -> Result<()> {
        trace!("delete {path}");
        let body = serde_json::json!({
            "message": message,
            "sha": sha,
            "branch": self.branch,
        });
        let response = self
            .client
            .delete(self.contents_url(path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(unauthorized()),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(Error::Conflict {
                path: path.to_string(),
            }),
            status if status.is_success() => Ok(()),
            status => Err(remote_error("delete", path, status, response).await),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let response = self.get_contents(path).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Err(unauthorized()),
            status => Ok(status.is_success()),
        }
    }
}

/// Probes `GET /user` with the given token. Returns the authenticated login on
/// success and `None` when the token is invalid or expired.
pub async fn validate_token(token: &str) -> Result<Option<String>> {
    let response = reqwest::Client::new()
        .get(format!("{GITHUB_API_URL}/user"))
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
        .send()
        .await?;
    match response.status() {
        StatusCode::UNAUTHORIZED => Ok(None),
        status if status.is_success() => {
            let user: UserResponse = response
                .json()
                .await
                .map_err(|e| Error::Remote(format!("malformed user response: {e}")))?;
            Ok(Some(user.login))
        }
        status => Err(Error::Remote(format!(
            "token validation returned status {status}"
        ))),
    }
}

/// The contents API returns base64 with embedded newlines; strip all
/// whitespace before decoding.
fn decode_content(encoded: &str) -> anyhow::Result<String> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(cleaned.as_bytes())
        .context("Invalid base64 content")?;
    String::from_utf8(bytes).context("File content is not valid UTF-8")
}

fn unauthorized() -> Error {
    Error::Auth("GitHub rejected the token (401 Unauthorized)".to_string())
}

async fn remote_error(
    verb: &str,
    path: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> Error {
    // GitHub error bodies carry a human-readable message field.
    let detail = response
        .json::<ApiErrorResponse>()
        .await
        .map(|b| b.message)
        .unwrap_or_default();
    Error::Remote(format!("{verb} of '{path}' failed with {status}: {detail}"))
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WriteContent,
}

#[derive(Debug, Deserialize)]
struct WriteContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize, Default)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_url() {
        let store = GithubStore::new("someone", "ledger-data", "main", "ghp_x");
        assert_eq!(
            store.contents_url("data/2024/04/income.json"),
            "https://api.github.com/repos/someone/ledger-data/contents/data/2024/04/income.json"
        );
    }

    #[test]
    fn test_decode_content_strips_newlines() {
        // "hello" encoded, split across lines the way the API returns it.
        let decoded = decode_content("aGVs\nbG8=\n").unwrap();
        assert_eq!(decoded, "hello");
    }
}
