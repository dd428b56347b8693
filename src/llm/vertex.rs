//! Vertex AI bearer tokens.

use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::RwLock;

use super::LlmError;

/// gcloud access tokens live for an hour; refresh well before that.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// Source of the bearer token sent to Vertex AI.
#[derive(Debug)]
pub struct VertexToken {
    fixed: Option<String>,
    cached: RwLock<Option<(String, Instant)>>,
}

impl VertexToken {
    /// Use `token` for every request, or ask `gcloud` when `None`.
    pub fn new(token: Option<String>) -> Self {
        Self {
            fixed: token,
            cached: RwLock::new(None),
        }
    }

    /// Current access token.
    pub async fn get(&self) -> Result<String, LlmError> {
        if let Some(token) = &self.fixed {
            return Ok(token.clone());
        }

        if let Some((token, fetched_at)) = self.cached.read().await.as_ref() {
            if fetched_at.elapsed() < TOKEN_TTL {
                return Ok(token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        if let Some((token, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < TOKEN_TTL {
                return Ok(token.clone());
            }
        }
        let token = fetch_gcloud_token().await?;
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

async fn fetch_gcloud_token() -> Result<String, LlmError> {
    tracing::debug!("Fetching Vertex AI access token from gcloud");
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LlmError::Auth(
                    "gcloud not found; set GOOGLE_CLOUD_ACCESS_TOKEN or install the Google Cloud SDK"
                        .to_string(),
                )
            } else {
                LlmError::Auth(format!("failed to run gcloud: {}", e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LlmError::Auth(format!(
            "gcloud auth print-access-token failed: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(LlmError::Auth("gcloud returned an empty access token".to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_token_is_returned_without_gcloud() {
        let token = VertexToken::new(Some("ya29.token".to_string()));
        assert_eq!(token.get().await.expect("token"), "ya29.token");
    }
}
