use crate::config::GeneratorConfig;
use crate::models::GeneratedPost;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Content generator rate limited the request")]
    RateLimited,
    #[error("Content generator credits exhausted")]
    QuotaExhausted,
    #[error("Content generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    /// Message safe to show to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::RateLimited => "Rate limit exceeded, try again shortly",
            GenerationError::QuotaExhausted => "Generation credits exhausted",
            GenerationError::Failed(_) => "Could not generate a new post",
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited,
            StatusCode::PAYMENT_REQUIRED => GenerationError::QuotaExhausted,
            other => GenerationError::Failed(format!("generator returned {other}: {body}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// External service that writes a new post from a random article.
#[async_trait]
pub trait ContentGenerator: Send + Sync + 'static {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedPost, GenerationError>;
}

/// The generator replies either with the post itself or wrapped as `{"post": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum GeneratorReply {
    Wrapped { post: GeneratedPost },
    Bare(GeneratedPost),
}

impl From<GeneratorReply> for GeneratedPost {
    fn from(reply: GeneratorReply) -> Self {
        match reply {
            GeneratorReply::Wrapped { post } | GeneratorReply::Bare(post) => post,
        }
    }
}

pub struct HttpContentGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpContentGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, category = ?request.category))]
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedPost, GenerationError> {
        let mut call = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|err| {
            warn!(error = %err, "Content generator unreachable");
            GenerationError::Failed(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Content generator returned an error");
            return Err(GenerationError::from_status(status, body));
        }

        let reply: GeneratorReply = response
            .json()
            .await
            .map_err(|err| GenerationError::Failed(format!("unreadable generator reply: {err}")))?;
        let post = GeneratedPost::from(reply);
        debug!(title = %post.title, "Generated post");
        Ok(post)
    }
}
