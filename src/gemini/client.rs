use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{
    ApiError, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ModelInfo,
};
use crate::config::ApiKey;

const MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const ATTEMPTS: u32 = 3;
const FIRST_RETRY_DELAY: Duration = Duration::from_secs(1);

const GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_p: 0.8,
    top_k: 40,
    response_mime_type: "application/json",
};

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Gemini rate limit hit, try again shortly")]
    RateLimited,

    #[error("Gemini quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Gemini API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Gemini request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gemini returned no text: {0}")]
    EmptyResponse(String),
}

impl GeminiError {
    /// Maps a non-success HTTP reply, preferring the structured `error` object.
    fn from_reply(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return GeminiError::RateLimited;
        }
        if let Ok(reply) = serde_json::from_str::<GenerateContentResponse>(body)
            && let Some(err) = reply.error
        {
            return Self::from_api(err);
        }
        let snippet = &body[..body.floor_char_boundary(200)];
        GeminiError::Api {
            code: status.as_u16(),
            message: format!("HTTP {status}: {snippet}"),
        }
    }

    fn from_api(err: ApiError) -> Self {
        let message = err.message.unwrap_or_else(|| "no message".to_string());
        match err.code {
            Some(429) => GeminiError::RateLimited,
            Some(403) => GeminiError::QuotaExhausted(message),
            Some(code) => GeminiError::Api { code, message },
            None => GeminiError::Api {
                code: 0,
                message: format!("error without status code: {message}"),
            },
        }
    }

    /// Rate limits and server-side failures are worth another attempt.
    fn is_transient(&self) -> bool {
        matches!(
            self,
            GeminiError::RateLimited | GeminiError::Api { code: 500..=599, .. }
        )
    }
}

/// Text generation backend used to structure research findings.
pub trait Summarizer {
    fn model(&self) -> &str;

    /// Returns the raw model text for `prompt` under `system` instructions.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GeminiError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: ApiKey, model: &str, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            model: model.to_string(),
            base_url: MODELS_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key").unwrap(),
            model: crate::config::DEFAULT_GEMINI_MODEL.to_string(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn url(&self, method: &str) -> String {
        let url = format!("{}/{}{method}", self.base_url, self.model);
        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "Gemini key must not leave over plain HTTP"
        );
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GeminiError> {
        let response = request
            .header("x-goog-api-key", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = GeminiError::from_reply(status, &body);
            warn!(model = %self.model, %status, error = %err, "Gemini request rejected");
            return Err(err);
        }
        Ok(response.json().await?)
    }

    /// Confirms the key is accepted and the configured model exists.
    pub async fn model_info(&self) -> Result<ModelInfo, GeminiError> {
        self.send(self.http.get(self.url(""))).await
    }

    async fn generate_once(&self, request: &GenerateContentRequest) -> Result<String, GeminiError> {
        let mut reply: GenerateContentResponse = self
            .send(self.http.post(self.url(":generateContent")).json(request))
            .await?;

        // Some failures arrive as 200 with an `error` object.
        if let Some(err) = reply.error.take() {
            let err = GeminiError::from_api(err);
            warn!(model = %self.model, error = %err, "Gemini error inside successful reply");
            return Err(err);
        }
        reply
            .text()
            .ok_or_else(|| GeminiError::EmptyResponse(reply.empty_reason()))
    }
}

impl Summarizer for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: Some(Content::system(system)),
            generation_config: GENERATION,
        };

        let mut attempt = 0;
        loop {
            match self.generate_once(&request).await {
                Ok(text) => {
                    debug!(model = %self.model, chars = text.len(), "generation complete");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt + 1 < ATTEMPTS => {
                    let delay = retry_delay(attempt);
                    debug!(attempt = attempt + 1, ?delay, error = %e, "transient Gemini error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential delay with equal jitter: half fixed, half random.
fn retry_delay(attempt: u32) -> Duration {
    let full = FIRST_RETRY_DELAY.as_millis() as u64 * 2u64.pow(attempt);
    let fixed = full / 2;
    Duration::from_millis(fixed + fastrand::u64(..fixed.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: Option<u16>, message: &str) -> ApiError {
        ApiError {
            code,
            message: Some(message.into()),
        }
    }

    #[test]
    fn api_403_means_quota() {
        let err = GeminiError::from_api(api_error(Some(403), "Quota exceeded"));
        assert!(matches!(err, GeminiError::QuotaExhausted(_)));
    }

    #[test]
    fn api_error_without_code_keeps_message() {
        match GeminiError::from_api(api_error(None, "strange")) {
            GeminiError::Api { code: 0, message } => assert!(message.contains("strange")),
            other => panic!("expected Api(0), got: {other:?}"),
        }
    }

    #[test]
    fn reply_429_is_rate_limited_regardless_of_body() {
        let err = GeminiError::from_reply(StatusCode::TOO_MANY_REQUESTS, "<html>");
        assert!(matches!(err, GeminiError::RateLimited));
    }

    #[test]
    fn transient_errors() {
        assert!(GeminiError::RateLimited.is_transient());
        assert!(
            GeminiError::Api {
                code: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !GeminiError::Api {
                code: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!GeminiError::QuotaExhausted(String::new()).is_transient());
        assert!(!GeminiError::EmptyResponse(String::new()).is_transient());
    }

    #[test]
    fn retry_delay_grows_within_jitter_window() {
        for attempt in 0..ATTEMPTS {
            let full = 1000 * 2u128.pow(attempt);
            let delay = retry_delay(attempt).as_millis();
            assert!(delay >= full / 2 && delay < full, "attempt {attempt}: {delay}ms");
        }
    }
}
