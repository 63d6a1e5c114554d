use std::env;
use std::fmt;
use std::pin::Pin;
use std::time::Instant;

use futures::Stream;
use futures::future;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};

use crate::chat::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_MISSING_CREDENTIAL, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UPSTREAM_ERRORS,
    STREAM_TTFB,
};
use crate::sse::process_sse;
use crate::types::{ChatCompletionMessage, CompletionRequest};

const HTTP_REFERER: &str = "http-referer";

/// A lazy stream of text fragments, ending normally or with one error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Anything that can turn an outbound message list into a fragment stream.
///
/// [`StreamingCompletionClient`] is the production implementation; tests
/// substitute scripted sources.
pub trait CompletionSource: Send + Sync {
    /// Start one completion.  Nothing happens until the stream is polled.
    fn stream_completion(&self, messages: Vec<ChatCompletionMessage>) -> FragmentStream;
}

/// Where the bearer credential comes from.
///
/// The credential is resolved every time a request is issued; it is never
/// cached.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Read the named environment variable at send time.
    Environment(String),
    /// Use a fixed secret.
    Fixed(String),
}

impl Credential {
    /// Resolve the credential, failing with `MissingCredential` when absent.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Credential::Environment(variable) => match env::var(variable) {
                Ok(value) if !value.is_empty() => Ok(value),
                _ => Err(Error::missing_credential(variable.clone())),
            },
            Credential::Fixed(secret) => Ok(secret.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Environment(variable) => {
                f.debug_tuple("Environment").field(variable).finish()
            }
            Credential::Fixed(_) => f.debug_tuple("Fixed").field(&"<redacted>").finish(),
        }
    }
}

/// Client for an OpenAI-compatible streaming chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct StreamingCompletionClient {
    client: ReqwestClient,
    endpoint: String,
    model: String,
    max_tokens: u32,
    referer: String,
    credential: Credential,
}

impl StreamingCompletionClient {
    /// Create a new client from a chat configuration.
    ///
    /// An explicit `api_key` in the configuration wins; otherwise the
    /// `api_key_env` variable is read on every request.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let credential = match &config.api_key {
            Some(key) => Credential::Fixed(key.clone()),
            None => Credential::Environment(config.api_key_env.clone()),
        };

        // No request timeout: a stalled stream stalls the turn.
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            referer: config.referer.clone(),
            credential,
        })
    }

    /// Returns the endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the model identifier placed in every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the configured credential source.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Create and return headers for a streaming request.
    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::validation("credential is not a valid header value", None))?;
        headers.insert(header::AUTHORIZATION, bearer);
        let referer = HeaderValue::from_str(&self.referer).map_err(|_| {
            Error::validation(
                "referer is not a valid header value",
                Some("referer".to_string()),
            )
        })?;
        headers.insert(HeaderName::from_static(HTTP_REFERER), referer);
        Ok(headers)
    }

    /// Issue the request and return the successful response.
    async fn open(&self, messages: Vec<ChatCompletionMessage>) -> Result<Response> {
        let api_key = self.credential.resolve().inspect_err(|_| {
            CLIENT_MISSING_CREDENTIAL.click();
        })?;
        let headers = self.headers(&api_key)?;
        let request = CompletionRequest::new(self.model.clone(), messages, self.max_tokens);

        CLIENT_REQUESTS.click();
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = request.messages.len(),
            "sending streaming completion request"
        );
        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        STREAM_TTFB.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Read the whole body of a failed response into an upstream error.
    async fn process_error_response(response: Response) -> Error {
        CLIENT_UPSTREAM_ERRORS.click();
        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                tracing::warn!(status = status_code, body = %body, "completion request rejected");
                Error::upstream(status_code, body)
            }
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }
}

impl CompletionSource for StreamingCompletionClient {
    fn stream_completion(&self, messages: Vec<ChatCompletionMessage>) -> FragmentStream {
        let this = self.clone();
        let opened = async move { this.open(messages).await };
        Box::pin(stream::once(opened).flat_map(|opened| match opened {
            Ok(response) => process_sse(Box::pin(response.bytes_stream())).boxed(),
            Err(err) => stream::once(future::ready(Err(err))).boxed(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let config = ChatConfig::new().with_api_key("test-key");
        let client = StreamingCompletionClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), config.endpoint);
        assert_eq!(client.model(), "qwen/qwen3-coder-next");
        assert_eq!(client.max_tokens, 4096);
        assert_eq!(client.credential(), &Credential::Fixed("test-key".to_string()));

        let config = ChatConfig::new().with_api_key_env("TUTOR_CHAT_SOME_KEY");
        let client = StreamingCompletionClient::new(&config).unwrap();
        assert_eq!(
            client.credential(),
            &Credential::Environment("TUTOR_CHAT_SOME_KEY".to_string())
        );
    }

    #[test]
    fn fixed_credential_is_redacted() {
        let credential = Credential::Fixed("sk-or-secret".to_string());
        let debug = format!("{credential:?}");
        assert!(!debug.contains("sk-or-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn unset_environment_credential_is_missing() {
        let credential = Credential::Environment("TUTOR_CHAT_UNIT_TEST_UNSET_KEY".to_string());
        let err = credential.resolve().unwrap_err();
        assert!(err.is_missing_credential());
        assert!(err.to_string().contains("TUTOR_CHAT_UNIT_TEST_UNSET_KEY"));
    }

    #[tokio::test]
    async fn missing_credential_is_a_stream_item() {
        let config = ChatConfig::new()
            .with_endpoint("http://127.0.0.1:9/unreachable")
            .with_api_key_env("TUTOR_CHAT_UNIT_TEST_UNSET_KEY");
        let client = StreamingCompletionClient::new(&config).unwrap();

        let items: Vec<Result<String>> = client
            .stream_completion(vec![ChatCompletionMessage::system("sys")])
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_missing_credential());
    }

    #[test]
    fn headers_carry_bearer_and_referer() {
        let config = ChatConfig::new().with_referer("https://example.com/tutor");
        let client = StreamingCompletionClient::new(&config).unwrap();
        let headers = client.headers("abc").unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
        assert_eq!(headers["http-referer"], "https://example.com/tutor");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(client.headers("bad\nkey").unwrap_err().is_validation());
    }
}
