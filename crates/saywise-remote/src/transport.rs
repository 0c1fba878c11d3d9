//! HTTP transport abstraction for the remote synthesis endpoint.
//!
//! The client talks to the service only through [`SpeechTransport`], so tests
//! can substitute a mock or a scripted transport. The production
//! implementation uses reqwest.

use async_trait::async_trait;
use url::Url;

use crate::config::RemoteClientConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::protocol::{RemoteRequest, RemoteResponse};

// ============================================================================
// Transport Trait
// ============================================================================

/// Sends one request to the remote service and returns its parsed response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<RemoteResponse>;
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// Production transport: JSON POST to the configured endpoint.
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: Option<String>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.auth_token.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Create a transport for the endpoint in `config`.
    pub fn new(config: &RemoteClientConfig) -> RemoteResult<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            auth_token: config.token.clone(),
        })
    }

    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build a request with optional authentication.
    fn build_request(&self, body: &RemoteRequest) -> reqwest::RequestBuilder {
        let mut request = self.client.post(self.endpoint.as_str()).json(body);
        if let Some(ref token) = self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }
}

/// Interpret a raw response body.
///
/// A JSON body with an `error` field wins over the HTTP status, so the
/// service's own message is preserved.
fn parse_body(status: u16, success: bool, body: &str) -> RemoteResult<RemoteResponse> {
    match serde_json::from_str::<RemoteResponse>(body) {
        Ok(parsed) => {
            if let Some(error) = parsed.error {
                return Err(RemoteError::Api(error));
            }
            if success {
                Ok(parsed)
            } else {
                Err(RemoteError::Status {
                    status,
                    message: body.to_string(),
                })
            }
        }
        Err(_) if !success => Err(RemoteError::Status {
            status,
            message: body.trim().chars().take(200).collect(),
        }),
        Err(e) => Err(RemoteError::InvalidResponse(e.to_string())),
    }
}

#[async_trait]
impl SpeechTransport for ReqwestTransport {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<RemoteResponse> {
        tracing::debug!(kind = request.kind(), endpoint = %self.endpoint, "Sending remote speech request");

        let response = self.build_request(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        parse_body(status.as_u16(), status.is_success(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let config = RemoteClientConfig::new("https://example.com/speech").with_token("abc");
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint().as_str(), "https://example.com/speech");
        assert_eq!(transport.auth_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = RemoteClientConfig::new("not a url");
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_parse_body_success() {
        let parsed = parse_body(200, true, r#"{"voices":[{"id":"a"}]}"#).unwrap();
        assert_eq!(parsed.voice_count(), 1);
    }

    #[test]
    fn test_parse_body_error_field_wins() {
        let err = parse_body(200, true, r#"{"error":"quota"}"#).unwrap_err();
        assert!(matches!(err, RemoteError::Api(m) if m == "quota"));

        let err = parse_body(429, false, r#"{"error":"rate limited"}"#).unwrap_err();
        assert!(matches!(err, RemoteError::Api(m) if m == "rate limited"));
    }

    #[test]
    fn test_parse_body_status_and_garbage() {
        let err = parse_body(502, false, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 502, .. }));

        let err = parse_body(200, true, "not json").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_mock_transport_is_usable_as_trait_object() {
        let mut mock = MockSpeechTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(RemoteResponse::with_voices(2)));

        let transport: &dyn SpeechTransport = &mock;
        let response = transport.send(&RemoteRequest::CheckAvailability).await.unwrap();
        assert_eq!(response.voice_count(), 2);
    }
}
