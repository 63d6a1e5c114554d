//! Error types for the tutor-chat crate.
//!
//! Every failure that can end a streamed turn is represented here.  The chat
//! session converts these into a single human-readable `error` event for the
//! presentation sink, so the `Display` strings double as user-facing text.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for tutor-chat.
#[derive(Clone, Debug)]
pub enum Error {
    /// No credential is available for the completion endpoint.
    MissingCredential {
        /// Environment variable that was expected to hold the credential.
        variable: String,
    },

    /// The completion endpoint answered with a non-2xx status.
    Upstream {
        /// HTTP status code.
        status_code: u16,
        /// Full response body, as text.
        body: String,
    },

    /// The connection to the completion endpoint could not be established.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The HTTP request failed before a response was received.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Reading the response body failed mid-stream.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON or YAML serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The turn was aborted by the user.
    Abort {
        /// Human-readable error message.
        message: String,
    },

    /// A turn is already streaming on this session.
    Busy,

    /// Error during validation of configuration values.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A URL parsing error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },
}

impl Error {
    /// Creates a new missing-credential error.
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Error::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Creates a new upstream error from a non-2xx response.
    pub fn upstream(status_code: u16, body: impl Into<String>) -> Self {
        Error::Upstream {
            status_code,
            body: body.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new abort error.
    pub fn abort(message: impl Into<String>) -> Self {
        Error::Abort {
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Returns true if this error is a missing credential.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Error::MissingCredential { .. })
    }

    /// Returns true if the endpoint answered with a failure status.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream { .. })
    }

    /// Returns true if this error is a network or stream-read fault.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::HttpClient { .. } | Error::Streaming { .. }
        )
    }

    /// Returns true if the turn was aborted.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if the session was busy with another turn.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy)
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns the HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Upstream { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingCredential { variable } => {
                write!(
                    f,
                    "{variable} is not set. Export it with your API key and restart the chat."
                )
            }
            Error::Upstream { status_code, body } => {
                if body.is_empty() {
                    write!(f, "Upstream error {status_code}")
                } else {
                    write!(f, "Upstream error {status_code}: {body}")
                }
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Abort { message } => {
                write!(f, "Request aborted: {message}")
            }
            Error::Busy => {
                write!(
                    f,
                    "A reply is still streaming; wait for it to finish before sending another message."
                )
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Streaming { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::Io { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for tutor-chat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_names_the_variable() {
        let err = Error::missing_credential("OPENROUTER_API_KEY");
        assert!(err.is_missing_credential());
        assert!(err.to_string().starts_with("OPENROUTER_API_KEY is not set."));
    }

    #[test]
    fn upstream_carries_status_and_body() {
        let err = Error::upstream(429, r#"{"error":"slow down"}"#);
        assert!(err.is_upstream());
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(
            err.to_string(),
            r#"Upstream error 429: {"error":"slow down"}"#
        );
        assert_eq!(Error::upstream(502, "").to_string(), "Upstream error 502");
    }

    #[test]
    fn transport_kinds() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::streaming("Error in HTTP stream: pipe closed", Some(Box::new(io)));
        assert!(err.is_transport());
        assert!(error::Error::source(&err).is_some());
        assert!(Error::connection("refused", None).is_transport());
        assert!(!Error::Busy.is_transport());
    }
}
