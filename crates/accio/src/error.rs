use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// The message reported for server errors without a recognizable error body.
pub const UNKNOWN_MESSAGE: &str = "Unknown";

/// An error that happens while loading a resource.
///
/// This is what ends up in a subscription's `error` cell, except for
/// [`Cancelled`](Self::Cancelled) which is absorbed by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request was aborted, either by teardown of its subscription or by renewing
    /// the process-wide [`CancelSignal`](crate::cancel::CancelSignal).
    #[error("request cancelled")]
    Cancelled,
    /// The request did not produce a response, e.g. because of connection loss, DNS resolution
    /// or a timeout.
    ///
    /// The attached string contains the underlying error, for logging only.
    #[error("network error: {0}")]
    Transport(String),
    /// The server responded with a non-2xx status.
    ///
    /// `message` is the server supplied `errorMessage`, or [`UNKNOWN_MESSAGE`].
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// The error body shape of the ScoreSaber API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_message: String,
}

impl FetchError {
    /// Builds a [`Server`](Self::Server) error from a non-2xx response.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|body| body.error_message)
            .unwrap_or_else(|_| UNKNOWN_MESSAGE.to_owned());
        Self::Server {
            status: status.as_u16(),
            message,
        }
    }

    /// The kind of error, suitable for metric tags.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Transport(_) => "network",
            Self::Server { .. } => "server",
            Self::Decode(_) => "decode",
        }
    }

    /// The HTTP status code, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A message that is safe to show to users.
    pub fn message(&self) -> String {
        match self {
            Self::Cancelled => "Request cancelled".to_owned(),
            Self::Transport(_) => "Failed to reach the server".to_owned(),
            Self::Server { message, .. } => message.clone(),
            Self::Decode(_) => "Failed to parse response".to_owned(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transport("request timed out".to_owned());
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => Self::Server {
                status: status.as_u16(),
                message: UNKNOWN_MESSAGE.to_owned(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message() {
        let err = FetchError::from_response(
            StatusCode::NOT_FOUND,
            br#"{"errorMessage":"Player not found"}"#,
        );
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "Player not found");
        insta::assert_snapshot!(err.to_string(), @"server error (404): Player not found");
    }

    #[test]
    fn test_unknown_server_error() {
        let err = FetchError::from_response(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert_eq!(
            err,
            FetchError::Server {
                status: 502,
                message: "Unknown".into()
            }
        );
        assert_eq!(err.name(), "server");
    }

    #[test]
    fn test_generic_messages() {
        let err = FetchError::Transport("dns error: no such host".into());
        assert_eq!(err.status(), None);
        assert_eq!(err.message(), "Failed to reach the server");
        insta::assert_snapshot!(err.to_string(), @"network error: dns error: no such host");

        let err = FetchError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert_eq!(err.name(), "decode");
        assert_eq!(err.status(), None);
        assert_eq!(err.message(), "Failed to parse response");
    }
}
