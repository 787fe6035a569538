use thiserror::Error;

/// Failure of a single capability call.
///
/// Every failure mode of an invocation is reported through this one type so
/// callers can match on [`InvocationCause`] without caring which layer failed.
#[derive(Debug, Error)]
#[error("remote capability '{capability}' failed: {cause}")]
pub struct InvocationError {
    pub capability: String,
    #[source]
    pub cause: InvocationCause,
}

impl InvocationError {
    pub fn new(capability: impl Into<String>, cause: impl Into<InvocationCause>) -> Self {
        Self {
            capability: capability.into(),
            cause: cause.into(),
        }
    }

    /// HTTP status reported by the remote side, when the call got that far.
    pub fn status(&self) -> Option<u16> {
        match &self.cause {
            InvocationCause::RemoteStatus { status, .. } => Some(*status),
            InvocationCause::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InvocationCause {
    #[error("no endpoint is configured")]
    ConfigurationMissing,

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// Any non-2xx response. `body` holds the response decoded as JSON when it
    /// is JSON, so callers can read a server-provided error document.
    #[error("remote returned HTTP {status}: {body_preview}")]
    RemoteStatus {
        status: u16,
        body_preview: String,
        body: Option<serde_json::Value>,
    },

    #[error("failed to decode response (HTTP {status}): {source}. body preview: {body_preview}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
        body_preview: String,
    },

    #[error("request signing failed: {0}")]
    Signing(#[from] SigningError),
}

/// Errors raised while computing a SigV4 signature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("credentials unavailable: {reason}")]
    CredentialsUnavailable { reason: String },

    #[error("header '{name}' is not valid for signing")]
    InvalidHeader { name: String },

    #[error("url '{url}' cannot be signed: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("signing key could not be derived")]
    InvalidKey,
}

impl SigningError {
    pub fn credentials_unavailable(reason: impl Into<String>) -> Self {
        Self::CredentialsUnavailable { reason: reason.into() }
    }

    pub fn invalid_header(name: impl Into<String>) -> Self {
        Self::InvalidHeader { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_error_names_capability_and_cause() {
        let error = InvocationError::new(
            "pricing",
            InvocationCause::RemoteStatus {
                status: 503,
                body_preview: "unavailable".into(),
                body: None,
            },
        );
        let message = error.to_string();
        assert!(message.contains("pricing"));
        assert!(message.contains("503"));
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn signing_errors_convert_into_causes() {
        let error = InvocationError::new("ledger", SigningError::credentials_unavailable("AWS_ACCESS_KEY_ID is not set"));
        assert!(matches!(error.cause, InvocationCause::Signing(SigningError::CredentialsUnavailable { .. })));
        assert_eq!(error.status(), None);
    }
}
