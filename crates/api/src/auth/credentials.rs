use std::fmt;
use std::sync::Arc;

use funcmesh_util::{EnvironmentSource, ProcessEnvironment};

use crate::SigningError;

pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

/// Access key pair plus an optional session token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Source of signing credentials, consulted once per signed request.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials, SigningError>;
}

/// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
#[derive(Clone)]
pub struct EnvironmentCredentials {
    environment: Arc<dyn EnvironmentSource>,
}

impl EnvironmentCredentials {
    pub fn new(environment: Arc<dyn EnvironmentSource>) -> Self {
        Self { environment }
    }

    fn required(&self, name: &str) -> Result<String, SigningError> {
        self.environment
            .var(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SigningError::credentials_unavailable(format!("{name} is not set")))
    }
}

impl Default for EnvironmentCredentials {
    fn default() -> Self {
        Self::new(Arc::new(ProcessEnvironment))
    }
}

impl CredentialsProvider for EnvironmentCredentials {
    fn credentials(&self) -> Result<Credentials, SigningError> {
        let mut credentials = Credentials::new(self.required(ACCESS_KEY_ID_ENV)?, self.required(SECRET_ACCESS_KEY_ENV)?);
        credentials.session_token = self.environment.var(SESSION_TOKEN_ENV).filter(|token| !token.trim().is_empty());
        Ok(credentials)
    }
}

impl fmt::Debug for EnvironmentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnvironmentCredentials")
    }
}

/// Fixed credentials, for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, SigningError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(pairs: &[(&str, &str)]) -> Arc<dyn EnvironmentSource> {
        Arc::new(pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect::<HashMap<_, _>>())
    }

    #[test]
    fn environment_credentials_include_session_token_when_present() {
        let provider = EnvironmentCredentials::new(environment(&[
            (ACCESS_KEY_ID_ENV, "AKIDEXAMPLE"),
            (SECRET_ACCESS_KEY_ENV, "secret"),
            (SESSION_TOKEN_ENV, "session"),
        ]));
        let credentials = provider.credentials().expect("credentials");
        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert_eq!(credentials.session_token.as_deref(), Some("session"));
    }

    #[test]
    fn missing_secret_is_reported() {
        let provider = EnvironmentCredentials::new(environment(&[(ACCESS_KEY_ID_ENV, "AKIDEXAMPLE")]));
        let error = provider.credentials().unwrap_err();
        assert_eq!(error, SigningError::credentials_unavailable("AWS_SECRET_ACCESS_KEY is not set"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let credentials = Credentials::new("AKIDEXAMPLE", "super-secret").with_session_token("token");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("\"token\""));
    }
}
