use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Authentication applied to requests sent to a capability endpoint.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    /// Requests are sent as-is.
    #[default]
    None,
    /// Requests are signed with SigV4 before transmission.
    Signed,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Signed => "SIGNED",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ParseAuthModeError;

    /// Parses case-insensitively. `AWS_IAM` is accepted as a legacy spelling of `SIGNED`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "SIGNED" | "AWS_IAM" => Ok(Self::Signed),
            _ => Err(ParseAuthModeError { value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAuthModeError {
    pub value: String,
}

impl fmt::Display for ParseAuthModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid auth type '{}'; expected NONE or SIGNED", self.value)
    }
}

impl Error for ParseAuthModeError {}

/// Resolved target for one capability.
///
/// `url` is absolute and always ends with `/{name}` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub url: String,
    pub auth_mode: AuthMode,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>, auth_mode: AuthMode) -> Self {
        Self {
            url: url.into(),
            auth_mode,
        }
    }

    pub fn requires_signing(&self) -> bool {
        self.auth_mode == AuthMode::Signed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_parses_known_values_case_insensitively() {
        assert_eq!("none".parse::<AuthMode>(), Ok(AuthMode::None));
        assert_eq!(" Signed ".parse::<AuthMode>(), Ok(AuthMode::Signed));
        assert_eq!("aws_iam".parse::<AuthMode>(), Ok(AuthMode::Signed));
    }

    #[test]
    fn auth_mode_rejects_unknown_values() {
        let error = "kerberos".parse::<AuthMode>().unwrap_err();
        assert_eq!(error.value, "kerberos");
        assert!(error.to_string().contains("kerberos"));
    }

    #[test]
    fn endpoint_config_serializes_with_camel_case_keys() {
        let config = EndpointConfig::new("http://localhost:8166/pricing", AuthMode::Signed);
        let json = serde_json::to_value(&config).expect("serialize endpoint");
        assert_eq!(json["url"], "http://localhost:8166/pricing");
        assert_eq!(json["authMode"], "SIGNED");
        assert!(config.requires_signing());
    }
}
