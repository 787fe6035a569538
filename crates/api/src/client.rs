//! Pooled HTTP client shared by every capability stub.

use std::env;
use std::time::Duration;

use funcmesh_util::{PropertySource, non_blank_property};
use reqwest::{Client, Method, RequestBuilder, header};
use tracing::{debug, warn};

/// Property bounding the whole request, in milliseconds.
pub const TIMEOUT_PROPERTY: &str = "functions.http.timeout-ms";
/// Property bounding connection establishment, in milliseconds.
pub const CONNECT_TIMEOUT_PROPERTY: &str = "functions.http.connect-timeout-ms";

/// Transport bounds. Unset values leave the `reqwest` defaults in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSettings {
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl TransportSettings {
    /// Read timeouts from properties; unparseable values are logged and ignored.
    pub fn from_properties(properties: &dyn PropertySource) -> Self {
        Self {
            timeout: millis_property(properties, TIMEOUT_PROPERTY),
            connect_timeout: millis_property(properties, CONNECT_TIMEOUT_PROPERTY),
        }
    }
}

fn millis_property(properties: &dyn PropertySource, key: &str) -> Option<Duration> {
    let raw = non_blank_property(properties, key)?;
    match raw.parse::<u64>() {
        Ok(millis) => Some(Duration::from_millis(millis)),
        Err(error) => {
            warn!(property = %key, value = %raw, %error, "invalid duration; ignoring");
            None
        }
    }
}

/// Thin wrapper around a configured `reqwest::Client`.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    user_agent: String,
}

impl RemoteClient {
    pub fn new(settings: &TransportSettings) -> reqwest::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        Ok(Self {
            http: builder.build()?,
            user_agent: format!("funcmesh/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    pub fn from_properties(properties: &dyn PropertySource) -> reqwest::Result<Self> {
        Self::new(&TransportSettings::from_properties(properties))
    }

    /// Build a request for an absolute URL carrying the client's User-Agent.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, %url, "building request");
        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
