//! Endpoint resolution for named capabilities.
//!
//! A capability name resolves to an [`EndpointConfig`] through a fixed chain
//! of sources; the first match wins:
//!
//! 1. environment variable `REMOTE_URL_<NAME>`
//! 2. property `<name>.url`
//! 3. property `functions.<name>.url`
//! 4. property `functions.<name>.port`, synthesizing `http://localhost:<port>/<name>`
//! 5. a local address on `functions.default.port.base` (default 8080) plus a
//!    stable offset derived from the name
//!
//! The chain never fails. Results are memoized per name for the lifetime of
//! the resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use funcmesh_types::{AuthMode, EndpointConfig};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{EnvironmentSource, ProcessEnvironment, PropertySource, non_blank_property};

/// Prefix of the per-capability URL environment variable.
pub const REMOTE_URL_ENV_PREFIX: &str = "REMOTE_URL_";
/// Prefix of namespaced capability properties.
pub const FUNCTIONS_PREFIX: &str = "functions.";
/// Property holding the base port for synthesized local addresses.
pub const DEFAULT_BASE_PORT_PROPERTY: &str = "functions.default.port.base";
pub const DEFAULT_BASE_PORT: u16 = 8080;
pub const DEFAULT_LOCAL_HOST: &str = "localhost";
/// Synthesized ports fall in `base..base + PORT_OFFSET_RANGE`.
pub const PORT_OFFSET_RANGE: u32 = 100;

/// Which link of the resolution chain produced an endpoint URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Environment,
    DirectProperty,
    FunctionUrlProperty,
    FunctionPortProperty,
    DefaultPort,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::DirectProperty => "direct-property",
            Self::FunctionUrlProperty => "function-url-property",
            Self::FunctionPortProperty => "function-port-property",
            Self::DefaultPort => "default-port",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved endpoint together with the source that supplied its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub config: EndpointConfig,
    pub source: ResolutionSource,
}

impl Resolution {
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "url": self.config.url,
            "authMode": self.config.auth_mode,
            "source": self.source.as_str(),
        })
    }
}

/// Resolves capability names to endpoints from environment and properties.
///
/// Safe to share across threads. The cache is populated lazily; two threads
/// racing on the same name compute the same value and the second write is a
/// no-op in effect.
pub struct EndpointResolver {
    environment: Arc<dyn EnvironmentSource>,
    properties: Arc<dyn PropertySource>,
    cache: RwLock<HashMap<String, EndpointConfig>>,
}

impl EndpointResolver {
    pub fn new(environment: Arc<dyn EnvironmentSource>, properties: Arc<dyn PropertySource>) -> Self {
        Self {
            environment,
            properties,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver over the process environment and the given properties.
    pub fn from_properties(properties: Arc<dyn PropertySource>) -> Self {
        Self::new(Arc::new(ProcessEnvironment), properties)
    }

    /// Resolve `name`, returning the memoized config when one exists.
    pub fn resolve(&self, name: &str) -> EndpointConfig {
        if let Some(config) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(name) {
            return config.clone();
        }

        let resolution = self.explain(name);
        debug!(
            capability = %name,
            url = %resolution.config.url,
            auth_mode = %resolution.config.auth_mode,
            source = %resolution.source,
            "resolved capability endpoint"
        );
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(resolution.config)
            .clone()
    }

    /// Run the full resolution chain without consulting or filling the cache.
    pub fn explain(&self, name: &str) -> Resolution {
        let (url, source) = self.resolve_url(name);
        Resolution {
            name: name.to_string(),
            config: EndpointConfig::new(url, self.resolve_auth_mode(name)),
            source,
        }
    }

    /// Number of memoized endpoints.
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn resolve_url(&self, name: &str) -> (String, ResolutionSource) {
        let env_var = format!("{REMOTE_URL_ENV_PREFIX}{}", name.to_uppercase());
        if let Some(url) = self.environment.var(&env_var).map(|value| value.trim().to_string()).filter(|value| !value.is_empty()) {
            return (normalize_url(&url, name), ResolutionSource::Environment);
        }

        let properties = self.properties.as_ref();
        if let Some(url) = non_blank_property(properties, &format!("{name}.url")) {
            return (normalize_url(&url, name), ResolutionSource::DirectProperty);
        }

        if let Some(url) = non_blank_property(properties, &function_key(name, "url")) {
            return (normalize_url(&url, name), ResolutionSource::FunctionUrlProperty);
        }

        if let Some(raw_port) = non_blank_property(properties, &function_key(name, "port")) {
            match raw_port.parse::<u16>() {
                Ok(port) => return (local_url(port, name), ResolutionSource::FunctionPortProperty),
                Err(error) => warn!(capability = %name, value = %raw_port, %error, "invalid port; falling back to default port"),
            }
        }

        let port = default_port(name, self.base_port());
        (local_url(port, name), ResolutionSource::DefaultPort)
    }

    fn resolve_auth_mode(&self, name: &str) -> AuthMode {
        let Some(raw) = non_blank_property(self.properties.as_ref(), &function_key(name, "authType")) else {
            return AuthMode::None;
        };
        raw.parse().unwrap_or_else(|error| {
            warn!(capability = %name, %error, "invalid authType; using NONE");
            AuthMode::None
        })
    }

    fn base_port(&self) -> u16 {
        let Some(raw) = non_blank_property(self.properties.as_ref(), DEFAULT_BASE_PORT_PROPERTY) else {
            return DEFAULT_BASE_PORT;
        };
        raw.parse().unwrap_or_else(|error| {
            warn!(value = %raw, %error, default = DEFAULT_BASE_PORT, "invalid base port; using default");
            DEFAULT_BASE_PORT
        })
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointResolver").field("cached", &self.cached_len()).finish_non_exhaustive()
    }
}

fn function_key(name: &str, suffix: &str) -> String {
    format!("{FUNCTIONS_PREFIX}{name}.{suffix}")
}

fn local_url(port: u16, name: &str) -> String {
    format!("http://{DEFAULT_LOCAL_HOST}:{port}/{name}")
}

/// Strip one trailing slash and append `/<name>` unless it is already the final segment.
///
/// Idempotent: normalizing a normalized URL returns it unchanged.
pub fn normalize_url(url: &str, name: &str) -> String {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    let suffix = format!("/{name}");
    if trimmed.ends_with(&suffix) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{suffix}")
    }
}

/// Stable local port for `name`: `base + |hash(lowercase(name))| mod 100`.
pub fn default_port(name: &str, base_port: u16) -> u16 {
    let offset = name_hash(&name.to_lowercase()).unsigned_abs() % PORT_OFFSET_RANGE;
    // offset < 100, so the narrowing is lossless.
    base_port.saturating_add(offset as u16)
}

/// 32-bit polynomial hash (`h = 31 * h + unit`) over UTF-16 code units.
///
/// Services that computed their listening port with the same formula agree
/// with the addresses synthesized here.
pub fn name_hash(name: &str) -> i32 {
    name.encode_utf16().fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Properties;

    fn resolver_with(env: &[(&str, &str)], properties: &[(&str, &str)]) -> EndpointResolver {
        let environment: HashMap<String, String> = env.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        EndpointResolver::new(Arc::new(environment), Arc::new(Properties::from_pairs(properties.iter().copied())))
    }

    #[test]
    fn unconfigured_capability_uses_hashed_default_port() {
        let resolver = resolver_with(&[], &[]);
        let first = resolver.resolve("pricing");
        let second = resolver.resolve("pricing");
        assert_eq!(first.url, "http://localhost:8166/pricing");
        assert_eq!(first, second);
        assert_eq!(first.auth_mode, AuthMode::None);
        assert_eq!(resolver.explain("pricing").source, ResolutionSource::DefaultPort);
    }

    #[test]
    fn name_hash_matches_reference_values() {
        assert_eq!(name_hash("pricing"), -315_056_186);
        assert_eq!(name_hash("a"), 97);
        assert_eq!(name_hash(""), 0);
        assert_eq!(default_port("inventory", 8080), 8140);
        assert_eq!(default_port("OrderProcessor", 8080), default_port("orderprocessor", 8080));
    }

    #[test]
    fn base_port_property_shifts_default_port() {
        let resolver = resolver_with(&[], &[(DEFAULT_BASE_PORT_PROPERTY, "9000")]);
        assert_eq!(resolver.resolve("pricing").url, "http://localhost:9086/pricing");
    }

    #[test]
    fn invalid_base_port_falls_back_to_default() {
        let resolver = resolver_with(&[], &[(DEFAULT_BASE_PORT_PROPERTY, "not-a-port")]);
        assert_eq!(resolver.resolve("pricing").url, "http://localhost:8166/pricing");
    }

    #[test]
    fn function_url_property_is_normalized() {
        let resolver = resolver_with(&[], &[("functions.pricing.url", "http://host/api")]);
        assert_eq!(resolver.resolve("pricing").url, "http://host/api/pricing");
    }

    #[test]
    fn port_property_synthesizes_local_url() {
        let resolver = resolver_with(&[], &[("functions.pricing.port", "9123")]);
        let resolution = resolver.explain("pricing");
        assert_eq!(resolution.config.url, "http://localhost:9123/pricing");
        assert_eq!(resolution.source, ResolutionSource::FunctionPortProperty);
    }

    #[test]
    fn invalid_port_property_continues_to_fallback() {
        let resolver = resolver_with(&[], &[("functions.pricing.port", "99999")]);
        let resolution = resolver.explain("pricing");
        assert_eq!(resolution.config.url, "http://localhost:8166/pricing");
        assert_eq!(resolution.source, ResolutionSource::DefaultPort);
    }

    #[test]
    fn priority_chain_prefers_environment_then_direct_then_namespaced() {
        let properties = [
            ("pricing.url", "http://direct/"),
            ("functions.pricing.url", "http://namespaced"),
            ("functions.pricing.port", "9000"),
        ];

        let with_env = resolver_with(&[("REMOTE_URL_PRICING", "https://env.example/pricing/")], &properties);
        let resolution = with_env.explain("pricing");
        assert_eq!(resolution.config.url, "https://env.example/pricing");
        assert_eq!(resolution.source, ResolutionSource::Environment);

        let without_env = resolver_with(&[], &properties);
        let resolution = without_env.explain("pricing");
        assert_eq!(resolution.config.url, "http://direct/pricing");
        assert_eq!(resolution.source, ResolutionSource::DirectProperty);

        let namespaced_only = resolver_with(&[], &properties[1..]);
        assert_eq!(namespaced_only.explain("pricing").source, ResolutionSource::FunctionUrlProperty);
    }

    #[test]
    fn blank_sources_are_skipped() {
        let resolver = resolver_with(&[("REMOTE_URL_PRICING", "  ")], &[("pricing.url", ""), ("functions.pricing.url", "http://host")]);
        assert_eq!(resolver.resolve("pricing").url, "http://host/pricing");
    }

    #[test]
    fn process_environment_is_consulted_by_default() {
        temp_env::with_var("REMOTE_URL_LEDGER", Some("https://abc.lambda-url.eu-west-1.on.aws/"), || {
            let resolver = EndpointResolver::from_properties(Arc::new(Properties::new()));
            assert_eq!(resolver.resolve("ledger").url, "https://abc.lambda-url.eu-west-1.on.aws/ledger");
        });
    }

    #[test]
    fn auth_type_is_parsed_and_defaults_to_none() {
        let resolver = resolver_with(
            &[],
            &[("functions.pricing.authType", "signed"), ("functions.inventory.authType", "bogus")],
        );
        assert_eq!(resolver.resolve("pricing").auth_mode, AuthMode::Signed);
        assert_eq!(resolver.resolve("inventory").auth_mode, AuthMode::None);
        assert_eq!(resolver.resolve("shipping").auth_mode, AuthMode::None);
    }

    #[test]
    fn resolutions_are_cached_per_name() {
        let resolver = resolver_with(&[], &[]);
        resolver.resolve("pricing");
        resolver.resolve("pricing");
        resolver.resolve("inventory");
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn normalize_appends_name_once() {
        assert_eq!(normalize_url("http://host/api", "pricing"), "http://host/api/pricing");
        assert_eq!(normalize_url("http://host/api/", "pricing"), "http://host/api/pricing");
        assert_eq!(normalize_url("http://host/pricing", "pricing"), "http://host/pricing");
        assert_eq!(normalize_url("http://host/pricing/", "pricing"), "http://host/pricing");
        assert_eq!(normalize_url("http://host/repricing", "pricing"), "http://host/repricing/pricing");
    }

    #[test]
    fn normalize_is_idempotent() {
        for url in ["http://host", "http://host/", "http://host/a/pricing", "https://x.on.aws/pricing/"] {
            let once = normalize_url(url, "pricing");
            assert_eq!(normalize_url(&once, "pricing"), once);
            assert!(once.ends_with("/pricing"));
            assert!(!once.ends_with("/pricing/pricing"));
        }
    }

    #[test]
    fn resolution_is_total_for_arbitrary_names() {
        let resolver = resolver_with(&[], &[]);
        for name in ["a", "Inventory-Checker", "ünïcode", "x".repeat(64).as_str()] {
            let config = resolver.resolve(name);
            assert!(config.url.starts_with("http://localhost:"));
            assert!(config.url.ends_with(&format!("/{name}")));
            let port: u16 = config.url["http://localhost:".len()..].split('/').next().unwrap().parse().unwrap();
            assert!((DEFAULT_BASE_PORT..DEFAULT_BASE_PORT + 100).contains(&port));
        }
    }
}
