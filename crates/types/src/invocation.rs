use std::fmt;

use serde::Serialize;

use crate::{CapabilityShape, EndpointConfig};

/// HTTP verbs produced by capability stubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call to a capability.
///
/// Built fresh for each call and dropped once the response is decoded. The
/// payload holds the serialized argument exactly as it will be signed and
/// transmitted.
///
/// Headers are not stored here; the dispatcher derives them from the
/// invocation on every send (`StubDispatcher::request_headers`), signing them
/// when the endpoint requires it.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub capability: String,
    pub shape: CapabilityShape,
    pub endpoint: EndpointConfig,
    pub method: HttpMethod,
    pub payload: Option<Vec<u8>>,
}

impl Invocation {
    /// Build an invocation, discarding any payload for shapes that never send a body.
    pub fn new(capability: impl Into<String>, shape: CapabilityShape, endpoint: EndpointConfig, payload: Option<Vec<u8>>) -> Self {
        let payload = if shape.sends_body() { payload } else { None };
        Self {
            capability: capability.into(),
            shape,
            endpoint,
            method: shape.http_method(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthMode;

    #[test]
    fn producer_invocation_drops_payload_and_uses_get() {
        let endpoint = EndpointConfig::new("http://localhost:8080/config", AuthMode::None);
        let invocation = Invocation::new("config", CapabilityShape::Producer, endpoint, Some(b"{}".to_vec()));
        assert_eq!(invocation.method, HttpMethod::Get);
        assert!(invocation.payload.is_none());
    }

    #[test]
    fn consumer_invocation_keeps_payload_and_uses_post() {
        let endpoint = EndpointConfig::new("http://localhost:8080/audit", AuthMode::None);
        let invocation = Invocation::new("audit", CapabilityShape::Consumer, endpoint, Some(b"{\"id\":1}".to_vec()));
        assert_eq!(invocation.method, HttpMethod::Post);
        assert_eq!(invocation.payload.as_deref(), Some(&b"{\"id\":1}"[..]));
    }
}
