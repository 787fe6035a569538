//! Request construction, exchange and response decoding for capability calls.

use std::sync::Arc;
use std::time::Instant;

use funcmesh_types::{CAPABILITY_HEADER, CapabilityShape, FRAMEWORK_HEADER, HttpMethod, Invocation, JSON_MEDIA_TYPE};
use funcmesh_util::{redact_sensitive, truncate_preview};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{InvocationCause, InvocationError, RemoteClient, SigV4Signer, SigningError};

const BODY_PREVIEW_LIMIT: usize = 200;

/// Raw outcome of one HTTP exchange.
#[derive(Debug)]
struct Exchange {
    status: StatusCode,
    body: Vec<u8>,
}

/// Executes invocations over HTTP.
///
/// One dispatcher is shared by every stub built from the same factory. It
/// holds no per-call state; concurrent calls are independent.
#[derive(Debug, Clone)]
pub struct StubDispatcher {
    client: RemoteClient,
    signer: Option<Arc<SigV4Signer>>,
}

impl StubDispatcher {
    pub fn new(client: RemoteClient) -> Self {
        Self { client, signer: None }
    }

    /// Attach the signer used for endpoints whose auth mode is `SIGNED`.
    pub fn with_signer(mut self, signer: Arc<SigV4Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Whether a signer is attached and its credentials can be loaded.
    pub fn signing_ready(&self) -> bool {
        self.signer.as_ref().is_some_and(|signer| signer.credentials_available())
    }

    /// Perform a Function or Producer invocation and decode the response into `O`.
    ///
    /// Returns `Ok(None)` for an empty 2xx body.
    pub async fn invoke<O: DeserializeOwned>(&self, invocation: Invocation) -> Result<Option<O>, InvocationError> {
        let exchange = self.exchange(&invocation).await?;
        decode_response(&invocation.capability, exchange.status, &exchange.body)
    }

    /// Perform a Consumer invocation. The response body is never decoded.
    pub async fn invoke_discarding(&self, invocation: Invocation) -> Result<(), InvocationError> {
        let exchange = self.exchange(&invocation).await?;
        if exchange.status.is_success() {
            return Ok(());
        }
        Err(remote_status(&invocation.capability, exchange.status, &exchange.body))
    }

    /// Headers a request to `invocation` carries on the wire, signed when required.
    pub fn request_headers(&self, invocation: &Invocation) -> Result<HeaderMap, InvocationError> {
        let headers = base_headers(&invocation.capability)?;
        if !invocation.endpoint.requires_signing() {
            return Ok(headers);
        }

        let signer = self.signer.as_ref().ok_or_else(|| {
            InvocationError::new(
                &invocation.capability,
                SigningError::credentials_unavailable("endpoint requires signing but no signer is configured"),
            )
        })?;
        debug!(capability = %invocation.capability, "applying request signature");
        signer
            .sign(
                &invocation.endpoint.url,
                &to_reqwest_method(invocation.method),
                &headers,
                invocation.payload.as_deref(),
            )
            .map_err(|error| InvocationError::new(&invocation.capability, error))
    }

    async fn exchange(&self, invocation: &Invocation) -> Result<Exchange, InvocationError> {
        let capability = invocation.capability.as_str();
        let url = invocation.endpoint.url.as_str();
        let headers = self.request_headers(invocation)?;
        let start = Instant::now();
        debug!(
            capability = %capability,
            method = %invocation.method,
            %url,
            body_bytes = invocation.payload.as_ref().map_or(0, Vec::len),
            "remote call started"
        );

        let mut request = self.client.request(to_reqwest_method(invocation.method), url).headers(headers);
        if let Some(payload) = &invocation.payload {
            // The exact bytes that were signed.
            request = request.body(payload.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|error| InvocationError::new(capability, InvocationCause::Transport(error)))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| InvocationError::new(capability, InvocationCause::Transport(error)))?
            .to_vec();

        debug!(
            capability = %capability,
            status = status.as_u16(),
            response_bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "remote call completed"
        );
        Ok(Exchange { status, body })
    }
}

/// JSON content negotiation plus the framework identification headers.
fn base_headers(capability: &str) -> Result<HeaderMap, InvocationError> {
    let capability_value = HeaderValue::from_str(capability).map_err(|_| {
        InvocationError::new(
            capability,
            InvocationCause::InvalidConfiguration {
                message: "capability name is not a valid header value".to_string(),
            },
        )
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
    headers.insert(HeaderName::from_static(FRAMEWORK_HEADER), HeaderValue::from_static("true"));
    headers.insert(HeaderName::from_static(CAPABILITY_HEADER), capability_value);
    Ok(headers)
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    }
}

fn remote_status(capability: &str, status: StatusCode, body: &[u8]) -> InvocationError {
    warn!(capability = %capability, status = status.as_u16(), "remote returned error status");
    InvocationError::new(
        capability,
        InvocationCause::RemoteStatus {
            status: status.as_u16(),
            body_preview: body_preview(body),
            body: serde_json::from_slice::<serde_json::Value>(body).ok(),
        },
    )
}

fn body_preview(body: &[u8]) -> String {
    redact_sensitive(&truncate_preview(&String::from_utf8_lossy(body), BODY_PREVIEW_LIMIT))
}

/// Decode a Function or Producer response body.
///
/// Any non-2xx status is a status failure, whatever the body holds; a JSON
/// error document is carried on the failure rather than decoded as `O`. On
/// 2xx a whitespace-only body is absent (`Ok(None)`) and a body that does not
/// decode is a decode failure.
pub fn decode_response<O: DeserializeOwned>(capability: &str, status: StatusCode, body: &[u8]) -> Result<Option<O>, InvocationError> {
    if !status.is_success() {
        return Err(remote_status(capability, status, body));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice::<O>(body).map(Some).map_err(|source| {
        InvocationError::new(
            capability,
            InvocationCause::Decode {
                status: status.as_u16(),
                source,
                body_preview: body_preview(body),
            },
        )
    })
}

/// Serialize a call argument exactly once; these bytes are signed and sent.
pub fn encode_payload<I: serde::Serialize + ?Sized>(capability: &str, input: &I) -> Result<Vec<u8>, InvocationError> {
    serde_json::to_vec(input).map_err(|error| InvocationError::new(capability, InvocationCause::Encode(error)))
}

/// Build the invocation for a call of `shape`, encoding `input` when the shape sends a body.
pub fn prepare_invocation<I: serde::Serialize + ?Sized>(
    capability: &str,
    shape: CapabilityShape,
    endpoint: funcmesh_types::EndpointConfig,
    input: Option<&I>,
) -> Result<Invocation, InvocationError> {
    let payload = match input {
        Some(input) if shape.sends_body() => Some(encode_payload(capability, input)?),
        _ => None,
    };
    Ok(Invocation::new(capability, shape, endpoint, payload))
}
