//! AWS Signature Version 4 header signing.
//!
//! The signer takes the caller's header set, drops the headers the protocol
//! manages itself (`Authorization`, `X-Amz-Date`, `X-Amz-Security-Token`,
//! `Host`), recomputes them, and returns the complete header set to send.
//! The payload hash covers the exact body bytes handed in, so the caller must
//! transmit those same bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use funcmesh_util::{PropertySource, non_blank_property};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HOST, HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use super::{CredentialsProvider, DEFAULT_REGION, region_from_url};
use crate::SigningError;

type HmacSha256 = Hmac<Sha256>;

/// Service name used in the credential scope unless configured otherwise.
pub const DEFAULT_SERVICE: &str = "lambda";
/// Property overriding the fallback signing region.
pub const REGION_PROPERTY: &str = "functions.signing.region";
/// Property overriding the signing service name.
pub const SERVICE_PROPERTY: &str = "functions.signing.service";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const AMZ_DATE: &str = "x-amz-date";
const AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
const MANAGED_HEADERS: [&str; 4] = ["authorization", AMZ_DATE, AMZ_SECURITY_TOKEN, "host"];

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

pub struct SigV4Signer {
    credentials: Arc<dyn CredentialsProvider>,
    service: String,
    default_region: String,
}

impl SigV4Signer {
    pub fn new(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            credentials,
            service: DEFAULT_SERVICE.to_string(),
            default_region: DEFAULT_REGION.to_string(),
        }
    }

    /// Signer honoring `functions.signing.service` and `functions.signing.region`.
    pub fn from_properties(credentials: Arc<dyn CredentialsProvider>, properties: &dyn PropertySource) -> Self {
        let mut signer = Self::new(credentials);
        if let Some(service) = non_blank_property(properties, SERVICE_PROPERTY) {
            signer.service = service;
        }
        if let Some(region) = non_blank_property(properties, REGION_PROPERTY) {
            signer.default_region = region;
        }
        signer
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Region recovered from the endpoint host, or the configured fallback.
    pub fn region_for(&self, url: &str) -> String {
        region_from_url(url).unwrap_or_else(|| {
            warn!(%url, region = %self.default_region, "could not extract region from url; using default");
            self.default_region.clone()
        })
    }

    /// Whether the credential source can currently produce credentials.
    pub fn credentials_available(&self) -> bool {
        match self.credentials.credentials() {
            Ok(_) => true,
            Err(error) => {
                warn!(%error, "signing credentials unavailable");
                false
            }
        }
    }

    /// Sign a request as of now. See [`SigV4Signer::sign_at`].
    pub fn sign(&self, url: &str, method: &Method, headers: &HeaderMap, body: Option<&[u8]>) -> Result<HeaderMap, SigningError> {
        self.sign_at(url, method, headers, body, Utc::now())
    }

    /// Produce the signed header set for a request at `timestamp`.
    ///
    /// The result contains every caller header except the managed ones, plus
    /// `host`, `x-amz-date`, `x-amz-security-token` (for session credentials)
    /// and a freshly computed `authorization`.
    pub fn sign_at(
        &self,
        url: &str,
        method: &Method,
        headers: &HeaderMap,
        body: Option<&[u8]>,
        timestamp: DateTime<Utc>,
    ) -> Result<HeaderMap, SigningError> {
        let parsed = Url::parse(url).map_err(|error| SigningError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        })?;
        let host = host_header_value(&parsed).ok_or_else(|| SigningError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        })?;
        let credentials = self.credentials.credentials()?;
        let region = self.region_for(url);
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = timestamp.format("%Y%m%d").to_string();

        let mut signed = HeaderMap::new();
        for (name, value) in headers {
            if !MANAGED_HEADERS.contains(&name.as_str()) {
                signed.append(name.clone(), value.clone());
            }
        }
        signed.insert(HOST, header_value("host", &host)?);
        signed.insert(HeaderName::from_static(AMZ_DATE), header_value(AMZ_DATE, &amz_date)?);
        if let Some(token) = &credentials.session_token {
            signed.insert(HeaderName::from_static(AMZ_SECURITY_TOKEN), header_value(AMZ_SECURITY_TOKEN, token)?);
        }

        let (canonical_headers, signed_header_names) = canonical_headers(&signed)?;
        let payload_hash = hex::encode(Sha256::digest(body.unwrap_or_default()));
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri(&parsed),
            canonical_query(&parsed),
            canonical_headers,
            signed_header_names,
            payload_hash
        );

        let scope = format!("{date_stamp}/{region}/{}/aws4_request", self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signing_key = derive_signing_key(&credentials.secret_access_key, &date_stamp, &region, &self.service)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_header_names}, Signature={signature}",
            credentials.access_key_id
        );
        signed.insert(AUTHORIZATION, header_value("authorization", &authorization)?);

        debug!(%url, %region, service = %self.service, signed_headers = %signed_header_names, "signed request");
        Ok(signed)
    }
}

impl fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("service", &self.service)
            .field("default_region", &self.default_region)
            .finish_non_exhaustive()
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, SigningError> {
    HeaderValue::from_str(value).map_err(|_| SigningError::invalid_header(name))
}

/// `host[:port]`, with the port only when it is not the scheme default.
fn host_header_value(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Lowercased, sorted `name:value` lines and the matching `;`-joined name list.
fn canonical_headers(headers: &HeaderMap) -> Result<(String, String), SigningError> {
    let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let text = value.to_str().map_err(|_| SigningError::invalid_header(name.as_str()))?;
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        grouped.entry(name.as_str()).or_default().push(collapsed);
    }

    let mut lines = String::new();
    for (name, values) in &grouped {
        lines.push_str(name);
        lines.push(':');
        lines.push_str(&values.join(","));
        lines.push('\n');
    }
    let names = grouped.keys().copied().collect::<Vec<_>>().join(";");
    Ok((lines, names))
}

/// Each path segment is encoded again on top of the URL's own encoding.
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Query parameters decoded as plain percent-encoding, where `+` is a literal
/// plus and not a space, then re-encoded and sorted.
fn canonical_query(url: &Url) -> String {
    let encode = |raw: &str| utf8_percent_encode(&percent_decode_str(raw).decode_utf8_lossy(), URI_ENCODE_SET).to_string();
    let mut pairs: Vec<(String, String)> = url
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (encode(key), encode(value))
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Result<Vec<u8>, SigningError> {
    let date_key = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, service.as_bytes())?;
    hmac_sha256(&service_key, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
