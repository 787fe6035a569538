//! Funcmesh HTTP layer.
//!
//! This crate turns an [`Invocation`](funcmesh_types::Invocation) into one
//! HTTP exchange:
//!
//! - [`RemoteClient`] wraps a pooled `reqwest::Client` configured from properties
//! - [`auth`] signs requests with SigV4 when an endpoint requires it
//! - [`StubDispatcher`] builds the request for a capability shape, sends it and
//!   decodes the response
//!
//! Failures of any kind surface as one [`InvocationError`] naming the capability.

pub mod auth;
pub mod client;
pub mod dispatcher;
pub mod error;

pub use auth::{Credentials, CredentialsProvider, EnvironmentCredentials, SigV4Signer, StaticCredentials};
pub use client::{RemoteClient, TransportSettings};
pub use dispatcher::{StubDispatcher, decode_response, encode_payload, prepare_invocation};
pub use error::{InvocationCause, InvocationError, SigningError};
