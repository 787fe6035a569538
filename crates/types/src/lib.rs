//! Shared type definitions for funcmesh.
//!
//! The types here describe a remote capability independently of how it is
//! reached: its calling convention ([`CapabilityShape`]), the concrete types
//! flowing through it ([`ShapeDescriptor`]), where it lives
//! ([`EndpointConfig`]), and the per-call request record ([`Invocation`]).

pub mod endpoint;
pub mod invocation;
pub mod shape;

pub use endpoint::*;
pub use invocation::*;
pub use shape::*;

/// Header set on every request to mark it as originating from a funcmesh stub.
pub const FRAMEWORK_HEADER: &str = "x-framework";

/// Header naming the capability a request is addressed to.
pub const CAPABILITY_HEADER: &str = "x-capability";

/// Media type used for request and response bodies.
pub const JSON_MEDIA_TYPE: &str = "application/json";
