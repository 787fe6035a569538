//! # Funcmesh Engine
//!
//! Typed stubs for remote capabilities and the binder that installs them.
//!
//! A component declares its remote dependencies as [`Slot`]s whose stub type
//! fixes the calling convention:
//!
//! - [`RemoteFunction<I, O>`]: one input, one output (`POST`)
//! - [`RemoteProducer<O>`]: no input, one output (`GET`)
//! - [`RemoteConsumer<I>`]: one input, no output (`POST`)
//!
//! The [`Binder`] resolves each slot's endpoint once and installs a stub with
//! the endpoint and shape baked in. Stubs can also be built directly with
//! [`StubFactory::make_stub`] for constructor injection.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let factory = StubFactory::from_properties(Arc::new(properties))?;
//! let mut checkout = Checkout::default();
//! Binder::new(factory).bind(&mut checkout)?;
//!
//! let quote = checkout.pricing.stub()?.call(&request).await?;
//! ```

pub mod binder;
pub mod component;
pub mod slot;
pub mod stub;

pub use binder::{BindError, BindReport, Binder, BoundSlot, StubFactory};
pub use component::Component;
pub use slot::{CapabilitySlot, Slot};
pub use stub::{CapabilityType, RemoteConsumer, RemoteFunction, RemoteProducer, StubBinding, UntypedConsumer, UntypedFunction, UntypedProducer};
