//! Stub creation and component binding.
//!
//! [`StubFactory`] turns a capability name into a typed stub with its endpoint
//! resolved and shape fixed. [`Binder`] walks a [`Component`]'s slots and
//! installs a fresh stub into each one.

use std::collections::HashSet;
use std::sync::Arc;

use funcmesh_api::{EnvironmentCredentials, RemoteClient, SigV4Signer, StubDispatcher};
use funcmesh_types::{EndpointConfig, ShapeDescriptor};
use funcmesh_util::{EndpointResolver, PropertySource};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{CapabilityType, Component, StubBinding};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("component '{component}' declares a capability slot with an empty name")]
    EmptySlotName { component: String },

    #[error("component '{component}' declares capability '{name}' more than once")]
    DuplicateSlot { component: String, name: String },
}

/// Builds typed stubs backed by one resolver and one dispatcher.
#[derive(Debug, Clone)]
pub struct StubFactory {
    resolver: Arc<EndpointResolver>,
    dispatcher: Arc<StubDispatcher>,
}

impl StubFactory {
    pub fn new(resolver: Arc<EndpointResolver>, dispatcher: Arc<StubDispatcher>) -> Self {
        Self { resolver, dispatcher }
    }

    /// Factory wired from properties: process environment for endpoint
    /// overrides, transport timeouts, and a SigV4 signer reading credentials
    /// from the environment.
    pub fn from_properties(properties: Arc<dyn PropertySource>) -> reqwest::Result<Self> {
        let client = RemoteClient::from_properties(properties.as_ref())?;
        let signer = SigV4Signer::from_properties(Arc::new(EnvironmentCredentials::default()), properties.as_ref());
        let dispatcher = StubDispatcher::new(client).with_signer(Arc::new(signer));
        Ok(Self::new(Arc::new(EndpointResolver::from_properties(properties)), Arc::new(dispatcher)))
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &StubDispatcher {
        &self.dispatcher
    }

    /// Build the stub for `name` directly, for constructor or builder injection.
    pub fn make_stub<S: CapabilityType>(&self, name: &str) -> S {
        let descriptor = S::descriptor();
        let endpoint = self.resolver.resolve(name);
        if descriptor.is_degraded() {
            warn!(capability = %name, shape = %descriptor, "untyped stub: responses decode into generic JSON values");
        }
        if endpoint.requires_signing() && !self.dispatcher.signing_ready() {
            warn!(capability = %name, "endpoint requires signing but credentials are unavailable; calls will fail");
        }
        info!(capability = %name, shape = %descriptor, url = %endpoint.url, auth_mode = %endpoint.auth_mode, "created capability stub");

        S::from_binding(StubBinding {
            capability: name.to_string(),
            endpoint,
            descriptor,
            dispatcher: Arc::clone(&self.dispatcher),
        })
    }
}

/// One slot installed by [`Binder::bind`].
#[derive(Debug, Clone, Serialize)]
pub struct BoundSlot {
    pub name: String,
    pub descriptor: ShapeDescriptor,
    pub endpoint: EndpointConfig,
}

impl BoundSlot {
    pub fn is_degraded(&self) -> bool {
        self.descriptor.is_degraded()
    }
}

/// Outcome of binding one component.
#[derive(Debug, Clone, Serialize)]
pub struct BindReport {
    pub component: &'static str,
    pub slots: Vec<BoundSlot>,
}

impl BindReport {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, name: &str) -> Option<&BoundSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }
}

/// Installs stubs into components.
///
/// Binding is idempotent: binding a component again replaces every stub with a
/// freshly built one and never adds slots.
#[derive(Debug, Clone)]
pub struct Binder {
    factory: StubFactory,
}

impl Binder {
    pub fn new(factory: StubFactory) -> Self {
        Self { factory }
    }

    /// Bind every capability slot of `component`.
    ///
    /// A wrapper component is unwrapped one level and its inner component's
    /// slots are bound instead. Slot names are validated before any stub is
    /// installed, so a failed bind leaves the component untouched.
    pub fn bind(&self, component: &mut dyn Component) -> Result<BindReport, BindError> {
        let outer = component.component_name();
        if let Some(inner) = component.inner() {
            debug!(component = %outer, inner = %inner.component_name(), "binding wrapped component");
            return self.bind_slots(inner);
        }
        self.bind_slots(component)
    }

    fn bind_slots(&self, component: &mut dyn Component) -> Result<BindReport, BindError> {
        let component_name = component.component_name();
        let mut slots = component.capability_slots();

        let mut seen = HashSet::new();
        for slot in &slots {
            let name = slot.name();
            if name.trim().is_empty() {
                return Err(BindError::EmptySlotName {
                    component: component_name.to_string(),
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(BindError::DuplicateSlot {
                    component: component_name.to_string(),
                    name: name.to_string(),
                });
            }
        }

        let mut report = BindReport {
            component: component_name,
            slots: Vec::with_capacity(slots.len()),
        };
        for slot in slots.iter_mut() {
            let rebinding = slot.is_bound();
            slot.install(&self.factory);
            let endpoint = self.factory.resolver.resolve(slot.name());
            info!(
                component = %component_name,
                capability = %slot.name(),
                shape = %slot.descriptor(),
                url = %endpoint.url,
                rebinding,
                "bound capability slot"
            );
            report.slots.push(BoundSlot {
                name: slot.name().to_string(),
                descriptor: slot.descriptor(),
                endpoint,
            });
        }
        Ok(report)
    }
}
