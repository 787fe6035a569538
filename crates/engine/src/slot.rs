use funcmesh_api::{InvocationCause, InvocationError};
use funcmesh_types::ShapeDescriptor;

use crate::{CapabilityType, StubFactory};

/// A named dependency point on a component, filled in by the binder.
#[derive(Debug, Clone)]
pub struct Slot<S> {
    name: String,
    stub: Option<S>,
}

impl<S: CapabilityType> Slot<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stub: None,
        }
    }

    pub fn get(&self) -> Option<&S> {
        self.stub.as_ref()
    }

    /// The installed stub, or a `ConfigurationMissing` failure when the slot
    /// was never bound.
    pub fn stub(&self) -> Result<&S, InvocationError> {
        self.stub
            .as_ref()
            .ok_or_else(|| InvocationError::new(&self.name, InvocationCause::ConfigurationMissing))
    }
}

/// Object-safe view of a [`Slot`], used by the binder to enumerate slots of
/// different stub types uniformly.
pub trait CapabilitySlot {
    fn name(&self) -> &str;

    fn descriptor(&self) -> ShapeDescriptor;

    fn is_bound(&self) -> bool;

    /// Build a fresh stub from `factory`, replacing any installed one.
    fn install(&mut self, factory: &StubFactory);
}

impl<S: CapabilityType> CapabilitySlot for Slot<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> ShapeDescriptor {
        S::descriptor()
    }

    fn is_bound(&self) -> bool {
        self.stub.is_some()
    }

    fn install(&mut self, factory: &StubFactory) {
        self.stub = Some(factory.make_stub::<S>(&self.name));
    }
}
