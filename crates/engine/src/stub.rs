//! Typed capability stubs.
//!
//! A stub is a cheap, cloneable handle pairing a capability name with its
//! resolved endpoint and the shared dispatcher. The shape lives in the stub's
//! type, so a `RemoteProducer` can only ever issue GET requests.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use funcmesh_api::{InvocationError, StubDispatcher, prepare_invocation};
use funcmesh_types::{CapabilityShape, EndpointConfig, ShapeDescriptor};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Everything a stub needs to reach its capability. Fixed at creation.
#[derive(Clone)]
pub struct StubBinding {
    pub capability: String,
    pub endpoint: EndpointConfig,
    pub descriptor: ShapeDescriptor,
    pub dispatcher: Arc<StubDispatcher>,
}

impl fmt::Debug for StubBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubBinding")
            .field("capability", &self.capability)
            .field("endpoint", &self.endpoint)
            .field("shape", &self.descriptor.to_string())
            .finish_non_exhaustive()
    }
}

/// A stub type whose calling convention is known from its type parameters.
pub trait CapabilityType: Clone + Send + Sync + 'static {
    /// Shape and payload types of this stub.
    fn descriptor() -> ShapeDescriptor;

    fn from_binding(binding: StubBinding) -> Self;

    fn binding(&self) -> &StubBinding;

    fn capability(&self) -> &str {
        &self.binding().capability
    }

    fn endpoint(&self) -> &EndpointConfig {
        &self.binding().endpoint
    }
}

/// A capability taking `I` and returning `O`. Sent as `POST` with a JSON body.
pub struct RemoteFunction<I, O> {
    binding: StubBinding,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> RemoteFunction<I, O>
where
    I: Serialize + Sync + 'static,
    O: DeserializeOwned + Send + 'static,
{
    /// Call the capability. `Ok(None)` means the remote answered with an empty body.
    pub async fn call(&self, input: &I) -> Result<Option<O>, InvocationError> {
        let invocation = prepare_invocation(
            &self.binding.capability,
            CapabilityShape::Function,
            self.binding.endpoint.clone(),
            Some(input),
        )?;
        self.binding.dispatcher.invoke(invocation).await
    }
}

/// A capability returning `O` with no input. Sent as `GET` without a body.
pub struct RemoteProducer<O> {
    binding: StubBinding,
    _types: PhantomData<fn() -> O>,
}

impl<O> RemoteProducer<O>
where
    O: DeserializeOwned + Send + 'static,
{
    pub async fn get(&self) -> Result<Option<O>, InvocationError> {
        let invocation = prepare_invocation::<()>(&self.binding.capability, CapabilityShape::Producer, self.binding.endpoint.clone(), None)?;
        self.binding.dispatcher.invoke(invocation).await
    }
}

/// A capability accepting `I` and returning nothing. Sent as `POST`; the
/// response body is ignored on success.
pub struct RemoteConsumer<I> {
    binding: StubBinding,
    _types: PhantomData<fn(I)>,
}

impl<I> RemoteConsumer<I>
where
    I: Serialize + Sync + 'static,
{
    pub async fn accept(&self, input: &I) -> Result<(), InvocationError> {
        let invocation = prepare_invocation(
            &self.binding.capability,
            CapabilityShape::Consumer,
            self.binding.endpoint.clone(),
            Some(input),
        )?;
        self.binding.dispatcher.invoke_discarding(invocation).await
    }
}

/// Function stub decoding into a generic JSON value.
pub type UntypedFunction = RemoteFunction<Value, Value>;
/// Producer stub decoding into a generic JSON value.
pub type UntypedProducer = RemoteProducer<Value>;
/// Consumer stub accepting any JSON value.
pub type UntypedConsumer = RemoteConsumer<Value>;

macro_rules! impl_stub {
    ($stub:ident < $($param:ident),+ >, $descriptor:expr) => {
        impl<$($param: 'static),+> Clone for $stub<$($param),+> {
            fn clone(&self) -> Self {
                Self {
                    binding: self.binding.clone(),
                    _types: PhantomData,
                }
            }
        }

        impl<$($param: 'static),+> fmt::Debug for $stub<$($param),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($stub)).field(&self.binding).finish()
            }
        }

        impl<$($param: 'static),+> CapabilityType for $stub<$($param),+> {
            fn descriptor() -> ShapeDescriptor {
                $descriptor
            }

            fn from_binding(binding: StubBinding) -> Self {
                Self {
                    binding,
                    _types: PhantomData,
                }
            }

            fn binding(&self) -> &StubBinding {
                &self.binding
            }
        }
    };
}

impl_stub!(RemoteFunction<I, O>, ShapeDescriptor::function::<I, O>());
impl_stub!(RemoteProducer<O>, ShapeDescriptor::producer::<O>());
impl_stub!(RemoteConsumer<I>, ShapeDescriptor::consumer::<I>());
