//! Capability calling conventions and the descriptors derived from them.

use std::any::{TypeId, type_name};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HttpMethod;

/// The calling convention of a remote capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityShape {
    /// Takes one input and returns one output.
    Function,
    /// Takes no input and returns one output.
    Producer,
    /// Takes one input and returns nothing.
    Consumer,
}

impl CapabilityShape {
    /// HTTP method used on the wire for this shape.
    pub fn http_method(self) -> HttpMethod {
        match self {
            Self::Function | Self::Consumer => HttpMethod::Post,
            Self::Producer => HttpMethod::Get,
        }
    }

    /// Whether calls of this shape carry a request body.
    pub fn sends_body(self) -> bool {
        !matches!(self, Self::Producer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl fmt::Display for CapabilityShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapabilityShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "function" => Ok(Self::Function),
            "producer" | "supplier" => Ok(Self::Producer),
            "consumer" => Ok(Self::Consumer),
            other => Err(format!("unknown capability shape '{other}'; expected function, producer or consumer")),
        }
    }
}

/// A concrete type flowing into or out of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeHint {
    /// Fully qualified Rust type name, for logs and diagnostics.
    pub name: &'static str,
    /// `true` when the type is the generic JSON value and responses are decoded
    /// without a concrete schema.
    pub untyped: bool,
}

impl TypeHint {
    /// Describe `T`, marking it untyped when it is [`serde_json::Value`].
    pub fn of<T: 'static>() -> Self {
        Self {
            name: type_name::<T>(),
            untyped: TypeId::of::<T>() == TypeId::of::<Value>(),
        }
    }

    /// The short, unqualified type name (`PriceQuote` for `shop::PriceQuote`).
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

/// Strip module paths from a type name while keeping generic arguments readable.
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

/// Calling convention plus the input and output types of one capability slot.
///
/// Descriptors are built from a slot's type parameters when the slot is
/// declared, so the shape can never change after binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShapeDescriptor {
    pub shape: CapabilityShape,
    pub input: Option<TypeHint>,
    pub output: Option<TypeHint>,
}

impl ShapeDescriptor {
    /// A function taking `I` and returning `O`.
    pub fn function<I: 'static, O: 'static>() -> Self {
        Self {
            shape: CapabilityShape::Function,
            input: Some(TypeHint::of::<I>()),
            output: Some(TypeHint::of::<O>()),
        }
    }

    /// A producer returning `O`.
    pub fn producer<O: 'static>() -> Self {
        Self {
            shape: CapabilityShape::Producer,
            input: None,
            output: Some(TypeHint::of::<O>()),
        }
    }

    /// A consumer taking `I`. The output is absent and treated as void.
    pub fn consumer<I: 'static>() -> Self {
        Self {
            shape: CapabilityShape::Consumer,
            input: Some(TypeHint::of::<I>()),
            output: None,
        }
    }

    /// `true` when responses decode into a generic JSON value instead of a
    /// concrete type. The decoded value is not checked against any schema.
    pub fn is_degraded(&self) -> bool {
        self.output.is_some_and(|hint| hint.untyped)
    }

    pub fn http_method(&self) -> HttpMethod {
        self.shape.http_method()
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input = self.input.map(|hint| hint.short_name()).unwrap_or("()");
        let output = self.output.map(|hint| hint.short_name()).unwrap_or("()");
        write!(f, "{}({input}) -> {output}", self.shape)
    }
}
