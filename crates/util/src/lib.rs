pub mod config;
pub mod endpoint;
pub mod properties;
pub mod redact;

pub use config::*;
pub use endpoint::*;
pub use properties::*;
pub use redact::*;
