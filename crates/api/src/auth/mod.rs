//! SigV4 request signing for endpoints with `authType: SIGNED`.

pub mod credentials;
pub mod region;
pub mod sigv4;

pub use credentials::{Credentials, CredentialsProvider, EnvironmentCredentials, StaticCredentials};
pub use region::{DEFAULT_REGION, region_from_url};
pub use sigv4::{DEFAULT_SERVICE, SigV4Signer};
