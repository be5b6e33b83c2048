//! Turns a container registry hostname into the ordered list of endpoints a
//! pull or push client should try: configured mirrors first, then the origin
//! registry, each with an HTTP client carrying the right trust material.
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use reghosts_resolver::{registry_hosts, RegistryConfig, RegistryHosts};
//!
//! let mut configs = HashMap::new();
//! configs.insert(
//!     "docker.io".to_string(),
//!     RegistryConfig::new().mirror("mirror.gcr.io"),
//! );
//! let hosts = registry_hosts(configs);
//! for endpoint in hosts.hosts("docker.io")?.unwrap_or_default() {
//!     println!("{endpoint} ({})", endpoint.capabilities);
//! }
//! # Ok::<(), reghosts_resolver::ResolverError>(())
//! ```

mod config;
mod defaults;
mod endpoint;
mod error;
mod expand;
mod hosts;
mod resolver;
mod tls;
mod transport;

pub use config::{RegistryConfig, TlsKeyPair};
pub use defaults::DefaultHosts;
pub use endpoint::{
    Capabilities, Capability, EndpointTemplate, ResolvedEndpoint, Scheme, REGISTRY_API_PATH,
};
pub use error::{KeyPairError, ResolverError, TlsConfigError};
pub use expand::{expand, is_localhost};
pub use hosts::{registry_hosts, CachedHosts, RegistryHosts, Registries};
pub use resolver::{normalize_host, ConfiguredHosts, DOCKER_HUB_HOST, DOCKER_HUB_INDEX};
pub use tls::TrustContext;
pub use transport::{client_with_trust, new_client, new_transport, RegistryClient, TransportSettings};
