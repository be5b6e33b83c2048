use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::defaults::DefaultHosts;
use crate::endpoint::ResolvedEndpoint;
use crate::error::ResolverError;
use crate::resolver::ConfiguredHosts;
use crate::RegistryConfig;

/// Pluggable source of candidate endpoints for a registry hostname.
///
/// `Ok(None)` means "nothing to say about this host", letting the next
/// source have a go. It is never an error.
pub trait RegistryHosts: Send + Sync {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError>;
}

impl<T: RegistryHosts + ?Sized> RegistryHosts for Arc<T> {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        (**self).hosts(host)
    }
}

impl<T: RegistryHosts + ?Sized> RegistryHosts for Box<T> {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        (**self).hosts(host)
    }
}

/// Asks each source in turn and returns the first non-empty answer.
#[derive(Default)]
pub struct Registries {
    sources: Vec<Box<dyn RegistryHosts>>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl RegistryHosts + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl RegistryHosts for Registries {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        for source in &self.sources {
            match source.hosts(host)? {
                Some(endpoints) if !endpoints.is_empty() => return Ok(Some(endpoints)),
                _ => continue,
            }
        }
        Ok(None)
    }
}

/// Memoizes another source by logical host, so repeated lookups hand out the
/// same clients (and therefore the same connection pools) instead of
/// building new ones every time. Failures are not cached.
pub struct CachedHosts<H> {
    inner: H,
    resolved: DashMap<String, Option<Vec<ResolvedEndpoint>>>,
}

impl<H: RegistryHosts> CachedHosts<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            resolved: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Number of hosts currently memoized.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl<H: RegistryHosts> RegistryHosts for CachedHosts<H> {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        if let Some(hit) = self.resolved.get(host) {
            return Ok(hit.value().clone());
        }
        let endpoints = self.inner.hosts(host)?;
        // Two threads racing on the same new host both resolve; whichever
        // lands first is what everyone gets from then on.
        let entry = self
            .resolved
            .entry(host.to_string())
            .or_insert(endpoints);
        Ok(entry.value().clone())
    }
}

/// Explicit configuration first, generic defaults for everything else, all
/// behind a cache. This is the hook a pull/push engine plugs in.
pub fn registry_hosts(configs: HashMap<String, RegistryConfig>) -> CachedHosts<Registries> {
    CachedHosts::new(
        Registries::new()
            .with(ConfiguredHosts::new(configs))
            .with(DefaultHosts::new()),
    )
}
