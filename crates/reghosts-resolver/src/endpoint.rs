use std::collections::BTreeSet;
use std::fmt;

use url::Url;

use crate::transport::RegistryClient;

/// Root of the registry HTTP API.
pub const REGISTRY_API_PATH: &str = "/v2";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registry operation an endpoint is allowed to serve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Fetch content from the registry.
    Pull,
    /// Upload content to the registry.
    Push,
    /// Resolve a tag to a digest.
    Resolve,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Pull => "pull",
            Capability::Push => "push",
            Capability::Resolve => "resolve",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of [`Capability`] values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// What a mirror may do: pull and resolve, never push.
    pub fn mirror() -> Self {
        [Capability::Pull, Capability::Resolve].into_iter().collect()
    }

    /// What the origin registry may do: everything.
    pub fn origin() -> Self {
        [Capability::Pull, Capability::Push, Capability::Resolve]
            .into_iter()
            .collect()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.iter().map(|c| c.as_str()).collect::<Vec<_>>();
        f.write_str(&names.join(", "))
    }
}

/// Where a candidate host lives and what it may be used for, before a scheme
/// and an HTTP client have been picked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointTemplate {
    pub host: String,
    pub path: String,
    pub capabilities: Capabilities,
}

impl EndpointTemplate {
    /// `{host}/v2` with the given capabilities.
    pub fn new(host: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            host: host.into(),
            path: REGISTRY_API_PATH.into(),
            capabilities,
        }
    }

    pub fn endpoint(
        &self,
        scheme: Scheme,
        skip_verify: bool,
        client: RegistryClient,
    ) -> ResolvedEndpoint {
        ResolvedEndpoint {
            scheme,
            host: self.host.clone(),
            path: self.path.clone(),
            capabilities: self.capabilities.clone(),
            skip_verify,
            client,
        }
    }
}

/// One concrete way of reaching a registry host.
///
/// Callers are handed these in priority order and are expected to try them
/// one after the other until one works.
#[derive(Clone, Debug)]
pub struct ResolvedEndpoint {
    pub scheme: Scheme,
    /// Network authority to dial. May differ from the repository's logical
    /// host (mirrors, `docker.io` aliasing).
    pub host: String,
    pub path: String,
    pub capabilities: Capabilities,
    /// `true` when `client` accepts any server certificate.
    pub skip_verify: bool,
    pub client: RegistryClient,
}

impl ResolvedEndpoint {
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Base URL for API requests, with a trailing slash so it can be
    /// `join`ed.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}{}/", self.scheme, self.host, self.path))
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host, self.path)
    }
}
