use crate::endpoint::{Capabilities, EndpointTemplate, ResolvedEndpoint, Scheme};
use crate::error::ResolverError;
use crate::expand::is_localhost;
use crate::hosts::RegistryHosts;
use crate::resolver::normalize_host;
use crate::transport::new_client;

/// Generic behaviour for hosts nobody configured: a single endpoint with
/// every capability, plain HTTP for hosts matched by `plain_http`, and the
/// platform trust store otherwise.
#[derive(Clone, Debug)]
pub struct DefaultHosts {
    plain_http: fn(&str) -> bool,
}

impl Default for DefaultHosts {
    fn default() -> Self {
        Self {
            plain_http: is_localhost,
        }
    }
}

impl DefaultHosts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the predicate that decides which hosts are dialed over
    /// plain HTTP.
    pub fn plain_http(mut self, matcher: fn(&str) -> bool) -> Self {
        self.plain_http = matcher;
        self
    }

    pub fn resolve(&self, host: &str) -> Result<Vec<ResolvedEndpoint>, ResolverError> {
        let host = host.to_ascii_lowercase();
        let origin = normalize_host(&host);
        let scheme = if (self.plain_http)(&host) {
            Scheme::Http
        } else {
            Scheme::Https
        };
        let client = new_client().map_err(ResolverError::tls_config(origin))?;
        Ok(vec![EndpointTemplate::new(origin, Capabilities::origin())
            .endpoint(scheme, false, client)])
    }
}

impl RegistryHosts for DefaultHosts {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        self.resolve(host).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use miette::Result;
    use pretty_assertions::assert_eq;

    #[test]
    fn docker_hub_defaults() -> Result<()> {
        let endpoints = DefaultHosts::new().resolve("docker.io")?;
        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            DefaultHosts::new().resolve("Docker.IO")?[0].to_string(),
            "https://registry-1.docker.io/v2"
        );
        assert_eq!(endpoints[0].to_string(), "https://registry-1.docker.io/v2");
        assert_eq!(endpoints[0].capabilities, Capabilities::origin());
        assert!(!endpoints[0].skip_verify);
        Ok(())
    }

    #[test]
    fn localhost_defaults_to_plain_http() -> Result<()> {
        let endpoints = DefaultHosts::new().resolve("localhost:5000")?;
        assert_eq!(endpoints[0].to_string(), "http://localhost:5000/v2");
        Ok(())
    }

    #[test]
    fn custom_plain_http_matcher() -> Result<()> {
        let hosts = DefaultHosts::new().plain_http(|host| host.ends_with(".test"));
        assert_eq!(
            hosts.resolve("registry.test")?[0].to_string(),
            "http://registry.test/v2"
        );
        assert_eq!(
            hosts.resolve("localhost")?[0].to_string(),
            "https://localhost/v2"
        );
        Ok(())
    }
}
