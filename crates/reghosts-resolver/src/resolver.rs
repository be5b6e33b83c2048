use std::collections::HashMap;
use std::sync::Arc;

use crate::endpoint::{Capabilities, EndpointTemplate, ResolvedEndpoint};
use crate::error::ResolverError;
use crate::expand::expand;
use crate::hosts::RegistryHosts;
use crate::RegistryConfig;

/// Index name of the default public registry, as it appears in image
/// references.
pub const DOCKER_HUB_INDEX: &str = "docker.io";

/// Host that actually serves the registry API for [`DOCKER_HUB_INDEX`].
pub const DOCKER_HUB_HOST: &str = "registry-1.docker.io";

/// Maps a repository hostname to the host that serves its API.
pub fn normalize_host(host: &str) -> &str {
    if host == DOCKER_HUB_INDEX {
        DOCKER_HUB_HOST
    } else {
        host
    }
}

/// Resolves hosts using explicit, operator-supplied configuration only.
///
/// Hostnames are matched case-insensitively, both for the requested host and
/// for the mirrors it names. The configuration map is shared read-only, so
/// one instance can serve any number of concurrent resolutions.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredHosts {
    configs: Arc<HashMap<String, RegistryConfig>>,
}

impl ConfiguredHosts {
    pub fn new(configs: HashMap<String, RegistryConfig>) -> Self {
        Self {
            configs: Arc::new(
                configs
                    .into_iter()
                    .map(|(host, config)| (host.to_ascii_lowercase(), config))
                    .collect(),
            ),
        }
    }

    pub fn config(&self, host: &str) -> Option<&RegistryConfig> {
        self.configs.get(&host.to_ascii_lowercase())
    }

    /// Produces the ordered endpoints for `host`: every configured mirror's
    /// variants, in mirror order, followed by the origin's variants.
    ///
    /// Returns `Ok(None)` when `host` has no configuration entry. Callers
    /// are expected to fall back to their own defaults in that case.
    pub fn resolve(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        let host = host.to_ascii_lowercase();
        let Some(config) = self.configs.get(&host) else {
            tracing::trace!(host = %host, "No registry configuration");
            return Ok(None);
        };

        let mut endpoints = Vec::new();
        let unconfigured = RegistryConfig::default();
        for mirror in &config.mirrors {
            let mirror = mirror.to_ascii_lowercase();
            let template = EndpointTemplate::new(mirror.clone(), Capabilities::mirror());
            let mirror_config = self.configs.get(&mirror).unwrap_or(&unconfigured);
            endpoints.extend(expand(&mirror, mirror_config, &template)?);
        }

        let origin = normalize_host(&host);
        let template = EndpointTemplate::new(origin, Capabilities::origin());
        endpoints.extend(expand(origin, config, &template)?);

        tracing::debug!(
            host = %host,
            endpoints = %endpoints.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" "),
            "Resolved registry host"
        );
        Ok(Some(endpoints))
    }
}

impl RegistryHosts for ConfiguredHosts {
    fn hosts(&self, host: &str) -> Result<Option<Vec<ResolvedEndpoint>>, ResolverError> {
        self.resolve(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use maplit::hashmap;
    use miette::Result;
    use pretty_assertions::assert_eq;

    use crate::endpoint::{Capability, Scheme};
    use crate::TlsKeyPair;

    fn urls(endpoints: &[ResolvedEndpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn unconfigured_host_is_not_an_error() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "example.com".to_string() => RegistryConfig::default(),
        });
        assert!(hosts.resolve("other.example.com")?.is_none());
        assert!(hosts.resolve("docker.io")?.is_none());
        Ok(())
    }

    #[test]
    fn without_mirrors_only_origin_variants() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "example.com".to_string() => RegistryConfig::new().plain_http(true).insecure(true),
        });
        let endpoints = hosts.resolve("example.com")?.expect("configured");
        assert_eq!(
            urls(&endpoints),
            vec!["http://example.com/v2", "https://example.com/v2"]
        );
        assert!(!endpoints[0].skip_verify);
        assert!(endpoints[1].skip_verify);
        Ok(())
    }

    #[test]
    fn mirrors_come_first_in_order() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "example.com".to_string() => RegistryConfig::new()
                .mirror("one.mirror")
                .mirror("two.mirror"),
            "two.mirror".to_string() => RegistryConfig::new().insecure(true),
        });
        let endpoints = hosts.resolve("example.com")?.expect("configured");
        assert_eq!(
            urls(&endpoints),
            vec![
                "https://one.mirror/v2",
                "https://two.mirror/v2",
                "https://example.com/v2"
            ]
        );
        assert_eq!(
            endpoints.iter().map(|e| e.skip_verify).collect::<Vec<_>>(),
            vec![false, true, false]
        );
        Ok(())
    }

    #[test]
    fn only_the_origin_can_push() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "example.com".to_string() => RegistryConfig::new()
                .mirror("mirror.local")
                .mirror("localhost:5000"),
            "mirror.local".to_string() => RegistryConfig::new().plain_http(true).insecure(true),
        });
        let endpoints = hosts.resolve("example.com")?.expect("configured");
        let (origin, mirrors): (Vec<_>, Vec<_>) =
            endpoints.iter().partition(|e| e.host == "example.com");
        assert_eq!(mirrors.len(), 3);
        for mirror in mirrors {
            assert!(!mirror.can(Capability::Push));
            assert!(mirror.can(Capability::Pull));
            assert!(mirror.can(Capability::Resolve));
        }
        assert_eq!(origin.len(), 1);
        assert_eq!(origin[0].capabilities, Capabilities::origin());
        Ok(())
    }

    #[test]
    fn mirror_uses_its_own_configuration() -> Result<()> {
        // Scenario: the mirror is plain HTTP, the origin is left to defaults.
        let hosts = ConfiguredHosts::new(hashmap! {
            "example.com".to_string() => RegistryConfig::new().mirror("mirror.local"),
            "mirror.local".to_string() => RegistryConfig::new().plain_http(true),
        });
        let endpoints = hosts.resolve("example.com")?.expect("configured");
        assert_eq!(
            urls(&endpoints),
            vec!["http://mirror.local/v2", "https://example.com/v2"]
        );
        Ok(())
    }

    #[test]
    fn insecure_registry_has_single_endpoint() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "registry.internal".to_string() => RegistryConfig::new().insecure(true),
        });
        let endpoints = hosts.resolve("registry.internal")?.expect("configured");
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].scheme, Scheme::Https);
        assert_eq!(endpoints[0].host, "registry.internal");
        assert!(endpoints[0].skip_verify);
        Ok(())
    }

    #[test]
    fn docker_io_is_normalized() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "docker.io".to_string() => RegistryConfig::new().mirror("mirror.gcr.io"),
        });
        let endpoints = hosts.resolve("docker.io")?.expect("configured");
        assert_eq!(
            urls(&endpoints),
            vec!["https://mirror.gcr.io/v2", "https://registry-1.docker.io/v2"]
        );
        Ok(())
    }

    #[test]
    fn mirror_failure_aborts_resolution() -> Result<()> {
        let broken = RegistryConfig::new().key_pair(TlsKeyPair::new(
            include_bytes!("../tests/fixtures/client.pem").to_vec(),
            include_bytes!("../tests/fixtures/other.key").to_vec(),
        ));
        let hosts = ConfiguredHosts::new(hashmap! {
            "example.com".to_string() => RegistryConfig::new().mirror("broken.mirror"),
            "broken.mirror".to_string() => broken,
        });
        let err = hosts
            .resolve("example.com")
            .expect_err("mirror trust configuration is invalid");
        let ResolverError::TlsConfig { host, .. } = err;
        assert_eq!(host, "broken.mirror");
        Ok(())
    }

    #[test]
    fn hosts_and_mirrors_match_case_insensitively() -> Result<()> {
        let hosts = ConfiguredHosts::new(hashmap! {
            "Example.COM".to_string() => RegistryConfig::new().mirror("Mirror.Local"),
            "mirror.local".to_string() => RegistryConfig::new().plain_http(true),
        });
        assert!(hosts.config("example.com").is_some());
        for host in ["example.com", "Example.COM", "EXAMPLE.com"] {
            let endpoints = hosts.resolve(host)?.expect("configured");
            assert_eq!(
                urls(&endpoints),
                vec!["http://mirror.local/v2", "https://example.com/v2"]
            );
        }
        let endpoints = ConfiguredHosts::new(hashmap! {
            "docker.io".to_string() => RegistryConfig::default(),
        })
        .resolve("Docker.IO")?
        .expect("configured");
        assert_eq!(urls(&endpoints), vec!["https://registry-1.docker.io/v2"]);
        Ok(())
    }
}
