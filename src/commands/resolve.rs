use std::collections::HashMap;

use async_trait::async_trait;
use clap::Args;
use miette::{IntoDiagnostic, Result, WrapErr};
use reghosts_config::{registry_configs, HostsConfig, HostsConfigLayer};
use reghosts_resolver::{ConfiguredHosts, DefaultHosts, RegistryConfig, ResolvedEndpoint};
use serde_json::{json, Value};

use crate::commands::ReghostsCommand;

/// Where a resolved endpoint list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    Configured,
    Defaults,
}

impl EndpointSource {
    fn as_str(&self) -> &'static str {
        match self {
            EndpointSource::Configured => "configured",
            EndpointSource::Defaults => "defaults",
        }
    }
}

/// Resolves `host` against explicit configuration first, falling back to the
/// built-in defaults when nothing is configured for it.
pub(crate) fn resolve_endpoints(
    registries: &HashMap<String, RegistryConfig>,
    host: &str,
) -> Result<(EndpointSource, Vec<ResolvedEndpoint>)> {
    let configured = ConfiguredHosts::new(registries.clone());
    if let Some(endpoints) = configured.resolve(host)? {
        return Ok((EndpointSource::Configured, endpoints));
    }
    Ok((EndpointSource::Defaults, DefaultHosts::new().resolve(host)?))
}

pub(crate) fn endpoint_json(endpoint: &ResolvedEndpoint) -> Value {
    json!({
        "url": endpoint.to_string(),
        "scheme": endpoint.scheme.as_str(),
        "host": endpoint.host,
        "path": endpoint.path,
        "capabilities": endpoint
            .capabilities
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>(),
        "skip_verify": endpoint.skip_verify,
    })
}

#[derive(Debug, Args)]
pub struct ResolveCmd {
    /// Registry hostname to resolve, e.g. `docker.io` or `localhost:5000`.
    host: String,

    #[arg(from_global)]
    json: bool,

    #[arg(skip)]
    registries: HashMap<String, RegistryConfig>,
}

#[async_trait]
impl ReghostsCommand for ResolveCmd {
    async fn execute(self) -> Result<()> {
        let (source, endpoints) = resolve_endpoints(&self.registries, &self.host)?;
        tracing::debug!(
            "Resolved {} endpoint(s) for {} from {}",
            endpoints.len(),
            self.host,
            source.as_str()
        );
        if self.json {
            let output = serde_json::to_string_pretty(&json!({
                "host": self.host,
                "source": source.as_str(),
                "endpoints": endpoints.iter().map(endpoint_json).collect::<Vec<_>>(),
            }))
            .into_diagnostic()
            .wrap_err("resolve::serialize")?;
            println!("{output}");
        } else {
            println!("{} ({})", self.host, source.as_str());
            for endpoint in &endpoints {
                let verify = if endpoint.skip_verify {
                    " (skip verify)"
                } else {
                    ""
                };
                println!("  {endpoint}  [{}]{verify}", endpoint.capabilities);
            }
        }
        Ok(())
    }
}

impl HostsConfigLayer for ResolveCmd {
    fn layer_config(&mut self, _matches: &clap::ArgMatches, config: &HostsConfig) -> Result<()> {
        self.registries = registry_configs(config)?;
        Ok(())
    }
}
