use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use clap::Args;
use miette::{IntoDiagnostic, Result, WrapErr};
use reghosts_config::{registry_configs, HostsConfig, HostsConfigLayer};
use reghosts_resolver::RegistryConfig;

use crate::commands::resolve::{endpoint_json, resolve_endpoints};
use crate::commands::ReghostsCommand;
use crate::error::ReghostsError;

#[derive(Debug, Args)]
pub struct PingCmd {
    /// Registry hostname to ping.
    host: String,

    #[arg(from_global)]
    json: bool,

    #[arg(skip)]
    registries: HashMap<String, RegistryConfig>,
}

#[async_trait]
impl ReghostsCommand for PingCmd {
    async fn execute(self) -> Result<()> {
        let (_, endpoints) = resolve_endpoints(&self.registries, &self.host)?;
        let mut attempts = Vec::new();
        for endpoint in &endpoints {
            let url = endpoint
                .url()
                .into_diagnostic()
                .wrap_err("ping::url")?;
            tracing::info!("ping: {url}");
            let start = Instant::now();
            match endpoint.client.get(url).send().await {
                Ok(response) => {
                    let time = start.elapsed().as_micros() as f32 / 1000.0;
                    let status = response.status().as_u16();
                    tracing::info!("pong: {status} in {time}ms");
                    if self.json {
                        let output = serde_json::to_string_pretty(&serde_json::json!({
                            "host": self.host,
                            "endpoint": endpoint_json(endpoint),
                            "status": status,
                            "time": time,
                        }))
                        .into_diagnostic()
                        .wrap_err("ping::serialize")?;
                        println!("{output}");
                    } else {
                        println!("{endpoint} answered {status} in {time}ms");
                    }
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!("{endpoint} did not answer: {err}");
                    attempts.push(endpoint.to_string());
                }
            }
        }
        Err(ReghostsError::Unreachable {
            host: self.host,
            attempts,
        }
        .into())
    }
}

impl HostsConfigLayer for PingCmd {
    fn layer_config(&mut self, _matches: &clap::ArgMatches, config: &HostsConfig) -> Result<()> {
        self.registries = registry_configs(config)?;
        Ok(())
    }
}
