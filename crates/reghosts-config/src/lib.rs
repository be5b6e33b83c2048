//! Layered configuration for reghosts: a global config file, `REGHOSTS_*`
//! environment variables, and `reghosts.toml`/`reghosts.kdl` files in a
//! project root, plus conversion of their `registry` tables into
//! [`RegistryConfig`]s.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use clap::ArgMatches;
pub use config::Config as HostsConfig;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use miette::Result;
use reghosts_resolver::{RegistryConfig, TlsKeyPair};
use serde::Deserialize;

pub use error::HostsConfigError;
use kdl_source::KdlFormat;

mod error;
mod kdl_source;

/// Project-level config file names, in increasing order of precedence.
const ROOT_CONFIG_FILES: &[&str] = &[
    "reghosts.toml",
    ".reghosts.toml",
    "reghosts.kdl",
    ".reghosts.kdl",
];

pub trait HostsConfigLayer {
    fn layer_config(&mut self, _matches: &ArgMatches, _config: &HostsConfig) -> Result<()> {
        Ok(())
    }
}

pub struct HostsConfigOptions {
    global: bool,
    env: bool,
    root: Option<PathBuf>,
    global_config_file: Option<PathBuf>,
}

impl Default for HostsConfigOptions {
    fn default() -> Self {
        HostsConfigOptions {
            global: true,
            env: true,
            root: None,
            global_config_file: None,
        }
    }
}

impl HostsConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn env(mut self, env: bool) -> Self {
        self.env = env;
        self
    }

    pub fn root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    pub fn global_config_file(mut self, file: Option<PathBuf>) -> Self {
        self.global_config_file = file;
        self
    }

    pub fn load(self) -> Result<HostsConfig, HostsConfigError> {
        let mut builder = HostsConfig::builder();
        if self.global {
            if let Some(config_file) = self.global_config_file {
                builder = add_file(builder, &config_file);
            }
        }
        if self.env {
            builder = builder.add_source(Environment::with_prefix("reghosts"));
        }
        if let Some(root) = self.root {
            for name in ROOT_CONFIG_FILES {
                builder = add_file(builder, &root.join(name));
            }
        }
        Ok(builder.build()?)
    }
}

fn add_file(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    tracing::trace!("Layering config file {}", path.display());
    if path.extension().map(|ext| ext == "kdl").unwrap_or(false) {
        builder.add_source(File::new(&path.display().to_string(), KdlFormat).required(false))
    } else {
        builder.add_source(File::from(path).required(false))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegistryEntry {
    mirrors: Vec<String>,
    http: Option<bool>,
    insecure: Option<bool>,
    ca: Vec<PathBuf>,
    keypair: Vec<KeyPairEntry>,
}

#[derive(Debug, Deserialize)]
struct KeyPairEntry {
    key: PathBuf,
    cert: PathBuf,
}

impl RegistryEntry {
    fn into_registry_config(self, host: &str) -> Result<RegistryConfig, HostsConfigError> {
        let mut config = RegistryConfig::new();
        config.mirrors = self
            .mirrors
            .into_iter()
            .map(|mirror| mirror.to_lowercase())
            .collect();
        config.plain_http = self.http;
        config.insecure = self.insecure;
        for path in self.ca {
            config.root_cas.push(read_tls_file(host, "certificate authority", path)?);
        }
        for keypair in self.keypair {
            let certificate = read_tls_file(host, "certificate", keypair.cert)?;
            let key = read_tls_file(host, "private key", keypair.key)?;
            config.key_pairs.push(TlsKeyPair::new(certificate, key));
        }
        Ok(config)
    }
}

fn read_tls_file(
    host: &str,
    kind: &'static str,
    path: PathBuf,
) -> Result<Vec<u8>, HostsConfigError> {
    fs::read(&path).map_err(|source| HostsConfigError::TlsFileError {
        host: host.into(),
        kind,
        path,
        source,
    })
}

/// Reads the `registry` table of a loaded configuration into per-host
/// [`RegistryConfig`]s. Host keys and mirror names are lower-cased, and
/// certificate authority and key pair files are read eagerly, relative to the
/// current directory.
///
/// A configuration without any `registry` entries yields an empty map.
pub fn registry_configs(
    config: &HostsConfig,
) -> Result<HashMap<String, RegistryConfig>, HostsConfigError> {
    let entries: HashMap<String, RegistryEntry> = match config.get("registry") {
        Ok(entries) => entries,
        Err(ConfigError::NotFound(_)) => return Ok(HashMap::new()),
        Err(err) => return Err(err.into()),
    };
    entries
        .into_iter()
        .map(|(host, entry)| {
            let host = host.to_lowercase();
            let config = entry.into_registry_config(&host)?;
            tracing::debug!("Loaded registry configuration for {host}");
            Ok((host, config))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::env;

    use maplit::hashmap;
    use miette::IntoDiagnostic;
    use pretty_assertions::assert_eq;
    use reghosts_resolver::ConfiguredHosts;
    use tempfile::tempdir;

    const CA: &str = include_str!("../../reghosts-resolver/tests/fixtures/ca.pem");

    #[test]
    fn env_configs() -> Result<()> {
        env::set_var("REGHOSTS_LOGLEVEL", "debug");
        let config = HostsConfigOptions::new().global(false).load()?;
        env::remove_var("REGHOSTS_LOGLEVEL");
        assert_eq!(
            config.get_string("loglevel").into_diagnostic()?,
            String::from("debug")
        );
        Ok(())
    }

    #[test]
    fn global_config() -> Result<()> {
        let dir = tempdir().into_diagnostic()?;
        let file = dir.path().join("reghosts.toml");
        fs::write(
            &file,
            r#"
            [registry."Example.COM"]
            mirrors = ["mirror.local"]

            [registry."mirror.local"]
            http = true
            "#,
        )
        .into_diagnostic()?;
        let config = HostsConfigOptions::new()
            .env(false)
            .global_config_file(Some(file))
            .load()?;
        assert_eq!(
            registry_configs(&config)?,
            hashmap! {
                "example.com".to_string() => RegistryConfig::new().mirror("mirror.local"),
                "mirror.local".to_string() => RegistryConfig::new().plain_http(true),
            }
        );
        Ok(())
    }

    #[test]
    fn mirror_names_match_their_own_entries() -> Result<()> {
        let dir = tempdir().into_diagnostic()?;
        let file = dir.path().join("reghosts.toml");
        fs::write(
            &file,
            r#"
            [registry."example.com"]
            mirrors = ["Mirror.Local"]

            [registry."Mirror.Local"]
            http = true
            "#,
        )
        .into_diagnostic()?;
        let config = HostsConfigOptions::new()
            .env(false)
            .global_config_file(Some(file))
            .load()?;
        let configs = registry_configs(&config)?;
        assert_eq!(configs["example.com"].mirrors, vec!["mirror.local".to_string()]);
        assert_eq!(configs["mirror.local"].plain_http, Some(true));

        let endpoints = ConfiguredHosts::new(configs)
            .resolve("example.com")
            .into_diagnostic()?
            .expect("example.com is configured");
        assert_eq!(
            endpoints.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            vec!["http://mirror.local/v2", "https://example.com/v2"]
        );
        Ok(())
    }

    #[test]
    fn root_kdl_config_reads_trust_files() -> Result<()> {
        let dir = tempdir().into_diagnostic()?;
        let ca = dir.path().join("ca.pem");
        fs::write(&ca, CA).into_diagnostic()?;
        fs::write(
            dir.path().join("reghosts.kdl"),
            format!(
                r#"
                registry "registry.internal" {{
                    insecure true
                    ca "{}"
                }}
                "#,
                ca.display()
            ),
        )
        .into_diagnostic()?;
        let config = HostsConfigOptions::new()
            .global(false)
            .env(false)
            .root(Some(dir.path().to_path_buf()))
            .load()?;
        let configs = registry_configs(&config)?;
        let internal = &configs["registry.internal"];
        assert_eq!(internal.insecure, Some(true));
        assert_eq!(internal.plain_http, None);
        assert_eq!(internal.root_cas, vec![CA.as_bytes().to_vec()]);
        Ok(())
    }

    #[test]
    fn root_config_overrides_global() -> Result<()> {
        let global = tempdir().into_diagnostic()?;
        let root = tempdir().into_diagnostic()?;
        let file = global.path().join("reghosts.toml");
        fs::write(
            &file,
            "[registry.\"example.com\"]\ninsecure = true\nhttp = false\n",
        )
        .into_diagnostic()?;
        fs::write(
            root.path().join("reghosts.toml"),
            "[registry.\"example.com\"]\ninsecure = false\n",
        )
        .into_diagnostic()?;
        let config = HostsConfigOptions::new()
            .env(false)
            .global_config_file(Some(file))
            .root(Some(root.path().to_path_buf()))
            .load()?;
        let configs = registry_configs(&config)?;
        assert_eq!(configs["example.com"].insecure, Some(false));
        assert_eq!(configs["example.com"].plain_http, Some(false));
        Ok(())
    }

    #[test]
    fn missing_trust_file() -> Result<()> {
        let dir = tempdir().into_diagnostic()?;
        let file = dir.path().join("reghosts.toml");
        let missing = dir.path().join("nope.pem");
        fs::write(
            &file,
            format!(
                "[registry.\"example.com\"]\nca = [{:?}]\n",
                missing.display().to_string()
            ),
        )
        .into_diagnostic()?;
        let config = HostsConfigOptions::new()
            .env(false)
            .global_config_file(Some(file))
            .load()?;
        let err = registry_configs(&config).expect_err("CA file doesn't exist");
        assert!(matches!(
            err,
            HostsConfigError::TlsFileError { ref host, kind: "certificate authority", ref path, .. }
                if host == "example.com" && path == &missing
        ));
        Ok(())
    }

    #[test]
    fn missing_config() -> Result<()> {
        let config = HostsConfigOptions::new().global(false).env(false).load()?;
        assert!(config.get_string("loglevel").is_err());
        assert!(registry_configs(&config)?.is_empty());
        Ok(())
    }
}
