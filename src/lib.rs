use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use clap::{parser::ValueSource, ArgMatches, CommandFactory, FromArgMatches as _, Parser, Subcommand};
use directories::ProjectDirs;
use miette::{IntoDiagnostic, Result};
use reghosts_config::{HostsConfig, HostsConfigLayer, HostsConfigOptions};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use commands::{ping::PingCmd, resolve::ResolveCmd, ReghostsCommand};

mod commands;
mod error;

pub use error::ReghostsError;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Reghosts {
    /// Directory to look for project-level `reghosts.toml`/`reghosts.kdl`
    /// files in.
    #[arg(global = true, long = "root")]
    root: Option<PathBuf>,

    /// File to read configuration values from.
    #[arg(global = true, long)]
    config: Option<PathBuf>,

    /// Log output level/directive. Supports plain loglevels (off, error,
    /// warn, info, debug, trace) as well as more advanced directives in the
    /// format `target[span{field=value}]=level`.
    #[clap(global = true, long, default_value = "warn")]
    loglevel: String,

    /// Disable all output
    #[arg(global = true, long, short)]
    quiet: bool,

    /// Format output as JSON.
    #[arg(global = true, long)]
    json: bool,

    #[command(subcommand)]
    subcommand: ReghostsCmd,
}

impl Reghosts {
    /// `--quiet` wins over `--loglevel`; `RUST_LOG` directives are layered
    /// on top of either.
    fn log_filter(&self) -> Result<EnvFilter> {
        let default = if self.quiet {
            LevelFilter::OFF.into()
        } else {
            self.loglevel.parse().into_diagnostic()?
        };
        Ok(EnvFilter::builder()
            .with_default_directive(default)
            .from_env_lossy())
    }

    fn setup_logging(&self) -> Result<()> {
        // stdout is reserved for command output.
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(self.log_filter()?)
            .init();
        Ok(())
    }

    /// An explicit `--config` file replaces both the per-user file and any
    /// project files under `--root`.
    fn config_options(&self) -> HostsConfigOptions {
        match &self.config {
            Some(file) => HostsConfigOptions::new().global_config_file(Some(file.clone())),
            None => HostsConfigOptions::new()
                .global_config_file(user_config_file())
                .root(self.root.clone()),
        }
    }

    pub async fn load() -> Result<()> {
        let start = Instant::now();
        let matches = Reghosts::command().get_matches();
        let mut reghosts = Reghosts::from_arg_matches(&matches).into_diagnostic()?;
        let config = reghosts.config_options().load()?;
        reghosts.layer_config(&matches, &config)?;
        reghosts.setup_logging()?;
        reghosts.execute().await?;
        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Done");
        Ok(())
    }
}

fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "reghosts").map(|dirs| dirs.config_dir().join("reghosts.toml"))
}

#[derive(Debug, Subcommand)]
pub enum ReghostsCmd {
    /// Ping a registry, trying its endpoints in order until one answers.
    Ping(PingCmd),

    /// Show the ordered endpoints a registry host resolves to.
    Resolve(ResolveCmd),
}

#[async_trait]
impl ReghostsCommand for Reghosts {
    async fn execute(self) -> Result<()> {
        tracing::info!("Running command: {:#?}", self.subcommand);
        match self.subcommand {
            ReghostsCmd::Ping(ping) => ping.execute().await,
            ReghostsCmd::Resolve(resolve) => resolve.execute().await,
        }
    }
}

impl HostsConfigLayer for Reghosts {
    fn layer_config(&mut self, args: &ArgMatches, conf: &HostsConfig) -> Result<()> {
        if args.value_source("loglevel") != Some(ValueSource::CommandLine) {
            if let Ok(loglevel) = conf.get_string("loglevel") {
                self.loglevel = loglevel;
            }
        }
        match (&mut self.subcommand, args.subcommand()) {
            (ReghostsCmd::Ping(ping), Some((_, matches))) => ping.layer_config(matches, conf),
            (ReghostsCmd::Resolve(resolve), Some((_, matches))) => {
                resolve.layer_config(matches, conf)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Result<(Reghosts, ArgMatches)> {
        let matches = Reghosts::command()
            .try_get_matches_from(args)
            .into_diagnostic()?;
        let reghosts = Reghosts::from_arg_matches(&matches).into_diagnostic()?;
        Ok((reghosts, matches))
    }

    #[test]
    fn invalid_loglevel_is_reported() -> Result<()> {
        let (reghosts, _) = parse(&[
            "reghosts",
            "--loglevel",
            "reghosts=loud",
            "resolve",
            "docker.io",
        ])?;
        assert!(reghosts.log_filter().is_err());
        let (reghosts, _) = parse(&["reghosts", "--quiet", "resolve", "docker.io"])?;
        assert!(reghosts.log_filter().is_ok());
        Ok(())
    }

    #[test]
    fn loglevel_comes_from_config_unless_given() -> Result<()> {
        let dir = tempdir().into_diagnostic()?;
        let file = dir.path().join("reghosts.toml");
        fs::write(&file, "loglevel = \"debug\"\n").into_diagnostic()?;
        let file = file.display().to_string();

        let (mut reghosts, matches) = parse(&["reghosts", "--config", &file, "resolve", "x"])?;
        let config = reghosts.config_options().env(false).load()?;
        reghosts.layer_config(&matches, &config)?;
        assert_eq!(reghosts.loglevel, "debug");

        let (mut reghosts, matches) = parse(&[
            "reghosts",
            "--config",
            &file,
            "--loglevel",
            "error",
            "resolve",
            "x",
        ])?;
        let config = reghosts.config_options().env(false).load()?;
        reghosts.layer_config(&matches, &config)?;
        assert_eq!(reghosts.loglevel, "error");
        Ok(())
    }
}
