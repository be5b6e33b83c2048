use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HostsConfigError {
    #[error(transparent)]
    #[diagnostic(code(reghosts::config::error))]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    #[diagnostic(code(reghosts::config::parse))]
    ConfigParseError(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// A certificate authority or key pair file named in the configuration
    /// could not be read.
    #[error("Failed to read {kind} file `{}` for registry `{host}`", path.display())]
    #[diagnostic(
        code(reghosts::config::tls_file),
        help("Paths are resolved relative to the current working directory.")
    )]
    TlsFileError {
        host: String,
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
