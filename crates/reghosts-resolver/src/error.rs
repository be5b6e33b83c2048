use miette::Diagnostic;
use thiserror::Error;

/// Failure assembling the trust material or HTTP client for a single host.
#[derive(Debug, Error, Diagnostic)]
pub enum TlsConfigError {
    /// One of the configured client key pairs could not be loaded. Unlike
    /// certificate authorities, bad key pairs are never skipped.
    #[error("Failed to load client key pair #{index} (certificate {certificate})")]
    #[diagnostic(
        code(reghosts::tls::invalid_key_pair),
        url(docsrs),
        help("Check that the certificate and key are PEM encoded and that the key belongs to the certificate.")
    )]
    InvalidKeyPair {
        index: usize,
        certificate: String,
        #[source]
        source: KeyPairError,
    },

    /// rustls refused to build a client configuration.
    #[error(transparent)]
    #[diagnostic(code(reghosts::tls::config), url(docsrs))]
    Rustls(#[from] rustls::Error),

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    #[diagnostic(code(reghosts::transport::client_build), url(docsrs))]
    ClientBuild(#[source] reqwest::Error),
}

/// Why a particular key pair was rejected.
#[derive(Debug, Error)]
pub enum KeyPairError {
    #[error("failed to read PEM data: {0}")]
    Pem(#[from] std::io::Error),

    #[error("no certificate found")]
    MissingCertificate,

    #[error("no private key found")]
    MissingPrivateKey,

    #[error(transparent)]
    Tls(#[from] rustls::Error),
}

/// Error type returned by host resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolverError {
    /// The trust configuration for `host` is unusable. Resolution for the
    /// requested repository is aborted as a whole.
    #[error("Invalid TLS configuration for registry host `{host}`")]
    #[diagnostic(code(reghosts::resolve::tls_config), url(docsrs))]
    TlsConfig {
        host: String,
        #[source]
        source: TlsConfigError,
    },
}

impl ResolverError {
    pub(crate) fn tls_config(host: impl Into<String>) -> impl FnOnce(TlsConfigError) -> Self {
        let host = host.into();
        move |source| ResolverError::TlsConfig { host, source }
    }
}
