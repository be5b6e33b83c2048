/// Per-host registry settings, as supplied by the operator.
///
/// One of these exists for every configured hostname. They are built once
/// when configuration is loaded and never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Hosts tried, in order, before the origin registry. Only ever used
    /// for pulling and resolving.
    pub mirrors: Vec<String>,
    /// `None` means "decide automatically", which turns plain HTTP on for
    /// localhost-like addresses.
    pub plain_http: Option<bool>,
    /// When `Some(true)`, a variant with certificate verification disabled
    /// is produced.
    pub insecure: Option<bool>,
    /// PEM encoded certificate authorities added on top of the platform
    /// trust store.
    pub root_cas: Vec<Vec<u8>>,
    /// Client certificates for mutual TLS.
    pub key_pairs: Vec<TlsKeyPair>,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mirror(mut self, host: impl Into<String>) -> Self {
        self.mirrors.push(host.into());
        self
    }

    pub fn plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = Some(plain_http);
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = Some(insecure);
        self
    }

    pub fn root_ca(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_cas.push(pem.into());
        self
    }

    pub fn key_pair(mut self, pair: TlsKeyPair) -> Self {
        self.key_pairs.push(pair);
        self
    }
}

/// A PEM certificate (chain) and the PEM private key that goes with it.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsKeyPair {
    pub certificate: Vec<u8>,
    pub key: Vec<u8>,
}

impl TlsKeyPair {
    pub fn new(certificate: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            certificate: certificate.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Debug for TlsKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsKeyPair")
            .field("certificate", &crate::tls::summarize_pem(&self.certificate))
            .field("key", &"***")
            .finish()
    }
}
