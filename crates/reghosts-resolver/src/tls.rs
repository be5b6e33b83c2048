//! Trust contexts: which certificate authorities to believe, which client
//! certificates to present, and whether to verify the server at all.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::ResolvesClientCert;
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::sign::CertifiedKey;
use rustls::{
    ClientConfig, DigitallySignedStruct, InconsistentKeys, RootCertStore, SignatureScheme,
};

use crate::error::{KeyPairError, TlsConfigError};
use crate::TlsKeyPair;

static PROVIDER: Lazy<Arc<CryptoProvider>> = Lazy::new(|| Arc::new(ring::default_provider()));

// Loaded once and never mutated. Contexts that add their own CAs work on a
// copy.
static PLATFORM_ROOTS: Lazy<Arc<RootCertStore>> = Lazy::new(|| Arc::new(load_platform_roots()));

fn load_platform_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::warn!(%err, "Error loading platform CA certificates, continuing without them");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded platform CA certificates");
    roots
}

/// Immutable TLS trust configuration for one registry host.
///
/// Cloning is cheap: the root store is shared, and so are the parsed key
/// pairs.
#[derive(Clone, Debug)]
pub struct TrustContext {
    roots: Arc<RootCertStore>,
    key_pairs: Vec<Arc<CertifiedKey>>,
    skip_verify: bool,
}

impl Default for TrustContext {
    fn default() -> Self {
        Self::platform()
    }
}

impl TrustContext {
    /// The platform trust store, no client certificates, verification on.
    pub fn platform() -> Self {
        Self {
            roots: PLATFORM_ROOTS.clone(),
            key_pairs: Vec::new(),
            skip_verify: false,
        }
    }

    /// Builds a trust context from raw PEM material.
    ///
    /// Every certificate block in `root_cas` is appended to the platform
    /// store. Blocks that fail to parse are dropped with a warning; a CA
    /// that never made it into the pool shows up later as an ordinary
    /// handshake failure. Key pairs are strict: the first one that cannot be
    /// loaded fails the whole context.
    pub fn build(root_cas: &[Vec<u8>], key_pairs: &[TlsKeyPair]) -> Result<Self, TlsConfigError> {
        let roots = if root_cas.is_empty() {
            PLATFORM_ROOTS.clone()
        } else {
            let mut roots = RootCertStore::clone(&PLATFORM_ROOTS);
            for pem in root_cas {
                append_pem(&mut roots, pem);
            }
            Arc::new(roots)
        };
        let key_pairs = key_pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| load_key_pair(index, pair))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            roots,
            key_pairs,
            skip_verify: false,
        })
    }

    /// Returns a copy of this context with server certificate verification
    /// turned off. `self` is left untouched.
    pub fn insecure(&self) -> Self {
        Self {
            skip_verify: true,
            ..self.clone()
        }
    }

    pub fn skips_verification(&self) -> bool {
        self.skip_verify
    }

    pub fn roots(&self) -> &RootCertStore {
        &self.roots
    }

    pub fn key_pairs(&self) -> &[Arc<CertifiedKey>] {
        &self.key_pairs
    }

    /// Renders this context as a rustls client configuration. Only
    /// `http/1.1` is offered over ALPN.
    pub fn client_config(&self) -> Result<ClientConfig, TlsConfigError> {
        let builder =
            ClientConfig::builder_with_provider(PROVIDER.clone()).with_safe_default_protocol_versions()?;
        let builder = if self.skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(PROVIDER.clone())))
        } else {
            builder.with_root_certificates(self.roots.clone())
        };
        let mut config = if self.key_pairs.is_empty() {
            builder.with_no_client_auth()
        } else {
            builder.with_client_cert_resolver(Arc::new(KeyPairResolver(self.key_pairs.clone())))
        };
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(config)
    }
}

fn append_pem(roots: &mut RootCertStore, pem: &[u8]) {
    let mut reader = pem;
    let certs = rustls_pemfile::certs(&mut reader).filter_map(|cert| match cert {
        Ok(cert) => Some(cert),
        Err(err) => {
            tracing::warn!(%err, "Skipping malformed CA certificate block");
            None
        }
    });
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 || added == 0 {
        tracing::warn!(
            added,
            ignored,
            ca = %summarize_pem(pem),
            "Some configured CA certificates could not be added to the trust pool"
        );
    }
}

fn load_key_pair(index: usize, pair: &TlsKeyPair) -> Result<Arc<CertifiedKey>, TlsConfigError> {
    parse_key_pair(pair).map_err(|source| TlsConfigError::InvalidKeyPair {
        index,
        certificate: summarize_pem(&pair.certificate),
        source,
    })
}

fn parse_key_pair(pair: &TlsKeyPair) -> Result<Arc<CertifiedKey>, KeyPairError> {
    let chain = rustls_pemfile::certs(&mut &pair.certificate[..])
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()?;
    if chain.is_empty() {
        return Err(KeyPairError::MissingCertificate);
    }
    let key = rustls_pemfile::private_key(&mut &pair.key[..])?
        .ok_or(KeyPairError::MissingPrivateKey)?;
    let key = PROVIDER.key_provider.load_private_key(key)?;
    let certified = CertifiedKey::new(chain, key);
    match certified.keys_match() {
        // Some key types can't report their public half. Nothing to compare.
        Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => {
            Ok(Arc::new(certified))
        }
        Err(err) => Err(err.into()),
    }
}

/// Short, log-friendly rendering of a PEM blob: the head and tail of its
/// base64 body.
pub(crate) fn summarize_pem(pem: &[u8]) -> String {
    let body = String::from_utf8_lossy(pem)
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.trim().chars().collect::<Vec<_>>())
        .collect::<Vec<char>>();
    if body.is_empty() {
        "<empty>".into()
    } else if body.len() <= 48 {
        body.into_iter().collect()
    } else {
        let head = body[..24].iter().collect::<String>();
        let tail = body[body.len() - 24..].iter().collect::<String>();
        format!("{head}...{tail}")
    }
}

/// Presents the first configured key pair that can sign with one of the
/// schemes the server offered.
#[derive(Debug)]
struct KeyPairResolver(Vec<Arc<CertifiedKey>>);

impl ResolvesClientCert for KeyPairResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.0
            .iter()
            .find(|pair| pair.key.choose_scheme(sigschemes).is_some())
            .cloned()
    }

    fn has_certs(&self) -> bool {
        !self.0.is_empty()
    }
}

/// Accepts any server certificate. Handshake signatures are still checked.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
