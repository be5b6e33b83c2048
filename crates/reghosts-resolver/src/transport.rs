use std::fmt::Debug;
use std::ops::Deref;
use std::time::{Duration, Instant};

use http::Extensions;
use reqwest::{Client, ClientBuilder, Request, Response};
use reqwest_middleware::{ClientWithMiddleware, Middleware, Next, Result};
use tracing::Instrument;

use crate::error::TlsConfigError;
use crate::tls::TrustContext;

/// Connection parameters shared by every registry client.
/// Registry traffic is HTTP/1.1 only unless `http2` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub tcp_keepalive: Duration,
    /// Upper bound on idle connections across all hosts. reqwest only caps
    /// idle connections per host, so this is advisory.
    pub max_idle_connections: usize,
    pub max_idle_connections_per_host: usize,
    pub idle_connection_timeout: Duration,
    /// Not enforced separately by reqwest; the handshake counts against
    /// `connect_timeout`.
    pub tls_handshake_timeout: Duration,
    /// reqwest never sends `Expect: 100-continue`, so this is unused.
    pub expect_continue_timeout: Duration,
    pub http2: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            tcp_keepalive: Duration::from_secs(60),
            max_idle_connections: 30,
            max_idle_connections_per_host: 4,
            idle_connection_timeout: Duration::from_secs(120),
            tls_handshake_timeout: Duration::from_secs(10),
            expect_continue_timeout: Duration::from_secs(5),
            http2: false,
        }
    }
}

impl TransportSettings {
    /// A reqwest builder with these settings applied. Proxies come from the
    /// environment (`HTTP_PROXY`, `HTTPS_PROXY`, `NO_PROXY`).
    pub fn builder(&self) -> ClientBuilder {
        let builder = Client::builder()
            .user_agent(concat!("reghosts/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(self.tcp_keepalive)
            .pool_max_idle_per_host(self.max_idle_connections_per_host)
            .pool_idle_timeout(self.idle_connection_timeout);
        if self.http2 {
            builder
        } else {
            builder.http1_only()
        }
    }
}

/// A fresh transport with the default settings, not yet bound to any trust
/// configuration.
pub fn new_transport() -> ClientBuilder {
    TransportSettings::default().builder()
}

/// A client on a fresh transport that trusts the platform store.
pub fn new_client() -> std::result::Result<RegistryClient, TlsConfigError> {
    client_with_trust(&TrustContext::platform())
}

/// A client on a fresh transport that uses `trust` for every TLS connection.
pub fn client_with_trust(
    trust: &TrustContext,
) -> std::result::Result<RegistryClient, TlsConfigError> {
    let client = new_transport()
        .use_preconfigured_tls(trust.client_config()?)
        .build()
        .map_err(TlsConfigError::ClientBuild)?;
    Ok(RegistryClient::new(client))
}

/// HTTP client handed out with every resolved endpoint.
///
/// Requests go through a tracing layer so registry calls show up in the
/// surrounding spans. Clones share the same connection pool.
#[derive(Clone)]
pub struct RegistryClient {
    inner: ClientWithMiddleware,
}

impl RegistryClient {
    pub fn new(client: Client) -> Self {
        Self {
            inner: reqwest_middleware::ClientBuilder::new(client)
                .with(TracingMiddleware)
                .build(),
        }
    }
}

impl Deref for RegistryClient {
    type Target = ClientWithMiddleware;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RegistryClient")
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TracingMiddleware;

#[async_trait::async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let span = tracing::debug_span!(
            "registry_request",
            method = %req.method(),
            url = %req.url(),
        );
        async move {
            let start = Instant::now();
            let res = next.run(req, extensions).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &res {
                Ok(response) => {
                    tracing::debug!(status = response.status().as_u16(), elapsed_ms, "registry response")
                }
                Err(err) => tracing::debug!(%err, elapsed_ms, "registry request failed"),
            }
            res
        }
        .instrument(span)
        .await
    }
}
