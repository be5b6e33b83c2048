use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReghostsError {
    /// None of the endpoints resolved for a registry answered a `GET /v2/`.
    /// Any HTTP response counts as an answer, so this means every
    /// connection or TLS handshake failed.
    #[error("No endpoint for `{host}` answered. Tried: {}", attempts.join(", "))]
    #[diagnostic(
        code(reghosts::ping::unreachable),
        url(docsrs),
        help("Check that the registry (or its mirrors) is reachable from this machine, and that its certificate is trusted. `reghosts resolve` lists the endpoints in the order they were tried.")
    )]
    Unreachable { host: String, attempts: Vec<String> },
}
