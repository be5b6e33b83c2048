use std::net::IpAddr;

use crate::endpoint::{EndpointTemplate, ResolvedEndpoint, Scheme};
use crate::error::ResolverError;
use crate::tls::TrustContext;
use crate::transport::{client_with_trust, new_client};
use crate::RegistryConfig;

/// Whether `host` (optionally with a port) names the local machine:
/// `localhost` or any loopback address.
pub fn is_localhost(host: &str) -> bool {
    let host = strip_port(host);
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

fn strip_port(host: &str) -> &str {
    if let Some(bracketed) = host.strip_prefix('[') {
        // [::1]:5000
        return bracketed.split(']').next().unwrap_or(bracketed);
    }
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    }
}

/// Expands one candidate host into the endpoint variants to try, in order:
///
/// 1. plain HTTP, when `plain_http` is set, or left unset and the host is
///    localhost-like;
/// 2. HTTPS without certificate verification, when `insecure` is set;
/// 3. verified HTTPS, only when neither of the above applied.
///
/// The first two are independent of each other and can both be emitted.
/// The result is never empty.
pub fn expand(
    host: &str,
    config: &RegistryConfig,
    template: &EndpointTemplate,
) -> Result<Vec<ResolvedEndpoint>, ResolverError> {
    let trust = TrustContext::build(&config.root_cas, &config.key_pairs)
        .map_err(ResolverError::tls_config(host))?;

    let plain_http = config.plain_http.unwrap_or_else(|| is_localhost(host));

    // Each variant gets exactly one client, built only once the variant is
    // known to be emitted.
    let mut variants = Vec::new();
    if plain_http {
        let client = new_client().map_err(ResolverError::tls_config(host))?;
        variants.push(template.endpoint(Scheme::Http, false, client));
    }
    if config.insecure == Some(true) {
        let client =
            client_with_trust(&trust.insecure()).map_err(ResolverError::tls_config(host))?;
        variants.push(template.endpoint(Scheme::Https, true, client));
    }
    if variants.is_empty() {
        let client = client_with_trust(&trust).map_err(ResolverError::tls_config(host))?;
        variants.push(template.endpoint(Scheme::Https, false, client));
    }

    tracing::trace!(
        host,
        variants = %variants.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "),
        "Expanded registry host"
    );
    Ok(variants)
}
