use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::ResolveError;

/// Address family hint passed to a [`Resolver`]. `Unspec` accepts the
/// first address of either family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
    Unspec,
}

/// The host-resolution collaborator the core depends on. The core never
/// performs local name resolution itself outside of this trait — it is
/// called only for `rdns=false` cases (see
/// [`crate::proxy::ProxySpec::rdns`]).
///
/// Implementations must be reentrant: a single resolver instance is shared
/// across concurrent `connect` calls.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, family: Family) -> Result<(Family, IpAddr), ResolveError>;
}

/// Default resolver built on `tokio::net::lookup_host`, the runtime-native
/// getaddrinfo wrapper. Callers needing a different DNS implementation
/// (e.g. trust-dns, or a remote-DNS shim) can supply their own via the
/// same trait.
pub struct TokioResolver;

#[async_trait]
impl Resolver for TokioResolver {
    async fn resolve(&self, host: &str, family: Family) -> Result<(Family, IpAddr), ResolveError> {
        let lookup = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| ResolveError {
                host: host.to_owned(),
                source: Some(e),
            })?;

        for addr in lookup {
            let ip = addr.ip();
            let matches = match family {
                Family::Unspec => true,
                Family::V4 => ip.is_ipv4(),
                Family::V6 => ip.is_ipv6(),
            };
            if matches {
                let resolved_family = if ip.is_ipv4() { Family::V4 } else { Family::V6 };
                return Ok((resolved_family, ip));
            }
        }

        Err(ResolveError {
            host: host.to_owned(),
            source: None,
        })
    }
}
