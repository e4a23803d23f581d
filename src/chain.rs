//! Sequential multi-hop proxy chaining: `P0 → P1 → … → Pk → dest`, each
//! hop tunneled through the previous hop's stream.
//!
//! The in-progress stream is threaded through a local loop rather than
//! mutated onto a shared `Proxy` value, so a `Proxy` stays reusable across
//! chains.

use std::sync::Arc;
use std::time::Duration;

use crate::error::TunnelError;
use crate::proxy::Proxy;
use crate::stream::AnyStream;

pub struct ProxyChain {
    proxies: Vec<Proxy>,
}

impl ProxyChain {
    pub fn new(proxies: Vec<Proxy>) -> ProxyChain {
        ProxyChain { proxies }
    }

    /// Connects through every hop in order, then to `(dest_host,
    /// dest_port)` through the last hop. `timeout` bounds the entire
    /// chain under one deadline, not each hop individually.
    pub async fn connect(
        &self,
        dest_host: &str,
        dest_port: u16,
        dest_tls: Option<Arc<rustls::ClientConfig>>,
        timeout: Option<Duration>,
    ) -> Result<AnyStream, TunnelError> {
        let timeout = timeout.unwrap_or(crate::proxy::DEFAULT_TIMEOUT);
        match tokio::time::timeout(timeout, self.connect_chain(dest_host, dest_port, dest_tls)).await {
            Ok(result) => result,
            Err(_) => Err(TunnelError::Timeout(timeout)),
        }
    }

    async fn connect_chain(
        &self,
        dest_host: &str,
        dest_port: u16,
        dest_tls: Option<Arc<rustls::ClientConfig>>,
    ) -> Result<AnyStream, TunnelError> {
        assert!(
            !self.proxies.is_empty(),
            "ProxyChain requires at least one proxy"
        );

        let last = self.proxies.len() - 1;
        let mut stream: Option<AnyStream> = None;

        for (i, proxy) in self.proxies.iter().enumerate() {
            if i == last {
                break;
            }
            let next = &self.proxies[i + 1];
            stream = Some(
                proxy
                    .connect_inner(next.proxy_host(), next.proxy_port(), None, stream)
                    .await?,
            );
        }

        self.proxies[last]
            .connect_inner(dest_host, dest_port, dest_tls, stream)
            .await
    }
}
