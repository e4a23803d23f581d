//! Test-only fakes shared across unit tests: an in-memory peer built on
//! `tokio::io::duplex` so connector tests never touch the network, plus
//! `Resolver` test doubles that record every call they receive.

#![cfg(test)]

use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::ResolveError;
use crate::resolver::{Family, Resolver};

/// Wraps any `AsyncRead + AsyncWrite` stream, counting how many times
/// `poll_shutdown` (i.e. `close()`) is invoked. Used to assert close-on-error
/// behavior without relying on a real socket's observable state.
pub struct CountingStream<S> {
    inner: S,
    pub close_count: Arc<AtomicUsize>,
}

impl<S> CountingStream<S> {
    pub fn new(inner: S) -> (CountingStream<S>, Arc<AtomicUsize>) {
        let close_count = Arc::new(AtomicUsize::new(0));
        (
            CountingStream {
                inner,
                close_count: close_count.clone(),
            },
            close_count,
        )
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CountingStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CountingStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// A fresh duplex pair: `(client, server)`. The connector under test
/// drives `client`; a `tokio::spawn`ed task plays the scripted proxy
/// server against `server`.
pub fn duplex_pair() -> (tokio::io::DuplexStream, tokio::io::DuplexStream) {
    tokio::io::duplex(4096)
}

/// Reads `n` bytes from `stream` and asserts they equal `expected`, then
/// writes `reply` back. Used to script a one-shot fake proxy peer.
pub async fn expect_then_reply(
    stream: &mut tokio::io::DuplexStream,
    expected: &[u8],
    reply: &[u8],
) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, expected);
    stream.write_all(reply).await.unwrap();
}

/// Resolver double that always returns the given IP, counting calls.
pub struct FakeResolver {
    pub ip: IpAddr,
    pub calls: Arc<AtomicUsize>,
}

impl FakeResolver {
    pub fn new(ip: IpAddr) -> FakeResolver {
        FakeResolver {
            ip,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, _host: &str, family: Family) -> Result<(Family, IpAddr), ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let resolved_family = if self.ip.is_ipv4() { Family::V4 } else { Family::V6 };
        match family {
            Family::Unspec => Ok((resolved_family, self.ip)),
            wanted if wanted == resolved_family => Ok((resolved_family, self.ip)),
            _ => Err(ResolveError {
                host: _host.to_owned(),
                source: None,
            }),
        }
    }
}

/// Resolver double that must never be called; panics if it is. Used to
/// assert that `rdns=true` never triggers a resolve.
pub struct PanicResolver;

#[async_trait]
impl Resolver for PanicResolver {
    async fn resolve(&self, host: &str, _family: Family) -> Result<(Family, IpAddr), ResolveError> {
        panic!("resolver must not be called for rdns=true (host: {})", host);
    }
}
