use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

/// Opens the base TCP connection to a proxy hop. Kept as a free function
/// (rather than baked into the engine) so tests can substitute it.
pub async fn connect_tcp(host: &str, port: u16) -> io::Result<TcpStream> {
    TcpStream::connect((host, port)).await
}

/// Marker for anything the core can treat as a full-duplex byte stream.
/// Blanket-implemented for every type that already satisfies the bounds —
/// callers never implement this directly.
pub trait DynStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> DynStream for T {}

/// A type-erased byte stream: either plain TCP or a TLS layer stacked over
/// a previous `AnyStream`. Codecs and connectors are generic over any
/// `AsyncRead + AsyncWrite`, but the engine needs a single concrete type it
/// can conditionally wrap with TLS once or twice (proxy hop, then
/// destination), so it boxes here.
pub struct AnyStream(Pin<Box<dyn DynStream>>);

impl AnyStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        AnyStream(Box::pin(stream))
    }
}

impl AsyncRead for AnyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.0.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for AnyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.0.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.0.as_mut().poll_shutdown(cx)
    }
}

/// Extension methods giving any stream the capability set the core
/// depends on: `write_all` / `read` / `read_exact` / `close` /
/// `start_tls`. Blanket-implemented so no per-protocol client module needs
/// to re-derive it.
#[async_trait::async_trait]
pub trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send {
    async fn write_all_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(self, buf).await
    }

    /// Up to `max` bytes. May return fewer, including zero on EOF.
    async fn read_some(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = AsyncReadExt::read(self, &mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn read_exact_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        AsyncReadExt::read_exact(self, &mut buf).await?;
        Ok(buf)
    }

    async fn close(&mut self) -> io::Result<()> {
        AsyncWriteExt::shutdown(self).await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized> ProxyStream for T {}

/// Two handles onto the same underlying stream, sharing it through a
/// mutex rather than splitting it into independent read/write halves.
/// `tokio_rustls::TlsConnector::connect` takes its IO by value and gives
/// no way to recover it if the handshake fails, so `start_tls` hands one
/// handle to the connector and keeps the other to explicitly close the
/// connection if that happens.
pub(crate) struct Shared<S>(Arc<Mutex<S>>);

impl<S> Shared<S> {
    pub(crate) fn split(stream: S) -> (Shared<S>, Shared<S>) {
        let inner = Arc::new(Mutex::new(stream));
        (Shared(inner.clone()), Shared(inner))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Shared<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        Pin::new(&mut *guard).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Shared<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        Pin::new(&mut *guard).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        Pin::new(&mut *guard).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        Pin::new(&mut *guard).poll_shutdown(cx)
    }
}

/// Layers a TLS client connection over `stream`, returning a new boxed
/// stream. The original stream is conceptually consumed — there is no way
/// back to the plaintext layer once this returns.
///
/// On any failure (an invalid hostname, or the handshake itself), the
/// underlying stream is explicitly closed before the error is returned,
/// satisfying the "stream is closed on any failure" invariant even though
/// `tokio_rustls::TlsConnector::connect` consumes its IO by value and
/// never hands it back once the handshake has failed.
pub async fn start_tls<S>(
    stream: S,
    hostname: &str,
    config: Arc<rustls::ClientConfig>,
) -> io::Result<AnyStream>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let server_name = match rustls::pki_types::ServerName::try_from(hostname.to_owned()) {
        Ok(name) => name,
        Err(e) => {
            let mut stream = stream;
            let _ = stream.shutdown().await;
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e));
        }
    };

    let (handshake_io, closer) = Shared::split(stream);
    let connector = tokio_rustls::TlsConnector::from(config);

    match connector.connect(server_name, handshake_io).await {
        Ok(tls_stream) => Ok(AnyStream::new(tls_stream)),
        Err(e) => {
            let mut closer = closer;
            let _ = closer.shutdown().await;
            Err(e)
        }
    }
}

/// Default `rustls::ClientConfig` trusting the Mozilla root store shipped
/// via `webpki-roots`.
pub fn default_tls_config() -> Arc<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Arc::new(config)
}
