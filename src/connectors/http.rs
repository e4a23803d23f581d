//! Drives the HTTP CONNECT codec against a stream.
//!
//! Reads the response until the terminating `\r\n\r\n` (bounded to 8 KiB)
//! so that no header bytes are left sitting in the stream's buffer once
//! negotiation completes, rather than relying on a single best-effort
//! `read()` call.

use crate::error::{ConnectorError, ReplyError};
use crate::proto::http::{self, ConnectReply};
use crate::stream::ProxyStream;

const MAX_RESPONSE_BYTES: usize = 8 * 1024;

pub async fn connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<ConnectReply, ConnectorError>
where
    S: ProxyStream + Unpin + Send,
{
    let request = http::ConnectRequest {
        host,
        port,
        username,
        password,
        user_agent: http::default_user_agent(),
    };
    stream.write_all_bytes(&request.encode()).await?;

    let mut buf = Vec::new();
    loop {
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() >= MAX_RESPONSE_BYTES {
            return Err(ReplyError::new("proxy response exceeded the maximum size").into());
        }
        let chunk = stream.read_some(MAX_RESPONSE_BYTES - buf.len()).await?;
        if chunk.is_empty() {
            // EOF before the headers were fully received.
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(ConnectReply::decode(&buf)?)
}
