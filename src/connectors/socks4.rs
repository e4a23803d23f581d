//! Drives the SOCKS4(+4a) codec against a stream.
//!
//! Resolves the destination locally only when `rdns` is false and the
//! host is not already an IP literal; otherwise sends the literal
//! hostname using the 4a extension.

use crate::error::{ConnectorError, ReplyError};
use crate::proto::socks4::{ConnectReply, ConnectRequest, Destination};
use crate::resolver::{Family, Resolver};
use crate::stream::ProxyStream;

pub async fn connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    user_id: &str,
    rdns: bool,
    resolver: &(dyn Resolver + Send + Sync),
) -> Result<ConnectReply, ConnectorError>
where
    S: ProxyStream + Unpin + Send,
{
    let dest = if !crate::helpers::is_ip_literal(host) && !rdns {
        let (_, ip) = resolver
            .resolve(host, Family::V4)
            .await
            .map_err(|e| ReplyError::new(format!("could not resolve {}: {}", host, e)))?;
        match ip {
            std::net::IpAddr::V4(v4) => Destination::Ip(v4),
            std::net::IpAddr::V6(_) => {
                return Err(ReplyError::new(format!(
                    "resolver returned an IPv6 address for {} under a SOCKS4 (IPv4-only) request",
                    host
                ))
                .into())
            }
        }
    } else {
        Destination::from_host(host)
    };

    let request = ConnectRequest {
        dest,
        port,
        user_id: user_id.to_owned(),
    };

    stream.write_all_bytes(&request.encode()).await?;

    let data = stream.read_exact_bytes(ConnectReply::SIZE).await?;
    Ok(ConnectReply::decode(&data)?)
}
