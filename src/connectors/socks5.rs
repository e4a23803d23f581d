//! Drives the SOCKS5 codec against a stream: method negotiation, optional
//! username/password sub-auth, then CONNECT.
//!
//! The connect reply is variable-length: read the fixed 4-byte head,
//! branch on ATYP, then read exactly the ATYP-dependent tail (4, 16, or
//! `1 + n + 2` bytes for IPv4, IPv6, and a length-prefixed domain).

use crate::error::{ConnectorError, ReplyError};
use crate::proto::socks5::{
    self, Address, AuthReply, AuthRequest, ConnectReply, ConnectRequest, MethodsReply,
    MethodsRequest,
};
use crate::resolver::{Family, Resolver};
use crate::stream::ProxyStream;

pub async fn connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    username: Option<&str>,
    password: Option<&str>,
    rdns: bool,
    resolver: &(dyn Resolver + Send + Sync),
) -> Result<ConnectReply, ConnectorError>
where
    S: ProxyStream + Unpin + Send,
{
    let offer_username_password = username.is_some() && password.is_some();

    let methods = MethodsRequest {
        offer_username_password,
    };
    stream.write_all_bytes(&methods.encode()).await?;

    let data = stream.read_exact_bytes(MethodsReply::SIZE).await?;
    let methods_reply = MethodsReply::decode(&data)?;

    if methods_reply.method == socks5::AuthMethod::UsernamePassword as u8 {
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) => (u, p),
            _ => {
                return Err(ReplyError::new(
                    "server chose username/password auth but no credentials were configured",
                )
                .into())
            }
        };

        let auth_request = AuthRequest { username, password };
        stream.write_all_bytes(&auth_request.encode()?).await?;

        let data = stream.read_exact_bytes(AuthReply::SIZE).await?;
        AuthReply::decode(&data)?;
    }

    let dest_host = if !crate::helpers::is_ip_literal(host) && !rdns {
        let (_, ip) = resolver
            .resolve(host, Family::Unspec)
            .await
            .map_err(|e| ReplyError::new(format!("could not resolve {}: {}", host, e)))?;
        ip.to_string()
    } else {
        host.to_owned()
    };

    let request = ConnectRequest {
        address: Address::from_host(&dest_host),
        port,
    };
    stream.write_all_bytes(&request.encode()?).await?;

    let head = stream.read_exact_bytes(4).await?;
    let atyp = socks5::parse_address_type(head[3])?;

    let mut full = head;
    match atyp {
        socks5::AddressType::V4 => full.extend(stream.read_exact_bytes(6).await?),
        socks5::AddressType::V6 => full.extend(stream.read_exact_bytes(18).await?),
        socks5::AddressType::Domain => {
            let len_byte = stream.read_exact_bytes(1).await?;
            let n = len_byte[0] as usize;
            full.extend_from_slice(&len_byte);
            full.extend(stream.read_exact_bytes(n + 2).await?);
        }
    }

    Ok(ConnectReply::decode(&full)?)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::test_support::{duplex_pair, FakeResolver, PanicResolver};

    /// CONNECT to an IPv4 literal with user/pass credentials.
    #[tokio::test]
    async fn connect_ipv4_with_user_pass_succeeds() {
        let (mut client, mut server) = duplex_pair();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            server.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [0x05, 0x02, 0x00, 0x02]);
            server.write_all(&[0x05, 0x02]).await.unwrap();

            let mut buf = [0u8; 5];
            server.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [0x01, 0x01, b'u', 0x01, b'p']);
            server.write_all(&[0x01, 0x00]).await.unwrap();

            let mut buf = [0u8; 10];
            server.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x00, 0x50]);
            server
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let resolver = PanicResolver;
        let reply = connect(
            &mut client,
            "1.2.3.4",
            80,
            Some("u"),
            Some("p"),
            true,
            &resolver,
        )
        .await
        .unwrap();
        assert_eq!(reply.rep, 0x00);
        server_task.await.unwrap();
    }

    /// CONNECT to a domain with `rdns=true`, no credentials — the
    /// resolver must never be consulted.
    #[tokio::test]
    async fn connect_domain_rdns_true_never_resolves() {
        let (mut client, mut server) = duplex_pair();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 3];
            server.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [0x05, 0x01, 0x00]);
            server.write_all(&[0x05, 0x00]).await.unwrap();

            let mut buf = [0u8; 18];
            server.read_exact(&mut buf).await.unwrap();
            let mut expected = vec![0x05, 0x01, 0x00, 0x03, 0x0b];
            expected.extend_from_slice(b"example.com");
            expected.extend_from_slice(&[0x01, 0xbb]);
            assert_eq!(buf.to_vec(), expected);
            server
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let resolver = PanicResolver;
        let reply = connect(&mut client, "example.com", 443, None, None, true, &resolver)
            .await
            .unwrap();
        assert_eq!(reply.rep, 0x00);
        server_task.await.unwrap();
    }

    /// rdns=false resolves locally exactly once before sending CONNECT.
    #[tokio::test]
    async fn rdns_false_resolves_exactly_once() {
        let (mut client, mut server) = duplex_pair();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 3];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&[0x05, 0x00]).await.unwrap();

            let mut buf = [0u8; 10];
            server.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf[3], 0x01, "resolved address must be sent as IPv4");
            server
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let resolver = FakeResolver::new(IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)));
        connect(
            &mut client,
            "example.com",
            80,
            None,
            None,
            false,
            &resolver,
        )
        .await
        .unwrap();
        assert_eq!(resolver.call_count(), 1);
        server_task.await.unwrap();
    }

    /// An unrecognized ATYP in the connect reply surfaces a `ReplyError`
    /// naming the offending byte.
    #[tokio::test]
    async fn unknown_atyp_is_a_reply_error() {
        let (mut client, mut server) = duplex_pair();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 3];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&[0x05, 0x00]).await.unwrap();

            let mut buf = [0u8; 10];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&[0x05, 0x00, 0x00, 0x09]).await.unwrap();
        });

        let resolver = PanicResolver;
        let err = connect(&mut client, "1.2.3.4", 80, None, None, true, &resolver)
            .await
            .unwrap_err();
        match err {
            ConnectorError::Reply(e) => assert!(e.message.contains("0x09")),
            other => panic!("expected ReplyError, got {:?}", other),
        }
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn no_acceptable_auth_method_fails_negotiation() {
        let (mut client, mut server) = duplex_pair();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 3];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&[0x05, 0xff]).await.unwrap();
        });

        let resolver = PanicResolver;
        let err = connect(&mut client, "1.2.3.4", 80, None, None, true, &resolver)
            .await
            .unwrap_err();
        match err {
            ConnectorError::Reply(e) => {
                assert!(e.message.contains("no acceptable authentication"))
            }
            other => panic!("expected ReplyError, got {:?}", other),
        }
        server_task.await.unwrap();
    }
}
