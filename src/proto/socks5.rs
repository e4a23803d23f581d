//! SOCKS5 (RFC 1928) + username/password auth (RFC 1929) wire codec. Pure:
//! no I/O.
//!
//! Covers method negotiation (including offering username/password auth,
//! not just "no auth"), the RFC 1929 sub-negotiation exchange, the
//! `Address` tagged union (IPv4 / IPv6 / domain) on the wire, and the
//! reply status table.

use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ByteOrder};

use crate::error::ReplyError;

pub const VERSION: u8 = 0x05;

#[repr(u8)]
pub enum Command {
    Connect = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth = 0x00,
    UsernamePassword = 0x02,
    NoAcceptable = 0xff,
}

impl AuthMethod {
    pub fn from_byte(b: u8) -> Option<AuthMethod> {
        match b {
            0x00 => Some(AuthMethod::NoAuth),
            0x02 => Some(AuthMethod::UsernamePassword),
            0xff => Some(AuthMethod::NoAcceptable),
            _ => None,
        }
    }
}

/// Destination address as it will be placed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Domain(String),
}

impl Address {
    pub fn from_host(host: &str) -> Address {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            Address::V4(ip)
        } else if let Ok(ip) = host.parse::<Ipv6Addr>() {
            Address::V6(ip)
        } else {
            Address::Domain(host.to_owned())
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ReplyError> {
        match self {
            Address::V4(ip) => {
                buf.push(0x01);
                buf.extend_from_slice(&ip.octets());
            }
            Address::V6(ip) => {
                buf.push(0x04);
                buf.extend_from_slice(&ip.octets());
            }
            Address::Domain(name) => {
                if name.is_empty() || name.len() > 255 {
                    return Err(ReplyError::new(format!(
                        "domain name length out of range: {}",
                        name.len()
                    )));
                }
                buf.push(0x03);
                buf.push(name.len() as u8);
                buf.extend_from_slice(name.as_bytes());
            }
        }
        Ok(())
    }
}

/// `[0x05, NMETHODS, METHODS...]`
pub struct MethodsRequest {
    pub offer_username_password: bool,
}

impl MethodsRequest {
    pub fn encode(&self) -> Vec<u8> {
        if self.offer_username_password {
            vec![VERSION, 2, AuthMethod::NoAuth as u8, AuthMethod::UsernamePassword as u8]
        } else {
            vec![VERSION, 1, AuthMethod::NoAuth as u8]
        }
    }
}

/// `[0x05, METHOD]`
pub struct MethodsReply {
    pub method: u8,
}

impl MethodsReply {
    pub const SIZE: usize = 2;

    pub fn decode(data: &[u8]) -> Result<MethodsReply, ReplyError> {
        if data.len() != Self::SIZE {
            return Err(ReplyError::new("invalid method negotiation reply length"));
        }
        if data[0] != VERSION {
            return Err(ReplyError::new(format!(
                "unexpected SOCKS version in method reply: {:#04x}",
                data[0]
            )));
        }
        if data[1] == AuthMethod::NoAcceptable as u8 {
            return Err(ReplyError::new("no acceptable authentication methods"));
        }
        Ok(MethodsReply { method: data[1] })
    }
}

/// `[0x01, ULEN, UNAME, PLEN, PASSWD]`
pub struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub fn encode(&self) -> Result<Vec<u8>, ReplyError> {
        if self.username.is_empty()
            || self.username.len() > 255
            || self.password.is_empty()
            || self.password.len() > 255
        {
            return Err(ReplyError::new(
                "username/password must be 1-255 bytes for SOCKS5 auth",
            ));
        }
        let mut buf = Vec::with_capacity(3 + self.username.len() + self.password.len());
        buf.push(0x01);
        buf.push(self.username.len() as u8);
        buf.extend_from_slice(self.username.as_bytes());
        buf.push(self.password.len() as u8);
        buf.extend_from_slice(self.password.as_bytes());
        Ok(buf)
    }
}

/// `[VER(0x01), STATUS]`
pub struct AuthReply {
    pub status: u8,
}

impl AuthReply {
    pub const SIZE: usize = 2;

    pub fn decode(data: &[u8]) -> Result<AuthReply, ReplyError> {
        if data.len() != Self::SIZE {
            return Err(ReplyError::new("invalid auth reply length"));
        }
        if data[1] != 0x00 {
            return Err(ReplyError::new("authentication failed"));
        }
        Ok(AuthReply { status: data[1] })
    }
}

/// `[0x05, 0x01, 0x00, ATYP, ADDR, PORT_BE]`
pub struct ConnectRequest {
    pub address: Address,
    pub port: u16,
}

impl ConnectRequest {
    pub fn encode(&self) -> Result<Vec<u8>, ReplyError> {
        let mut buf = vec![VERSION, Command::Connect as u8, 0x00];
        self.address.encode_into(&mut buf)?;
        let mut port_buf = [0u8; 2];
        BigEndian::write_u16(&mut port_buf, self.port);
        buf.extend_from_slice(&port_buf);
        Ok(buf)
    }

    /// Decodes back the `(host, port)` pair from an encoded connect
    /// request. Exists to exercise the round-trip property: for any valid
    /// domain `h` (1..=255 bytes) and port `p`,
    /// `decode(encode(Address::Domain(h), p)) == (h, p)`.
    pub fn decode(data: &[u8]) -> Result<(String, u16), ReplyError> {
        if data.len() < 4 || data[0] != VERSION {
            return Err(ReplyError::new("invalid connect request header"));
        }
        let atyp = data[3];
        let (host, rest) = match atyp {
            0x01 => {
                if data.len() < 4 + 4 + 2 {
                    return Err(ReplyError::new("truncated IPv4 connect request"));
                }
                let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
                (ip.to_string(), &data[8..])
            }
            0x04 => {
                if data.len() < 4 + 16 + 2 {
                    return Err(ReplyError::new("truncated IPv6 connect request"));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&data[4..20]);
                (Ipv6Addr::from(octets).to_string(), &data[20..])
            }
            0x03 => {
                if data.len() < 5 {
                    return Err(ReplyError::new("truncated domain connect request"));
                }
                let n = data[4] as usize;
                if data.len() < 5 + n + 2 {
                    return Err(ReplyError::new("truncated domain connect request"));
                }
                let name = std::str::from_utf8(&data[5..5 + n])
                    .map_err(|_| ReplyError::new("domain name is not valid UTF-8"))?
                    .to_owned();
                (name, &data[5 + n..])
            }
            other => {
                return Err(ReplyError::new(format!(
                    "Invalid address type: {:#04x}",
                    other
                )))
            }
        };
        let port = BigEndian::read_u16(&rest[..2]);
        Ok((host, port))
    }
}

/// The fixed 4-byte head `[VER, REP, RSV, ATYP]` of a connect reply. The
/// connector reads this first, then reads the ATYP-dependent tail before
/// handing the full frame to [`ConnectReply::decode`].
pub enum AddressType {
    V4,
    Domain,
    V6,
}

pub fn parse_address_type(byte: u8) -> Result<AddressType, ReplyError> {
    match byte {
        0x01 => Ok(AddressType::V4),
        0x03 => Ok(AddressType::Domain),
        0x04 => Ok(AddressType::V6),
        other => Err(ReplyError::new(format!(
            "Invalid address type: {:#04x}",
            other
        ))),
    }
}

pub struct ConnectReply {
    pub rep: u8,
}

impl ConnectReply {
    pub fn decode(data: &[u8]) -> Result<ConnectReply, ReplyError> {
        if data.len() < 4 {
            return Err(ReplyError::new("truncated SOCKS5 connect reply"));
        }
        if data[0] != VERSION {
            return Err(ReplyError::new(format!(
                "unexpected SOCKS version in connect reply: {:#04x}",
                data[0]
            )));
        }
        let rep = data[1];
        if rep != 0x00 {
            let message = match rep {
                0x01 => "general SOCKS server failure",
                0x02 => "connection not allowed by ruleset",
                0x03 => "network unreachable",
                0x04 => "host unreachable",
                0x05 => "connection refused",
                0x06 => "TTL expired",
                0x07 => "command not supported",
                0x08 => "address type not supported",
                _ => "unknown",
            };
            return Err(ReplyError::with_code(message, rep as i64));
        }
        Ok(ConnectReply { rep })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_request_offers_both_when_creds_present() {
        let req = MethodsRequest {
            offer_username_password: true,
        };
        assert_eq!(req.encode(), vec![0x05, 0x02, 0x00, 0x02]);
    }

    #[test]
    fn methods_request_offers_only_no_auth_without_creds() {
        let req = MethodsRequest {
            offer_username_password: false,
        };
        assert_eq!(req.encode(), vec![0x05, 0x01, 0x00]);
    }

    #[test]
    fn connect_request_encodes_ipv4() {
        let req = ConnectRequest {
            address: Address::from_host("1.2.3.4"),
            port: 80,
        };
        assert_eq!(
            req.encode().unwrap(),
            vec![0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x00, 0x50]
        );
    }

    #[test]
    fn connect_request_encodes_domain() {
        let req = ConnectRequest {
            address: Address::from_host("example.com"),
            port: 443,
        };
        let encoded = req.encode().unwrap();
        let mut expected = vec![0x05, 0x01, 0x00, 0x03, 0x0b];
        expected.extend_from_slice(b"example.com");
        expected.extend_from_slice(&[0x01, 0xbb]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn connect_request_round_trips_domain_addresses() {
        for host in ["a", "example.com", &"x".repeat(255)] {
            for port in [1u16, 80, 65535] {
                let req = ConnectRequest {
                    address: Address::from_host(host),
                    port,
                };
                let encoded = req.encode().unwrap();
                let (decoded_host, decoded_port) = ConnectRequest::decode(&encoded).unwrap();
                assert_eq!(decoded_host, host);
                assert_eq!(decoded_port, port);
            }
        }
    }

    #[test]
    fn connect_reply_rejects_unknown_address_type() {
        let err = parse_address_type(0x09).unwrap_err();
        assert!(err.message.contains("0x09"));
    }

    #[test]
    fn connect_reply_maps_failure_codes() {
        let err = ConnectReply::decode(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.error_code, Some(0x05));
        assert_eq!(err.message, "connection refused");
    }
}
