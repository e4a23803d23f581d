//! SOCKS4 (and the 4a domain-name extension) wire codec. Pure: no I/O.
//!
//! Encodes the version/command/port/address/ident request buffer and
//! decodes the 8-byte reply, including the 4a pseudo-address convention
//! (`DST_IP` set to an invalid `0.0.0.x` address, hostname appended after
//! `USERID`) and the reply status table.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};

use crate::error::ReplyError;

#[repr(u8)]
pub enum Command {
    TcpConnectionEstablishment = 0x01,
}

/// The destination address as it will be placed on the wire. `Name`
/// triggers the 4a extension: `DST_IP` becomes the invalid address
/// `0.0.0.x` (`x != 0`) and the hostname follows the ident, NUL-terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Ip(Ipv4Addr),
    Name(String),
}

impl Destination {
    pub fn from_host(host: &str) -> Destination {
        match host.parse::<Ipv4Addr>() {
            Ok(ip) => Destination::Ip(ip),
            Err(_) => Destination::Name(host.to_owned()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub dest: Destination,
    pub port: u16,
    pub user_id: String,
}

impl ConnectRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + self.user_id.len() + 8);
        buf.push(0x04);
        buf.push(Command::TcpConnectionEstablishment as u8);

        let mut port_buf = [0u8; 2];
        BigEndian::write_u16(&mut port_buf, self.port);
        buf.extend_from_slice(&port_buf);

        match &self.dest {
            Destination::Ip(ip) => {
                buf.extend_from_slice(&ip.octets());
                buf.extend_from_slice(self.user_id.as_bytes());
                buf.push(0x00);
            }
            Destination::Name(name) => {
                // 0.0.0.x, x != 0 — signals a 4a request to the server.
                buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
                buf.extend_from_slice(self.user_id.as_bytes());
                buf.push(0x00);
                buf.extend_from_slice(name.as_bytes());
                buf.push(0x00);
            }
        }

        buf
    }
}

#[derive(Debug, Clone)]
pub struct ConnectReply {
    pub status: u8,
}

impl ConnectReply {
    pub const SIZE: usize = 8;

    pub fn decode(data: &[u8]) -> Result<ConnectReply, ReplyError> {
        if data.len() != Self::SIZE {
            return Err(ReplyError::new(format!(
                "invalid SOCKS4 reply length: {} (expected {})",
                data.len(),
                Self::SIZE
            )));
        }
        if data[0] != 0x00 {
            return Err(ReplyError::new(format!(
                "invalid SOCKS4 reply: first byte {:#04x} (expected 0x00)",
                data[0]
            )));
        }

        let status = data[1];
        match status {
            0x5a => Ok(ConnectReply { status }),
            0x5b => Err(ReplyError::with_code(
                "request rejected or failed",
                status as i64,
            )),
            0x5c => Err(ReplyError::with_code(
                "request rejected: client is not reachable (identd)",
                status as i64,
            )),
            0x5d => Err(ReplyError::with_code(
                "request rejected: user_id does not match identd response",
                status as i64,
            )),
            other => Err(ReplyError::with_code(
                format!("unexpected SOCKS4 status: {:#04x}", other),
                other as i64,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_4a_request_for_domain() {
        let req = ConnectRequest {
            dest: Destination::from_host("example.com"),
            port: 80,
            user_id: String::new(),
        };
        let encoded = req.encode();
        let expected = [
            0x04, 0x01, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, b'e', b'x', b'a', b'm', b'p',
            b'l', b'e', b'.', b'c', b'o', b'm', 0x00,
        ];
        assert_eq!(encoded, expected);
    }

    #[test]
    fn encodes_plain_request_for_ipv4() {
        let req = ConnectRequest {
            dest: Destination::from_host("1.2.3.4"),
            port: 80,
            user_id: String::new(),
        };
        assert_eq!(
            req.encode(),
            vec![0x04, 0x01, 0x00, 0x50, 1, 2, 3, 4, 0x00]
        );
    }

    #[test]
    fn reply_length_must_be_exactly_8() {
        let err = ConnectReply::decode(&[0x00, 0x5a, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(err.message.contains("invalid SOCKS4 reply length"));
    }

    #[test]
    fn reply_maps_status_codes() {
        let granted = ConnectReply::decode(&[0x00, 0x5a, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(granted.status, 0x5a);

        let denied = ConnectReply::decode(&[0x00, 0x5b, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(denied.error_code, Some(0x5b));
    }
}
