//! HTTP CONNECT tunneling wire codec. Pure: no I/O.
//!
//! Builds the `CONNECT host:port HTTP/1.1` request (with an optional
//! `Proxy-Authorization: Basic` header) and parses the status line of the
//! proxy's response.

use base64::Engine as _;

use crate::error::ReplyError;

const CRLF: &str = "\r\n";

pub fn default_user_agent() -> String {
    format!("proxy-tunnel/{}", env!("CARGO_PKG_VERSION"))
}

pub struct ConnectRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub user_agent: String,
}

impl<'a> ConnectRequest<'a> {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!(
            "CONNECT {host}:{port} HTTP/1.1{crlf}",
            host = self.host,
            port = self.port,
            crlf = CRLF
        ));
        out.push_str(&format!(
            "Host: {host}:{port}{crlf}",
            host = self.host,
            port = self.port,
            crlf = CRLF
        ));
        out.push_str(&format!("User-Agent: {}{}", self.user_agent, CRLF));

        if let (Some(user), Some(pass)) = (self.username, self.password) {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, pass));
            out.push_str(&format!("Proxy-Authorization: Basic {}{}", token, CRLF));
        }

        out.push_str(CRLF);
        out.into_bytes()
    }
}

pub struct ConnectReply {
    pub status_code: u32,
    pub message: String,
}

impl ConnectReply {
    /// `data` must contain at least the status line; trailing header bytes
    /// (if any) are ignored. The connector is responsible for reading up
    /// to the blank line that terminates the response before calling this
    /// (see [`crate::connectors::http`] doc comment) — this fixes the
    /// latent framing bug in the Python source, which parses whatever a
    /// single best-effort `read()` happened to return.
    pub fn decode(data: &[u8]) -> Result<ConnectReply, ReplyError> {
        if data.is_empty() {
            return Err(ReplyError::new("invalid proxy response"));
        }

        let line_bytes = data.split(|&b| b == b'\n').next().unwrap_or(data);
        let line_bytes = line_bytes
            .strip_suffix(b"\r")
            .unwrap_or(line_bytes);
        // Status lines are ASCII by construction; a lossy decode is the
        // closest Rust-native equivalent of Python's
        // `bytes.decode('utf-8', 'surrogateescape')` for tolerating stray
        // non-UTF-8 bytes in a misbehaving proxy's reason phrase.
        let line = String::from_utf8_lossy(line_bytes);

        let mut parts = line.split_whitespace();
        let _version = parts.next().ok_or_else(|| {
            ReplyError::new(format!("invalid status line: {}", line))
        })?;
        let code = parts
            .next()
            .ok_or_else(|| ReplyError::new(format!("invalid status line: {}", line)))?;
        let reason: Vec<&str> = parts.collect();

        let status_code: u32 = code
            .parse()
            .map_err(|_| ReplyError::new(format!("invalid status code: {}", code)))?;

        let message = reason.join(" ");

        if status_code != 200 {
            return Err(ReplyError::with_code(
                format!("{} {}", status_code, message),
                status_code as i64,
            ));
        }

        Ok(ConnectReply {
            status_code,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_request_without_auth() {
        let req = ConnectRequest {
            host: "x.test",
            port: 443,
            username: None,
            password: None,
            user_agent: "test-agent".to_owned(),
        };
        let encoded = String::from_utf8(req.encode()).unwrap();
        assert_eq!(
            encoded,
            "CONNECT x.test:443 HTTP/1.1\r\nHost: x.test:443\r\nUser-Agent: test-agent\r\n\r\n"
        );
    }

    #[test]
    fn encodes_proxy_authorization_only_when_both_creds_present() {
        let req = ConnectRequest {
            host: "x.test",
            port: 443,
            username: Some("u"),
            password: Some("p"),
            user_agent: "test-agent".to_owned(),
        };
        let encoded = String::from_utf8(req.encode()).unwrap();
        assert!(encoded.contains("Proxy-Authorization: Basic dTpw\r\n"));

        let req_partial = ConnectRequest {
            host: "x.test",
            port: 443,
            username: Some("u"),
            password: None,
            user_agent: "test-agent".to_owned(),
        };
        assert!(!String::from_utf8(req_partial.encode())
            .unwrap()
            .contains("Proxy-Authorization"));
    }

    #[test]
    fn success_reply_parses_200() {
        let reply = ConnectReply::decode(b"HTTP/1.1 200 Connection Established\r\n\r\n").unwrap();
        assert_eq!(reply.status_code, 200);
    }

    #[test]
    fn non_200_reply_is_an_error_with_code() {
        let err =
            ConnectReply::decode(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n").unwrap_err();
        assert_eq!(err.error_code, Some(407));
        assert_eq!(err.message, "407 Proxy Authentication Required");
    }

    #[test]
    fn invalid_status_line_is_an_error() {
        let err = ConnectReply::decode(b"garbage\r\n").unwrap_err();
        assert!(err.message.contains("invalid status line"));
    }

    #[test]
    fn non_numeric_status_code_is_an_error() {
        let err = ConnectReply::decode(b"HTTP/1.1 abc Bad\r\n").unwrap_err();
        assert!(err.message.contains("invalid status code"));
    }
}
