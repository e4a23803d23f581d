//! Pure, I/O-free protocol codecs. Each submodule exposes small
//! request/reply structs with `encode`/`decode` methods; all framing reads
//! (how many bytes to read before decoding is possible) are the
//! connector's job, not the codec's — see [`crate::connectors`].

pub mod http;
pub mod socks4;
pub mod socks5;
