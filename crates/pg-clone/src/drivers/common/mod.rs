//! Utilities shared by driver implementations.

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
