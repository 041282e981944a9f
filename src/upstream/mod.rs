//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Payload bytes from a TCP client
//!     → forwarder.rs (POST application/octet-stream, optional bearer auth)
//!     → HTTPS endpoint
//!     → response body bytes, or ForwardError for transport / status >= 400
//! ```

pub mod forwarder;

pub use forwarder::{Forward, ForwardError, HttpsForwarder};
