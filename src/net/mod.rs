//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, admission policy)
//!     → server.rs (spawn handler task, track for drain)
//!     → connection.rs (read one payload, forward, respond, bookkeeping)
//!
//! Connection States:
//!     Accepted → Admitted | Rejected
//!     Admitted → Reading → Forwarding → Responding → Closed
//! ```
//!
//! # Design Decisions
//! - Rejected connections are closed, never queued
//! - Each handler tracked for graceful shutdown
//! - One deadline per connection covers both read and write

pub mod connection;
pub mod listener;
pub mod server;

pub use connection::{handle_connection, ConnectionTracker, HandlerError, Outcome};
pub use listener::{Admission, Listener, ListenerError};
pub use server::ProxyServer;
