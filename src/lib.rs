//! TCP to HTTPS bridge library.

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use net::ProxyServer;
pub use upstream::{Forward, HttpsForwarder};
