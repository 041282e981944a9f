//! Health and readiness subsystem.
//!
//! # Data Flow
//! ```text
//! startup binds TCP listener
//!     → state.rs (Readiness::mark_ready)
//!     → /ready turns 200
//!
//! /health is 200 whenever the admin server answers.
//! ```

pub mod state;

pub use state::Readiness;
