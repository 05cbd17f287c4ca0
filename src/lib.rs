//! # DoIP/UDS ECU Simulator
//!
//! DoIP (Diagnostics over IP) is the ISO 13400 transport used to carry
//! automotive diagnostics over TCP; UDS (Unified Diagnostic Services,
//! ISO 14229) is the request/response protocol travelling inside DoIP
//! diagnostic messages.
//!
//! This crate simulates an ECU endpoint for external testers: a TCP DoIP
//! entity that answers vehicle identification, negotiates routing activation
//! and then dispatches UDS requests: diagnostic sessions, ECU reset,
//! tester-present keepalives, memory download sequences and programming
//! routines.
//!
//! The protocol layers are usable on their own:
//! - [`protocol`] encodes and decodes DoIP frames,
//! - [`uds`] holds the purely computational service dispatcher,
//! - [`server`] ties both to a TCP listener.
//!
//! ## References
//!
//! - ISO 13400-2 (DoIP network and transport layer services)
//! - ISO 14229-1 (UDS specification and requirements)

mod error;

pub mod protocol;
pub mod server;
pub mod traits;
pub mod uds;

pub use error::Error;
pub use server::{DoIpServer, ServerConfig, DOIP_PORT};
