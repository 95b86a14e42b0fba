//! Synchronous client core for the HIL bare-metal node API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). `Session` pairs the client
//! with a `Transport` so each operation is a single call.
//!
//! # Design
//! - `HilClient` is stateless; it holds only `base_url`.
//! - Each operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit.
//! - Status codes are translated per operation (`Operation::error_for`) into
//!   the `ApiError` taxonomy; 500 is a distinct `Server` error.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod session;
pub mod types;

pub use client::{HilClient, Operation};
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use session::Session;
pub use types::{NicInfo, NodeFilter, NodeInfo, Obm, ObmKind, PowerState};
