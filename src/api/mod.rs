//! API clients.
//!
//! - [`EchoNestApi`]: the Echo Nest music-intelligence API, used by the
//!   metadata info plugin.

pub mod echonest;

pub use echonest::{EchoNestApi, ProxyConfig};
