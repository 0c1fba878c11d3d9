#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

mod availability;
mod client;
mod config;
mod error;
mod protocol;
mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// ============================================================================
// Public API
// ============================================================================

// Client
pub use availability::AvailabilityCache;
pub use client::{RemoteSynthesis, RemoteSynthesisClient};

// Configuration
pub use config::RemoteClientConfig;

// Errors
pub use error::{RemoteError, RemoteResult};

// Wire protocol and transport seam
pub use protocol::{RemoteRequest, RemoteResponse};
pub use transport::{ReqwestTransport, SpeechTransport};
