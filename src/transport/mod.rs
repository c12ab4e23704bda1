//! Instrument transport: the exchange seam and its implementations.
//!
//! The driver talks to exactly one instrument through the [`Transport`]
//! trait so tests can substitute a scripted endpoint for the TCP session.

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::TcpSession;

use async_trait::async_trait;

use crate::error::RgaResult;

/// One blocking request/response exchange with the instrument.
#[async_trait]
pub trait Transport: Send {
    /// Write the full request, then collect response bytes until the byte
    /// budget is filled or the exchange timeout elapses. A timeout with
    /// zero bytes is an error; a timeout with partial bytes returns what
    /// was received.
    async fn exchange(&mut self, request: &str) -> RgaResult<Vec<u8>>;
}
