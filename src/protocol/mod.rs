//! Vendor wire protocol: request framing, response extraction, and
//! per-endpoint JSON decoding.

pub mod endpoints;
pub mod frame;
pub mod splice;
