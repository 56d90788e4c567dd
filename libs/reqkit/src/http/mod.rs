//! HTTP plumbing: URL assembly, default headers, and the traced transport.

pub mod client;
pub mod headers;
pub mod trace;
pub mod url;
