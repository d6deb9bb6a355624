//! Transport layer: the `Transport` seam the delivery worker talks through,
//! plus the default HTTP binding.

pub mod http;
pub mod transport;

pub use http::{HttpConfig, HttpTransport, TransportBuildError};
pub use transport::{CollectorResponse, Transport, TransportError};
