mod breaker;
mod client;
mod envelope;
mod governor;

pub use breaker::CircuitBreaker;
pub use client::{ClientError, Outcome, RawResponse, UpstreamClient, UpstreamConfig};
pub use envelope::{Envelope, Paging, QuotaTelemetry};
pub use governor::{AcquireError, RateGovernor};
