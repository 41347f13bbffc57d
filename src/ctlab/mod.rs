//! The ctlab module contains the components responsible for the core module bus
//! protocol: frame building and checking, response field extraction, the serial
//! transport, and the command engine with its retry policy.

pub mod engine;
pub mod frame;
pub mod policy;
pub mod response;
pub mod transport;
pub mod transport_mock;

pub use engine::{parse_value, CommandEngine};
pub use frame::{build_frame, decode_frame, xor_checksum, Request};
pub use policy::{EngineConfig, ProtocolPolicy, RetryPolicy};
pub use response::ParsedResponse;
pub use transport::{SerialConfig, SerialTransport, Transport};
pub use transport_mock::MockTransport;
