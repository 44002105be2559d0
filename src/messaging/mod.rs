// Private module declarations
mod bridge_client;
mod error;
mod sse;

// Re-export for public API
pub use bridge_client::{
    AckOutcome, BridgeApi, CommandStream, HttpBridgeClient, StreamEvent, SECRET_HEADER,
};
pub use error::TransportError;
pub use sse::{SseDecoder, SseItem};
