//! ---
//! mqx_section: "01-envelope-data-model"
//! mqx_subsection: "module"
//! mqx_type: "source"
//! mqx_scope: "code"
//! mqx_description: "Envelope schema, wire codec, and messaging observability helpers."
//! mqx_version: "v0.1.0"
//! mqx_owner: "tbd"
//! ---
use crate::types::Envelope;

/// Failures at the transport serialization boundary.
///
/// Encode failures surface synchronously to the publisher; decode failures
/// are terminal for the affected delivery because the envelope cannot be
/// reconstructed for a requeue.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The envelope could not be serialized for publication.
    #[error("envelope encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    /// The delivered bytes could not be parsed back into an envelope.
    #[error("envelope decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serialize an envelope into its JSON wire representation.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(CodecError::Encode)
}

/// Parse a wire payload back into an envelope.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}
