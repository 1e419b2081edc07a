//! Shrink-or-original compression
//!
//! The single rule this module enforces: an "optimized" asset is only an
//! improvement when it is strictly smaller. Larger output, equal-length
//! output, even a different byte sequence of the same length: all of it
//! loses to the original buffer.

use crate::codec::{CodecChain, CodecError};
use bytes::Bytes;

/// Run the codec chain over a buffer and keep the smaller result
///
/// Post-condition: `result.len() <= input.len()`, and when the chain's
/// output is not strictly smaller the result is byte-identical to the
/// input. An empty chain returns the input untouched without awaiting
/// anything else.
///
/// # Errors
/// Codec failures propagate unchanged; the caller decides how a failed
/// asset affects the batch.
pub async fn optimize(input: &Bytes, chain: &CodecChain) -> Result<Bytes, CodecError> {
    if chain.is_empty() {
        return Ok(input.clone());
    }

    let output = chain.apply(input).await?;
    if output.len() < input.len() {
        tracing::debug!(
            before = input.len(),
            after = output.len(),
            "codec chain shrank buffer"
        );
        Ok(Bytes::from(output))
    } else {
        tracing::debug!(
            before = input.len(),
            after = output.len(),
            "codec chain did not shrink buffer, keeping original"
        );
        Ok(input.clone())
    }
}
