//! JSON encoding of envelopes and batches.

use tally_core::Metrics;

use crate::error::CodecResult;

pub const CONTENT_TYPE: &str = "application/json";

pub fn encode_batch(batch: &[Metrics]) -> CodecResult<Vec<u8>> {
    Ok(serde_json::to_vec(batch)?)
}

pub fn decode_batch(body: &[u8]) -> CodecResult<Vec<Metrics>> {
    Ok(serde_json::from_slice(body)?)
}

pub fn decode_one(body: &[u8]) -> CodecResult<Metrics> {
    Ok(serde_json::from_slice(body)?)
}

/// Full agent-side pipeline: JSON, then gzip.
pub fn encode_compressed(batch: &[Metrics]) -> CodecResult<Vec<u8>> {
    crate::gzip::compress(&encode_batch(batch)?)
}
