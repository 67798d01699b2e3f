//! Payload format for handler lists written to a remote cache.
//!
//! JSON is self-describing, so records written by one process version can be
//! read back by another as long as the callback names still resolve.

use super::record::HandlerRecord;
use crate::error::Result;

pub fn encode_records(records: &[HandlerRecord]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(records)?)
}

pub fn decode_records(payload: &[u8]) -> Result<Vec<HandlerRecord>> {
    Ok(serde_json::from_slice(payload)?)
}
