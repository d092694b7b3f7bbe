use alloy_primitives::Bytes;
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// An opaque transaction.
///
/// Execution and signature semantics are the block processor's concern; the
/// chain core only moves transactions around and counts them.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct Transaction {
    /// The encoded transaction payload.
    pub payload: Bytes,
}
