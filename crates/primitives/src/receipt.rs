use crate::Log;
use alloy_primitives::U256;
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// The receipt of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct Receipt {
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: U256,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
}
