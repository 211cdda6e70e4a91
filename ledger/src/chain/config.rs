// ledger/src/chain/config.rs

/// Chain protocol parameters.
///
/// These are protocol-level constants shared by every honest node: changing
/// either value forks the network, since blocks valid under one setting are
/// rejected under another. The defaults match the deployed protocol.
#[derive(Clone, Debug)]
pub struct ChainConfig {
    /// Exact number of messages every block must carry.
    pub messages_per_block: usize,
    /// Required number of leading zero hex digits in a block hash.
    pub pow_leading_zeros: u32,
    /// How many recently rejected block hashes to remember for diagnostics.
    pub reject_cache_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            messages_per_block: 10,
            pow_leading_zeros: 5,
            reject_cache_capacity: 1024,
        }
    }
}
