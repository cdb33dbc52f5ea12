//! Pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cap on the number of pooled transactions
pub const DEFAULT_MAX_PENDING: usize = 4096;

/// Default percentage a replacement must outbid the existing entry by
pub const DEFAULT_PRICE_BUMP: u64 = 10;

/// Default time a transaction may linger in the pool before aging out
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(13 * 60 * 60);

/// Default capacity of the outbound announcement queue
pub const DEFAULT_ANNOUNCEMENT_CAPACITY: usize = 2048;

/// Configures the transaction pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// The chain id transactions must be bound to, if they carry one
    pub chain_id: u64,
    /// Hard cap on the number of pending transactions
    pub max_pending: usize,
    /// Percentage a replacement's fees must outbid the existing entry by
    pub price_bump: u64,
    /// How long a transaction may stay pooled before the maintenance task
    /// ages it out
    pub retention: Duration,
    /// Bound on the queue of hashes awaiting announcement to peers
    pub announcement_capacity: usize,
}

// === impl PoolConfig ===

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            max_pending: DEFAULT_MAX_PENDING,
            price_bump: DEFAULT_PRICE_BUMP,
            retention: DEFAULT_RETENTION,
            announcement_capacity: DEFAULT_ANNOUNCEMENT_CAPACITY,
        }
    }
}
