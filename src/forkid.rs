//! Fork identification for peer compatibility checks
//!
//! A node's fork id is a CRC32 checksum over its genesis hash and every fork
//! block it has applied, paired with the next fork block it knows about.
//! Comparing ids is enough to decide whether a peer follows the same rule
//! set, is still syncing towards our rules, or has diverged.

use crc::{Crc, CRC_32_ISO_HDLC};
use ethers_core::types::H256;
use ethers_core::utils::rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// CRC32 checksum of the genesis hash and all applied fork blocks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ForkHash(pub [u8; 4]);

/// The checksum a node announces at handshake, together with the next fork
/// block it knows about. `next` is zero when no further fork is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForkId {
    pub hash: ForkHash,
    pub next: u64,
}

impl Encodable for ForkId {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&&self.hash.0[..]);
        s.append(&self.next);
    }
}

impl Decodable for ForkId {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen)
        }
        let hash: Vec<u8> = rlp.val_at(0)?;
        if hash.len() != 4 {
            return Err(DecoderError::RlpInvalidLength)
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&hash);
        Ok(ForkId { hash: ForkHash(bytes), next: rlp.val_at(1)? })
    }
}

/// Tracks the fork id chain of the local chain and decides whether a remote
/// peer's announced id is compatible with it.
#[derive(Clone, Debug)]
pub struct ForkFilter {
    /// ordered fork activation blocks
    forks: Vec<u64>,
    /// one id per era, `ids[i]` is active while exactly `i` forks apply
    ids: Vec<ForkId>,
}

// === impl ForkFilter ===

impl ForkFilter {
    /// Builds the id chain from the genesis hash and the fork activation
    /// blocks. Duplicates and a genesis-block activation are ignored, the
    /// rest is applied in ascending order.
    pub fn new(genesis_hash: H256, forks: impl IntoIterator<Item = u64>) -> Self {
        let mut forks: Vec<u64> = forks.into_iter().filter(|block| *block != 0).collect();
        forks.sort_unstable();
        forks.dedup();

        let crc = Crc::<u32>::new(&CRC_32_ISO_HDLC);
        let mut digest = crc.digest();
        digest.update(genesis_hash.as_bytes());

        let mut ids = Vec::with_capacity(forks.len() + 1);
        for fork in &forks {
            ids.push(ForkId {
                hash: ForkHash(digest.clone().finalize().to_be_bytes()),
                next: *fork,
            });
            digest.update(&fork.to_be_bytes());
        }
        ids.push(ForkId { hash: ForkHash(digest.finalize().to_be_bytes()), next: 0 });

        Self { forks, ids }
    }

    /// Number of forks applied at the given head
    fn active_index(&self, head: u64) -> usize {
        self.forks.iter().take_while(|fork| **fork <= head).count()
    }

    /// The id to announce when the local head is at the given block
    pub fn fork_id_at(&self, head: u64) -> ForkId {
        self.ids[self.active_index(head)]
    }

    /// Whether a peer announcing `remote` can usefully share our chain,
    /// given our current head.
    ///
    /// The peer passes if it is on our rule set, if it lags behind but
    /// already knows about the fork we applied next, or if it is ahead of us
    /// on a chain we have yet to reach.
    pub fn is_compatible(&self, head: u64, remote: &ForkId) -> bool {
        let active = self.active_index(head);
        if remote.hash == self.ids[active].hash {
            return true
        }
        // remote is behind us: its snapshot must be one of our past ones and
        // it must announce the fork we applied right after it
        if let Some(position) =
            self.ids[..active].iter().position(|id| id.hash == remote.hash)
        {
            return remote.next == self.forks[position]
        }
        // remote is ahead of us
        self.ids[active + 1..].iter().any(|id| id.hash == remote.hash)
    }
}
