use ethers_core::{
    types::{Address, Bloom, Bytes, H256, H64, U256},
    utils::{
        keccak256, rlp,
        rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream},
    },
};
use serde::{Deserialize, Serialize};

/// ethereum block header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub parent_hash: H256,
    pub ommers_hash: H256,
    pub beneficiary: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: U256,
    pub gas_limit: U256,
    pub gas_used: U256,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: H256,
    pub nonce: H64,
    /// BaseFee was added by EIP-1559 and is absent from earlier headers.
    pub base_fee_per_gas: Option<U256>,
}

// == impl Header ==

impl Header {
    pub fn hash(&self) -> H256 {
        H256::from_slice(keccak256(rlp::encode(self)).as_slice())
    }

    /// The base fee the pool orders against, zero before the fee market
    /// activates.
    pub fn base_fee(&self) -> U256 {
        self.base_fee_per_gas.unwrap_or_default()
    }
}

impl Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        if self.base_fee_per_gas.is_some() {
            s.begin_list(16);
        } else {
            s.begin_list(15);
        }
        s.append(&self.parent_hash);
        s.append(&self.ommers_hash);
        s.append(&self.beneficiary);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.logs_bloom);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data.as_ref());
        s.append(&self.mix_hash);
        s.append(&self.nonce);
        if let Some(ref base_fee) = self.base_fee_per_gas {
            s.append(base_fee);
        }
    }
}

impl Decodable for Header {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Header {
            parent_hash: rlp.val_at(0)?,
            ommers_hash: rlp.val_at(1)?,
            beneficiary: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            logs_bloom: rlp.val_at(6)?,
            difficulty: rlp.val_at(7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: rlp.val_at::<Vec<u8>>(12)?.into(),
            mix_hash: rlp.val_at(13)?,
            nonce: rlp.val_at(14)?,
            base_fee_per_gas: if let Ok(base_fee) = rlp.at(15) {
                Some(U256::decode(&base_fee)?)
            } else {
                None
            },
        })
    }
}
