use alloy_primitives::{Address, B256};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

/// `FixedString(20)` column holding an address.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default, Deref,
)]
pub struct AddressBytes(pub [u8; 20]);

impl From<Address> for AddressBytes {
    fn from(value: Address) -> Self {
        Self(value.into_array())
    }
}

impl From<AddressBytes> for Address {
    fn from(value: AddressBytes) -> Self {
        Self::from(value.0)
    }
}

impl AddressBytes {
    /// SQL literal matching this value in a `FixedString(20)` column.
    pub fn sql(&self) -> String {
        format!("unhex('{}')", hex::encode(self.0))
    }
}

/// `FixedString(32)` column holding a hash or Merkle root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, Deref)]
pub struct HashBytes(pub [u8; 32]);

impl From<B256> for HashBytes {
    fn from(value: B256) -> Self {
        Self(value.0)
    }
}

impl From<HashBytes> for B256 {
    fn from(value: HashBytes) -> Self {
        Self::from(value.0)
    }
}

impl HashBytes {
    /// SQL literal matching this value in a `FixedString(32)` column.
    pub fn sql(&self) -> String {
        format!("unhex('{}')", hex::encode(self.0))
    }
}
