use alloy_primitives::{Address, hex};
use serde::{Deserialize, Serialize};
use sha2::digest::Update;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display};

/// Stable sha256 identity of a path over its token and pool addresses.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct PathHash(pub [u8; 32]);

impl PathHash {
    pub fn compute(tokens: &[Address], pools: &[Address]) -> Self {
        let mut hasher = Sha256::new();
        for token in tokens {
            Update::update(&mut hasher, token.as_slice());
        }
        for pool in pools {
            Update::update(&mut hasher, pool.as_slice());
        }
        PathHash(hasher.finalize().into())
    }
}

impl Display for PathHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_prefixed(self.0))
    }
}

impl Debug for PathHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PathHash({})", hex::encode_prefixed(self.0))
    }
}

impl From<[u8; 32]> for PathHash {
    fn from(hash: [u8; 32]) -> Self {
        PathHash(hash)
    }
}

impl Serialize for PathHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode_prefixed(self.0))
    }
}

impl<'de> Deserialize<'de> for PathHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let hash: [u8; 32] = bytes.try_into().map_err(|_| serde::de::Error::custom("path hash must be 32 bytes"))?;
        Ok(PathHash(hash))
    }
}
