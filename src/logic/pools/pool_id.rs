use alloy_primitives::Address;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Serialized as its display string so it can key JSON maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolId {
    Address(Address),
}

impl PoolId {
    pub fn address(&self) -> Address {
        match self {
            PoolId::Address(address) => *address,
        }
    }
}

impl Display for PoolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolId::Address(address) => write!(f, "{address}"),
        }
    }
}

impl FromStr for PoolId {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address::from_str(s).map_err(|e| eyre::eyre!("invalid pool id {s}: {e}"))?;
        Ok(PoolId::Address(address))
    }
}

impl From<Address> for PoolId {
    fn from(address: Address) -> Self {
        PoolId::Address(address)
    }
}

impl Serialize for PoolId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PoolId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
