use crate::errors::ArbError;
use crate::utils::constants::{MAX_TOKEN_DECIMALS, NATIVE, WETH};
use alloy_primitives::utils::Unit;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An ERC20 token as resolved from chain data. Identity is the address only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    address: Address,
    decimals: u8,
    symbol: Option<String>,
}

pub type TokenWrapper = Arc<Token>;

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.get_address()
    }
}

impl Eq for Token {}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.get_address())
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Token {
    /// Token with unknown metadata, assumed to use 18 decimals.
    pub fn new(address: Address) -> Token {
        Token { address, decimals: 18, symbol: None }
    }

    pub fn new_with_data(address: Address, symbol: Option<String>, decimals: u8) -> Result<Token, ArbError> {
        if decimals > MAX_TOKEN_DECIMALS {
            return Err(ArbError::Validation(format!("token {address} has {decimals} decimals, max is {MAX_TOKEN_DECIMALS}")));
        }
        Ok(Token { address, decimals, symbol })
    }

    // For testing purposes
    pub fn repeat_byte(byte: u8) -> Token {
        Token::new(Address::repeat_byte(byte))
    }

    pub fn get_symbol(&self) -> String {
        self.symbol.clone().unwrap_or(self.address.to_string())
    }

    pub fn get_decimals(&self) -> u8 {
        self.decimals
    }

    /// One whole token in smallest units.
    pub fn get_exp(&self) -> U256 {
        if self.decimals == 18 { Unit::ETHER.wei() } else { U256::from(10).pow(U256::from(self.decimals)) }
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    pub fn is_wrapped(&self) -> bool {
        self.address == WETH
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE
    }
}
