pub mod path_hash;
pub mod token_graph;

pub use path_hash::PathHash;
pub use token_graph::{FastHashMap, PoolEdge, TokenGraph, TokenNode};
