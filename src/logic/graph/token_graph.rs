use crate::logic::pools::{PoolId, PoolWrapper};
use crate::utils::Token;
use ahash::RandomState;
use alloy_primitives::Address;
use eyre::eyre;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

pub type FastHasher = RandomState;
/// FastHashMap using ahash
pub type FastHashMap<K, V> = HashMap<K, V, FastHasher>;

/// Multigraph of tokens (nodes) and pools (edges). Every edge holds all pools trading
/// the same token pair, keyed by pool id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenGraph {
    pub graph: UnGraph<TokenNode, HashMap<PoolId, PoolEdge>, usize>,
    // pool id -> pool
    pub pools: HashMap<PoolId, PoolWrapper>,
    // token address -> token
    pub tokens: HashMap<Address, Arc<Token>>,
    // token -> node index
    pub token_index: FastHashMap<Address, NodeIndex<usize>>,
    // pool -> edge indices (a multi token pool sits on several edges)
    pub pool_index: FastHashMap<PoolId, Vec<EdgeIndex<usize>>>,
}

impl TokenGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph over `pools`, tokens resolved from `tokens` when known.
    pub fn from_pools<I: IntoIterator<Item = PoolWrapper>>(pools: I, tokens: &[Arc<Token>]) -> eyre::Result<Self> {
        let mut graph = Self::new();
        for token in tokens {
            graph.add_or_get_token_idx_by_token(token.clone());
        }
        for pool in pools {
            graph.add_pool(pool)?;
        }
        Ok(graph)
    }

    pub fn set_pool_active(&mut self, pool_id: PoolId, is_active: bool) -> eyre::Result<()> {
        let Some(edge_indices) = self.pool_index.get(&pool_id) else {
            return Err(eyre!("Pool not found in graph: {:?}", pool_id));
        };
        for edge_index in edge_indices {
            let Some(edge) = self.graph.edge_weight_mut(*edge_index) else {
                return Err(eyre!("Edge not found in graph: {:?}", pool_id));
            };
            let Some(pool) = edge.get_mut(&pool_id) else {
                return Err(eyre!("Pool not found in edge: {:?}", pool_id));
            };
            pool.is_active = is_active;
        }
        Ok(())
    }

    /// Deactivates every pool with an empty side. Returns how many were switched off.
    pub fn deactivate_unusable_pools(&mut self) -> usize {
        let mut deactivated = 0;
        for edge in self.graph.edge_weights_mut() {
            for pool_edge in edge.values_mut() {
                if pool_edge.is_active && !pool_edge.inner.is_usable() {
                    pool_edge.is_active = false;
                    deactivated += 1;
                }
            }
        }
        if deactivated > 0 {
            debug!(deactivated, "pruned zero liquidity pools");
        }
        deactivated
    }

    pub fn add_or_get_token_idx_by_token(&mut self, arc_token: Arc<Token>) -> NodeIndex<usize> {
        *self.token_index.entry(arc_token.get_address()).or_insert_with(|| {
            let node = TokenNode::new(arc_token.clone());
            let idx = self.graph.add_node(node);
            self.tokens.insert(arc_token.get_address(), arc_token);
            idx
        })
    }

    pub fn add_or_get_token_idx_by_address(&mut self, address: Address) -> NodeIndex<usize> {
        if let Some(&idx) = self.token_index.get(&address) {
            return idx;
        }
        self.add_or_get_token_idx_by_token(Arc::new(Token::new(address)))
    }

    /// Adds a pool as an edge between every token pair it trades.
    pub fn add_pool<T: Into<PoolWrapper>>(&mut self, pool: T) -> eyre::Result<()> {
        let pool_wrapper = pool.into();
        let pool_id = pool_wrapper.get_pool_id();
        if self.pools.contains_key(&pool_id) {
            return Err(eyre!("Pool already in graph: {:?}", pool_id));
        }
        let pool_edge = PoolEdge::new(pool_wrapper.clone());

        let tokens = pool_wrapper.get_tokens();
        if tokens.len() < 2 {
            return Err(eyre!("Pool {:?} trades less than two tokens", pool_id));
        }

        let mut edge_indices = Vec::new();
        for (i, from_token) in tokens.iter().enumerate() {
            for to_token in tokens.iter().skip(i + 1) {
                let node_from = self.add_or_get_token_idx_by_address(*from_token);
                let node_to = self.add_or_get_token_idx_by_address(*to_token);

                let edge_index = match self.graph.find_edge(node_from, node_to) {
                    Some(edge_index) => {
                        let pools =
                            self.graph.edge_weight_mut(edge_index).ok_or_else(|| eyre!("Edge not found in graph: {:?}", edge_index))?;
                        pools.insert(pool_id, pool_edge.clone());
                        edge_index
                    }
                    None => {
                        let mut pools = HashMap::new();
                        pools.insert(pool_id, pool_edge.clone());
                        self.graph.add_edge(node_from, node_to, pools)
                    }
                };
                edge_indices.push(edge_index);
            }
        }

        self.pool_index.insert(pool_id, edge_indices);
        self.pools.insert(pool_id, pool_wrapper);

        Ok(())
    }

    pub fn get_token(&self, node: NodeIndex<usize>) -> Option<&Arc<Token>> {
        self.graph.node_weight(node).map(|n| &n.token)
    }

    /// Neighbouring nodes of `node` with the pools connecting them.
    pub fn neighbours(&self, node: NodeIndex<usize>) -> impl Iterator<Item = (NodeIndex<usize>, &HashMap<PoolId, PoolEdge>)> {
        self.graph.edges(node).map(move |edge| {
            let neighbour = if edge.source() == node { edge.target() } else { edge.source() };
            (neighbour, edge.weight())
        })
    }

    pub fn active_pool_count(&self) -> usize {
        self.graph.edge_weights().flat_map(|edge| edge.values()).filter(|p| p.is_active).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenNode {
    pub token: Arc<Token>,
}

impl Display for TokenNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.token.get_address())
    }
}

impl TokenNode {
    pub fn new(token: Arc<Token>) -> Self {
        Self { token }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolEdge {
    pub is_active: bool,
    pub inner: PoolWrapper,
}

impl Display for PoolEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner.get_address())
    }
}

impl PoolEdge {
    pub fn new(pool_wrapper: PoolWrapper) -> Self {
        Self { is_active: true, inner: pool_wrapper }
    }
}
