use super::gas::GasQuote;
use super::graph::{PathHash, TokenGraph};
use super::pools::PoolId;
use super::types::{ArbitrageHop, ArbitragePath};
use crate::errors::ArbError;
use alloy_primitives::{Address, U256};
use petgraph::graph::NodeIndex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Bounded-depth cycle search over the token graph.
///
/// Every step quotes the running amount through the pool, so returned paths carry real
/// amounts. The visited set holds pool ids: a token may appear more than once, a pool may not.
pub struct Pathfinder {
    /// Maximum number of paths to keep before stopping the search
    max_paths_limit: usize,
    gas_quote: Option<GasQuote>,
}

struct SearchState<'a> {
    graph: &'a TokenGraph,
    start_token: Address,
    start_node: NodeIndex<usize>,
    max_hops: usize,
    min_profit_threshold: U256,
    hops: Vec<ArbitrageHop>,
    gas: Vec<u64>,
    used_pools: HashSet<PoolId>,
    seen: HashSet<PathHash>,
    found: Vec<ArbitragePath>,
}

impl Pathfinder {
    pub fn new(max_paths_limit: usize) -> Self {
        Self { max_paths_limit, gas_quote: None }
    }

    /// Prices gas while searching so paths are ranked and filtered by preliminary net profit.
    pub fn with_gas_quote(mut self, gas_quote: GasQuote) -> Self {
        self.gas_quote = Some(gas_quote);
        self
    }

    /// All profitable cycles from `start_token` back to itself with at most `max_hops` swaps,
    /// ranked by net profit, then hop count, then gas.
    pub fn find_paths(
        &self,
        token_graph: &TokenGraph,
        start_token: Address,
        input_amount: U256,
        max_hops: usize,
        min_profit_threshold: U256,
    ) -> Result<Vec<ArbitragePath>, ArbError> {
        if max_hops < 2 {
            return Err(ArbError::Validation(format!("max_hops must be at least 2, got {max_hops}")));
        }
        if input_amount.is_zero() {
            return Err(ArbError::Validation("input amount is zero".to_string()));
        }
        let Some(&start_node) = token_graph.token_index.get(&start_token) else {
            debug!(%start_token, "start token not in graph");
            return Ok(Vec::new());
        };

        let mut state = SearchState {
            graph: token_graph,
            start_token,
            start_node,
            max_hops,
            min_profit_threshold,
            hops: Vec::with_capacity(max_hops),
            gas: Vec::with_capacity(max_hops),
            used_pools: HashSet::new(),
            seen: HashSet::new(),
            found: Vec::new(),
        };
        self.dfs(&mut state, start_node, input_amount);

        let mut paths = state.found;
        paths.sort_by(rank);

        let mut hop_counts = BTreeMap::new();
        for path in &paths {
            *hop_counts.entry(path.len()).or_insert(0usize) += 1;
        }
        debug!(?hop_counts, "path length distribution");
        info!(%start_token, paths = paths.len(), max_hops, "path search finished");

        Ok(paths)
    }

    fn dfs(&self, state: &mut SearchState<'_>, current_node: NodeIndex<usize>, amount_in: U256) {
        let graph = state.graph;
        let Some(current_token) = graph.get_token(current_node).map(|t| t.get_address()) else {
            return;
        };

        for (neighbour_node, pools) in graph.neighbours(current_node) {
            let closes_cycle = neighbour_node == state.start_node;
            let depth = state.hops.len() + 1;
            if closes_cycle && depth < 2 {
                continue;
            }
            if !closes_cycle && depth >= state.max_hops {
                continue;
            }
            let Some(neighbour_token) = graph.get_token(neighbour_node).map(|t| t.get_address()) else {
                continue;
            };

            for pool_edge in pools.values() {
                if state.found.len() >= self.max_paths_limit {
                    return;
                }
                let pool_id = pool_edge.inner.get_pool_id();
                if !pool_edge.is_active || !pool_edge.inner.is_usable() || state.used_pools.contains(&pool_id) {
                    continue;
                }

                let (hop, gas) = match ArbitrageHop::quote(pool_edge.inner.clone(), current_token, neighbour_token, amount_in) {
                    Ok(quoted) => quoted,
                    Err(e) => {
                        debug!(pool = %pool_id, error = %e, "quote failed, pruning branch");
                        continue;
                    }
                };
                if hop.amount_out.is_zero() {
                    continue;
                }
                let amount_out = hop.amount_out;

                state.hops.push(hop);
                state.gas.push(gas);
                state.used_pools.insert(pool_id);

                if closes_cycle {
                    self.close_cycle(state);
                    if state.found.len() >= self.max_paths_limit {
                        warn!(limit = self.max_paths_limit, "path limit reached, stopping search");
                    }
                } else {
                    self.dfs(state, neighbour_node, amount_out);
                }

                state.used_pools.remove(&pool_id);
                state.gas.pop();
                state.hops.pop();
            }
        }
    }

    fn close_cycle(&self, state: &mut SearchState<'_>) {
        let path = match ArbitragePath::new(state.start_token, state.hops.clone(), &state.gas) {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "discarding malformed cycle");
                return;
            }
        };
        if path.estimated_profit.is_zero() || !state.seen.insert(path.hash) {
            return;
        }

        let path = match self.gas_quote.as_ref().and_then(|q| q.cost_in_token(path.total_gas_estimate)) {
            Some(gas_cost) => path.with_gas_cost(gas_cost),
            None => path,
        };
        if path.net_profit >= state.min_profit_threshold {
            state.found.push(path);
        }
    }
}

/// Net profit descending, then fewer hops, then less gas.
pub fn rank(a: &ArbitragePath, b: &ArbitragePath) -> Ordering {
    b.net_profit
        .cmp(&a.net_profit)
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.total_gas_estimate.cmp(&b.total_gas_estimate))
}
