//! Content planners: search strategies that turn a [`FactGraph`] into a plan tree.
//!
//! A [`PlanSession`] owns one [`PlanArena`] plus the memo tables shared by
//! every strategy. Sub-problems are keyed by [`FactKey`], so a fact subset
//! reached through different split points is planned once per session.
//!
//! - [`tree`]: depth-first shortcut for forest-shaped graphs
//! - [`exhaustive`]: backtracking over every connected fact order
//! - [`decompose`]: size-bounded split into several sentences
//! - [`constraint`]: split aligned to per-sentence node constraints
//! - [`shared`]: process-wide cache and parallel batch planning

pub mod constraint;
pub mod decompose;
pub mod exhaustive;
pub mod shared;
pub mod tree;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::{ConfigError, PlanError, PlanResult};
use crate::graph::{FactGraph, FactKey};
use crate::plan::{Linearizations, PlanArena, PlanId};

pub use constraint::{Component, components_from_sentences, follows_reference_order};
pub use shared::Planner;

/// Which planning entry point to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Size-bounded decomposition: one or more sentences.
    Full,
    /// A single sentence covering every fact.
    Direct,
}

/// Counters describing the work a session has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Direct plans actually computed.
    pub direct_computations: usize,
    /// Direct plans served from the memo table.
    pub direct_hits: usize,
    /// Decompositions actually computed.
    pub decompositions: usize,
    /// Decompositions served from the memo table.
    pub decomposition_hits: usize,
    /// Sub-fact-sets examined by decomposition and constraint search.
    pub subsets_examined: usize,
    /// Distinct states visited by exhaustive walks.
    pub walk_states: usize,
}

/// Memo tables keyed by fact-subset content.
#[derive(Debug, Default)]
pub(crate) struct PlanCache {
    pub(crate) direct: HashMap<FactKey, PlanId>,
    pub(crate) decomposed: HashMap<FactKey, PlanId>,
}

/// One planning scope: arena, memo tables and budget.
///
/// Plan handles returned by a session are only valid for that session. A
/// session may be reused across calls; its memo tables are never invalidated.
#[derive(Debug)]
pub struct PlanSession {
    config: PlannerConfig,
    arena: PlanArena,
    cache: PlanCache,
    stats: CacheStats,
}

impl Default for PlanSession {
    fn default() -> Self {
        Self::with_config(PlannerConfig::default())
    }
}

impl PlanSession {
    /// Create a session after validating its configuration.
    pub fn new(config: PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// Create a session from an already validated configuration.
    pub(crate) fn with_config(config: PlannerConfig) -> Self {
        let arena = PlanArena::new(
            config.budget.max_plan_nodes,
            config.budget.max_linearizations,
        );
        Self {
            config,
            arena,
            cache: PlanCache::default(),
            stats: CacheStats::default(),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The arena holding every plan built so far.
    pub fn arena(&self) -> &PlanArena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut PlanArena {
        &mut self.arena
    }

    /// Work counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Plan a graph with the given entry point.
    pub fn plan(&mut self, graph: &FactGraph, mode: PlanMode) -> PlanResult<PlanId> {
        match mode {
            PlanMode::Full => self.decompose(graph),
            PlanMode::Direct => self.direct_plan(graph),
        }
    }

    /// Single-sentence plan of every fact.
    ///
    /// Uses the tree shortcut when the graph is a forest and the exhaustive
    /// planner otherwise. Memoized by the graph's content key.
    pub fn direct_plan(&mut self, graph: &FactGraph) -> PlanResult<PlanId> {
        if let Some(&id) = self.cache.direct.get(graph.key()) {
            self.stats.direct_hits += 1;
            tracing::trace!(key = %graph.key(), "direct plan cache hit");
            return Ok(id);
        }

        let tree_shaped = graph.is_tree_shaped();
        tracing::debug!(
            facts = graph.fact_count(),
            nodes = graph.node_count(),
            strategy = if tree_shaped { "tree" } else { "exhaustive" },
            "planning fact set directly"
        );
        let id = if tree_shaped {
            self.tree_plan(graph)?
        } else {
            self.exhaustive_plan(graph)?
        };

        self.stats.direct_computations += 1;
        self.cache.direct.insert(graph.key().clone(), id);
        Ok(id)
    }

    /// All linearizations of a plan built by this session.
    pub fn linearize(&self, id: PlanId) -> PlanResult<Linearizations> {
        self.arena.linearize(id)
    }

    /// Number of linearizations of a plan, without materializing them.
    pub fn count(&self, id: PlanId) -> PlanResult<u128> {
        self.arena.count(id)
    }

    pub(crate) fn enter(&self, depth: usize) -> PlanResult<()> {
        let limit = self.config.budget.max_depth;
        if depth > limit {
            tracing::warn!(depth, limit, "planner recursion budget exceeded");
            return Err(PlanError::BudgetExceeded {
                resource: "recursion levels",
                limit,
            });
        }
        Ok(())
    }

    pub(crate) fn charge_walk_state(&mut self) -> PlanResult<()> {
        let limit = self.config.budget.max_walk_states;
        if self.stats.walk_states >= limit {
            tracing::warn!(limit, "walk state budget exceeded");
            return Err(PlanError::BudgetExceeded {
                resource: "walk states",
                limit,
            });
        }
        self.stats.walk_states += 1;
        Ok(())
    }

    pub(crate) fn charge_subset(&mut self) -> PlanResult<()> {
        let limit = self.config.budget.max_subsets;
        if self.stats.subsets_examined >= limit {
            tracing::warn!(limit, "subset budget exceeded");
            return Err(PlanError::BudgetExceeded {
                resource: "sub-fact-sets",
                limit,
            });
        }
        self.stats.subsets_examined += 1;
        Ok(())
    }
}
