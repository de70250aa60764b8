//! Process-wide planner with a content-keyed linearization cache.
//!
//! Each request plans in its own [`PlanSession`]; only flattened results are
//! shared. The cache key is the graph's content plus the planning mode, so
//! concurrent requests for the same facts may compute redundantly but always
//! store the same value.

use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::config::PlannerConfig;
use crate::error::{ConfigError, PlanResult};
use crate::graph::{FactGraph, FactKey};
use crate::plan::Linearizations;

use super::{Component, PlanMode, PlanSession};

/// Thread-safe planning front end. Cloning shares the cache.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    cache: Arc<DashMap<(PlanMode, FactKey), Linearizations>>,
}

impl Planner {
    /// Create a planner after validating its configuration.
    pub fn new(config: PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cache: Arc::new(DashMap::new()),
        })
    }

    /// The planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// All plans of a graph, served from the shared cache when possible.
    pub fn plans(&self, graph: &FactGraph, mode: PlanMode) -> PlanResult<Linearizations> {
        let key = (mode, graph.key().clone());
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(key = %graph.key(), ?mode, "shared plan cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let mut session = PlanSession::with_config(self.config.clone());
        let root = session.plan(graph, mode)?;
        let plans = session.linearize(root)?;

        let stored = self.cache.entry(key).or_insert(plans);
        Ok(Arc::clone(stored.value()))
    }

    /// Plan independent graphs in parallel.
    ///
    /// Results are in input order; a failure in one graph does not affect
    /// the others.
    pub fn plan_batch(
        &self,
        graphs: &[FactGraph],
        mode: PlanMode,
    ) -> Vec<PlanResult<Linearizations>> {
        let results: Vec<_> = graphs.par_iter().map(|g| self.plans(g, mode)).collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            graphs = graphs.len(),
            failed,
            cached = self.cache.len(),
            ?mode,
            "batch planning finished"
        );
        results
    }

    /// Plans aligned to per-sentence constraints. Not cached: the result
    /// depends on the components as well as the facts.
    pub fn constrained_plans(
        &self,
        graph: &FactGraph,
        components: &[Component],
    ) -> PlanResult<Linearizations> {
        let mut session = PlanSession::with_config(self.config.clone());
        let root = session.constrained_plan(graph, components)?;
        session.linearize(root)
    }

    /// Constrained plans whose node mentions follow the reference
    /// sentences' order. Not cached.
    pub fn aligned_plans<S: AsRef<str>>(
        &self,
        graph: &FactGraph,
        sentences: &[S],
    ) -> PlanResult<Vec<String>> {
        let mut session = PlanSession::with_config(self.config.clone());
        session.aligned_plans(graph, sentences)
    }

    /// Number of cached results.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Budget;

    #[test]
    fn results_are_shared_between_clones() {
        let planner = Planner::new(PlannerConfig::default()).unwrap();
        let other = planner.clone();
        let g = FactGraph::new([("A", "r", "B")]).unwrap();

        let first = planner.plans(&g, PlanMode::Direct).unwrap();
        let second = other.plans(&g, PlanMode::Direct).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(planner.cached(), 1);

        planner.plans(&g, PlanMode::Full).unwrap();
        assert_eq!(other.cached(), 2);
        other.clear_cache();
        assert_eq!(planner.cached(), 0);
    }

    #[test]
    fn batch_keeps_input_order() {
        let planner = Planner::new(PlannerConfig::default()).unwrap();
        let graphs = vec![
            FactGraph::new([("A", "r", "B")]).unwrap(),
            FactGraph::new([("A", "x", "B"), ("C", "y", "D")]).unwrap(),
            FactGraph::new([("A", "r", "B")]).unwrap(),
        ];
        let results = planner.plan_batch(&graphs, PlanMode::Direct);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 2);
        assert!(results[1].as_ref().unwrap().is_empty());
        assert_eq!(results[2].as_ref().unwrap().len(), 2);
        assert_eq!(planner.cached(), 2);
    }

    #[test]
    fn budget_failures_are_not_cached() {
        let config = PlannerConfig {
            budget: Budget {
                max_linearizations: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let planner = Planner::new(config).unwrap();
        let g = FactGraph::new([("A", "r", "B")]).unwrap();
        assert!(planner.plans(&g, PlanMode::Direct).is_err());
        assert_eq!(planner.cached(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PlannerConfig {
            max_split_size: 0,
            ..Default::default()
        };
        assert!(Planner::new(config).is_err());
    }
}
