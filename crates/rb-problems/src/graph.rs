//! Static view of which truth problems read which, from declared expressions.

use std::collections::BTreeMap;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rb_core::ProblemId;
use tracing::warn;

use crate::engine::Engine;
use crate::state::ProblemRole;

/// Edge `a -> b` labelled with an expression name: problem `a` declares an
/// expression that reads the solution of `b`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ProblemId, String>,
    index: BTreeMap<ProblemId, NodeIndex>,
}

impl DependencyGraph {
    pub(crate) fn from_engine(engine: &Engine) -> Self {
        let mut deps = Self::default();
        let truths: Vec<_> = engine
            .entries()
            .into_iter()
            .filter(|entry| entry.role == ProblemRole::Truth)
            .collect();

        for entry in &truths {
            let node = deps.graph.add_node(entry.id);
            deps.index.insert(entry.id, node);
        }
        for entry in &truths {
            for (name, expression) in &entry.definition.expressions {
                for referenced in expression.expr.referenced_problems() {
                    let Ok(target) = engine.truth_of(referenced) else {
                        continue;
                    };
                    if let (Some(&from), Some(&to)) =
                        (deps.index.get(&entry.id), deps.index.get(&target))
                    {
                        deps.graph.add_edge(from, to, name.clone());
                    }
                }
            }
        }
        deps
    }

    pub fn problem_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Problems read by `id`'s expressions, sorted, without duplicates.
    pub fn dependencies(&self, id: ProblemId) -> Vec<ProblemId> {
        let Some(&node) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn is_self_referencing(&self, id: ProblemId) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&node| self.graph.contains_edge(node, node))
    }

    /// Groups of two or more problems that read each other, directly or
    /// transitively. Resolving any of them from outside its own solve is a
    /// dependency cycle under the exact-problem policy.
    pub fn strongly_coupled(&self) -> Vec<Vec<ProblemId>> {
        let groups: Vec<Vec<ProblemId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<_> = scc.into_iter().map(|n| self.graph[n]).collect();
                ids.sort();
                ids
            })
            .collect();
        for group in &groups {
            warn!(problems = ?group, "strongly coupled problems");
        }
        groups
    }

    /// Dependencies before dependents; `None` when problems are strongly
    /// coupled. Self-references do not constrain the order.
    pub fn solve_order(&self) -> Option<Vec<ProblemId>> {
        let sccs = tarjan_scc(&self.graph);
        if sccs.iter().any(|scc| scc.len() > 1) {
            return None;
        }
        Some(sccs.into_iter().flatten().map(|n| self.graph[n]).collect())
    }
}
