//! Adjacency-list graph (spec.md §4.2).

use indexmap::IndexMap;

use super::key::BinderKey;
use crate::error::EngineError;
use crate::value::Binder;

/// `(to, weight)` pair returned by `getNeighbors`.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub to: Binder,
    pub weight: f64,
}

/// `(from, to, weight)` triple returned by `getEdges`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: Binder,
    pub to: Binder,
    pub weight: f64,
}

/// Adjacency list keyed by node-binder identity-or-primitive; `directed` is
/// fixed at construction. Undirected edges are stored once per direction, so
/// `getEdges` naturally lists them twice (spec.md §4.2).
#[derive(Debug, Default)]
pub struct Graph {
    directed: bool,
    /// node -> ordered (neighbor -> weight)
    adjacency: IndexMap<BinderKey, IndexMap<BinderKey, f64>, ahash::RandomState>,
}

impl Graph {
    #[must_use]
    pub fn new(directed: bool) -> Self {
        Self { directed, adjacency: IndexMap::default() }
    }

    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn add_vertex(&mut self, v: Binder) {
        self.adjacency.entry(BinderKey(v)).or_default();
    }

    pub fn has_vertex(&self, v: &Binder) -> bool {
        self.adjacency.contains_key(&BinderKey(v.clone()))
    }

    /// `weight` defaults to `1` per spec.md §4.2; must be numeric, else raise.
    pub fn add_edge(&mut self, from: Binder, to: Binder, weight: Option<&Binder>) -> Result<(), EngineError> {
        let weight = match weight {
            Some(w) => w.as_f64().ok_or_else(|| EngineError::type_error("edge weight must be numeric"))?,
            None => 1.0,
        };
        self.adjacency.entry(BinderKey(from.clone())).or_default();
        self.adjacency.entry(BinderKey(to.clone())).or_default();
        self.adjacency.get_mut(&BinderKey(from.clone())).unwrap().insert(BinderKey(to.clone()), weight);
        if !self.directed {
            self.adjacency.get_mut(&BinderKey(to)).unwrap().insert(BinderKey(from), weight);
        }
        Ok(())
    }

    #[must_use]
    pub fn has_edge(&self, from: &Binder, to: &Binder) -> bool {
        self.adjacency
            .get(&BinderKey(from.clone()))
            .is_some_and(|nbrs| nbrs.contains_key(&BinderKey(to.clone())))
    }

    pub fn get_vertices(&self) -> impl Iterator<Item = Binder> + '_ {
        self.adjacency.keys().map(|k| k.0.clone())
    }

    /// Missing vertex is simply an empty neighbor list.
    pub fn get_neighbors(&self, v: &Binder) -> Vec<Neighbor> {
        self.adjacency
            .get(&BinderKey(v.clone()))
            .map(|nbrs| nbrs.iter().map(|(k, &w)| Neighbor { to: k.0.clone(), weight: w }).collect())
            .unwrap_or_default()
    }

    pub fn get_edge_weight(&self, from: &Binder, to: &Binder) -> Result<f64, EngineError> {
        self.adjacency
            .get(&BinderKey(from.clone()))
            .and_then(|nbrs| nbrs.get(&BinderKey(to.clone())))
            .copied()
            .ok_or_else(|| EngineError::container_error("no such edge"))
    }

    pub fn get_edges(&self) -> Vec<Edge> {
        let mut out = Vec::new();
        for (from, nbrs) in &self.adjacency {
            for (to, &weight) in nbrs {
                out.push(Edge { from: from.0.clone(), to: to.0.clone(), weight });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Binder;

    #[test]
    fn undirected_edges_appear_twice() {
        let mut g = Graph::new(false);
        g.add_edge(Binder::int(1), Binder::int(2), None).unwrap();
        assert_eq!(g.get_edges().len(), 2);
        assert!(g.has_edge(&Binder::int(1), &Binder::int(2)));
        assert!(g.has_edge(&Binder::int(2), &Binder::int(1)));
    }

    #[test]
    fn directed_edge_appears_once() {
        let mut g = Graph::new(true);
        g.add_edge(Binder::int(1), Binder::int(2), None).unwrap();
        assert_eq!(g.get_edges().len(), 1);
        assert!(!g.has_edge(&Binder::int(2), &Binder::int(1)));
    }
}
