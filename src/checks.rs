//! Graph and distance-map predicate checks (spec.md §4.5).
//!
//! Split out of `predicate.rs` because these operate on a container's actual
//! structure (adjacency list, map-of-map) rather than on cached scalar
//! history, and each is algorithmically distinct enough to read better on
//! its own.

use crate::containers::graph::Graph;
use crate::error::EngineError;
use crate::value::{Binder, Value};

/// Bellman-Ford from vertex 0: relax all edges `|V|-1` times, then any
/// further relaxation means a negative cycle (spec.md §4.5).
pub fn no_negative_cycles(graph: &Graph) -> Result<bool, EngineError> {
    let vertices: Vec<Binder> = graph.get_vertices().collect();
    if vertices.is_empty() {
        return Ok(true);
    }
    let edges = graph.get_edges();
    let n = vertices.len();
    let index_of = |v: &Binder| vertices.iter().position(|x| x.key_eq(v));

    let mut dist = vec![f64::INFINITY; n];
    dist[0] = 0.0;
    for _ in 0..n.saturating_sub(1) {
        for e in &edges {
            let (Some(u), Some(v)) = (index_of(&e.from), index_of(&e.to)) else {
                continue;
            };
            if dist[u].is_finite() && dist[u] + e.weight < dist[v] {
                dist[v] = dist[u] + e.weight;
            }
        }
    }
    for e in &edges {
        let (Some(u), Some(v)) = (index_of(&e.from), index_of(&e.to)) else {
            continue;
        };
        if dist[u].is_finite() && dist[u] + e.weight < dist[v] {
            return Ok(false);
        }
    }
    Ok(true)
}

/// For every key `u` in the outer map, `outer[u].get(u) == 0` when present.
///
/// Open question (spec.md §9): when an entry's value isn't itself a map, it
/// is skipped rather than treated as a failure — see DESIGN.md.
pub fn distance_to_self_zero(outer: &Binder) -> Result<bool, EngineError> {
    let Value::Map(outer) = &outer.value else {
        return Err(EngineError::type_error("distance_to_self_zero requires a map"));
    };
    let outer = outer.borrow();
    for (u, row) in outer.entries() {
        let Value::Map(row) = &row.value else {
            continue;
        };
        if let Some(self_dist) = row.borrow().get(&u) {
            let Some(n) = self_dist.as_f64() else {
                return Err(EngineError::type_error("distance_to_self_zero: distance must be numeric"));
            };
            if n != 0.0 {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// For all `u,v,k` in the collected vertex set with defined entries,
/// `d[u][v] <= d[u][k] + d[k][v]`.
pub fn triangle_inequality(outer: &Binder) -> Result<bool, EngineError> {
    let Value::Map(outer) = &outer.value else {
        return Err(EngineError::type_error("triangle_inequality requires a map"));
    };
    let outer = outer.borrow();

    let mut vertices: Vec<Binder> = Vec::new();
    let mut push_unique = |v: &Binder, vertices: &mut Vec<Binder>| {
        if !vertices.iter().any(|x| x.key_eq(v)) {
            vertices.push(v.clone());
        }
    };
    for (u, row) in outer.entries() {
        push_unique(&u, &mut vertices);
        if let Value::Map(row) = &row.value {
            for k in row.borrow().keys() {
                push_unique(&k, &mut vertices);
            }
        }
    }

    let dist = |u: &Binder, v: &Binder| -> Option<f64> {
        let row = outer.get(u)?;
        let Value::Map(row) = &row.value else {
            return None;
        };
        row.borrow().get(v)?.as_f64()
    };

    for u in &vertices {
        for v in &vertices {
            let Some(duv) = dist(u, v) else { continue };
            for k in &vertices {
                if let (Some(duk), Some(dkv)) = (dist(u, k), dist(k, v)) {
                    if duv > duk + dkv {
                        return Ok(false);
                    }
                }
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::map::MapContainer;

    fn map_binder(pairs: Vec<(Binder, Binder)>) -> Binder {
        let mut m = MapContainer::new();
        for (k, v) in pairs {
            m.set(k, v);
        }
        Binder::new(Value::new_map(m), crate::types::Type::Map(
            std::rc::Rc::new(crate::types::Type::Int),
            std::rc::Rc::new(crate::types::Type::Dynamic),
        ))
    }

    #[test]
    fn triangle_inequality_holds_then_breaks() {
        let row1 = map_binder(vec![(Binder::int(1), Binder::int(0)), (Binder::int(2), Binder::int(5)), (Binder::int(3), Binder::int(7))]);
        let row2 = map_binder(vec![(Binder::int(1), Binder::int(5)), (Binder::int(2), Binder::int(0)), (Binder::int(3), Binder::int(3))]);
        let row3 = map_binder(vec![(Binder::int(1), Binder::int(7)), (Binder::int(2), Binder::int(3)), (Binder::int(3), Binder::int(0))]);
        let outer = map_binder(vec![(Binder::int(1), row1), (Binder::int(2), row2), (Binder::int(3), row3)]);
        assert!(triangle_inequality(&outer).unwrap());
        assert!(distance_to_self_zero(&outer).unwrap());

        // flip dist[1][3] to 100
        let row1_bad = map_binder(vec![(Binder::int(1), Binder::int(0)), (Binder::int(2), Binder::int(5)), (Binder::int(3), Binder::int(100))]);
        let row2b = map_binder(vec![(Binder::int(1), Binder::int(5)), (Binder::int(2), Binder::int(0)), (Binder::int(3), Binder::int(3))]);
        let row3b = map_binder(vec![(Binder::int(1), Binder::int(7)), (Binder::int(2), Binder::int(3)), (Binder::int(3), Binder::int(0))]);
        let outer_bad = map_binder(vec![(Binder::int(1), row1_bad), (Binder::int(2), row2b), (Binder::int(3), row3b)]);
        assert!(!triangle_inequality(&outer_bad).unwrap());
    }

    #[test]
    fn negative_cycle_detection() {
        let mut g = Graph::new(true);
        g.add_edge(Binder::int(1), Binder::int(2), Some(&Binder::int(5))).unwrap();
        g.add_edge(Binder::int(2), Binder::int(3), Some(&Binder::int(3))).unwrap();
        g.add_edge(Binder::int(3), Binder::int(1), Some(&Binder::int(-10))).unwrap();
        assert!(!no_negative_cycles(&g).unwrap());

        let mut g2 = Graph::new(true);
        g2.add_edge(Binder::int(1), Binder::int(2), Some(&Binder::int(5))).unwrap();
        g2.add_edge(Binder::int(2), Binder::int(3), Some(&Binder::int(3))).unwrap();
        g2.add_edge(Binder::int(3), Binder::int(1), Some(&Binder::int(10))).unwrap();
        assert!(no_negative_cycles(&g2).unwrap());
    }
}
