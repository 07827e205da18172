//! Overlay graph statistics
//!
//! Pure functions over a snapshot of the directed "knows" graph formed by the
//! node caches: in-degree distribution, clustering, path lengths and
//! partitioning. Links to peers that are not part of the snapshot (crashed or
//! departed nodes) are dead links; they are counted but never followed.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;

use crate::sh_interface::{Linkable, PeerId};

/// Directed overlay graph: every live node and the peers in its cache
#[derive(Debug, Clone, Default)]
pub struct OverlayGraph {
    adjacency: IndexMap<PeerId, Vec<PeerId>>,
}

/// min / max / mean / standard deviation of a distribution
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub min: usize,
    pub max: usize,
    pub avg: f64,
    pub stddev: f64,
}

impl Summary {
    pub fn of(values: &[usize]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let avg = values.iter().sum::<usize>() as f64 / n;
        let variance = values
            .iter()
            .map(|&v| (v as f64 - avg).powi(2))
            .sum::<f64>()
            / n;

        Self {
            min: values.iter().copied().min().unwrap_or(0),
            max: values.iter().copied().max().unwrap_or(0),
            avg,
            stddev: variance.sqrt(),
        }
    }
}

impl OverlayGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes<'a, L, I>(nodes: I) -> Self
    where
        L: Linkable + 'a,
        I: IntoIterator<Item = (PeerId, &'a L)>,
    {
        let mut graph = Self::new();
        for (id, node) in nodes {
            let neighbors = (0..node.degree())
                .filter_map(|i| node.neighbor_at(i))
                .collect();
            graph.insert(id, neighbors);
        }
        graph
    }

    pub fn insert(&mut self, node: PeerId, neighbors: Vec<PeerId>) {
        self.adjacency.insert(node, neighbors);
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn is_live(&self, peer: PeerId) -> bool {
        self.adjacency.contains_key(&peer)
    }

    fn live_neighbors(&self, node: PeerId) -> impl Iterator<Item = PeerId> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |p| self.is_live(*p))
    }

    pub fn out_degrees(&self) -> Vec<usize> {
        self.adjacency.values().map(|n| n.len()).collect()
    }

    /// In-degree of every live node, in snapshot order
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut counts: HashMap<PeerId, usize> = HashMap::new();
        for neighbors in self.adjacency.values() {
            for &p in neighbors {
                *counts.entry(p).or_default() += 1;
            }
        }
        self.adjacency
            .keys()
            .map(|id| counts.get(id).copied().unwrap_or(0))
            .collect()
    }

    /// Histogram of in-degrees: `(in_degree, number_of_nodes)`, ascending
    pub fn in_degree_histogram(&self) -> Vec<(usize, usize)> {
        let mut histogram: HashMap<usize, usize> = HashMap::new();
        for d in self.in_degrees() {
            *histogram.entry(d).or_default() += 1;
        }
        let mut sorted: Vec<(usize, usize)> = histogram.into_iter().collect();
        sorted.sort_unstable();
        sorted
    }

    pub fn dead_links(&self) -> usize {
        self.adjacency
            .values()
            .flatten()
            .filter(|p| !self.is_live(**p))
            .count()
    }

    pub fn dead_link_fraction(&self) -> f64 {
        let total: usize = self.adjacency.values().map(|n| n.len()).sum();
        if total == 0 {
            return 0.0;
        }
        self.dead_links() as f64 / total as f64
    }

    fn undirected(&self) -> HashMap<PeerId, HashSet<PeerId>> {
        let mut undirected: HashMap<PeerId, HashSet<PeerId>> = self
            .adjacency
            .keys()
            .map(|&id| (id, HashSet::new()))
            .collect();

        for &node in self.adjacency.keys() {
            for p in self.live_neighbors(node) {
                if p == node {
                    continue;
                }
                undirected.entry(node).or_default().insert(p);
                undirected.entry(p).or_default().insert(node);
            }
        }
        undirected
    }

    /// Average local clustering coefficient of the undirected overlay.
    /// Nodes with fewer than two neighbors count as 0.
    pub fn clustering_coefficient(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let undirected = self.undirected();

        let total: f64 = self
            .adjacency
            .keys()
            .map(|id| {
                let Some(neighbors) = undirected.get(id) else {
                    return 0.0;
                };
                let k = neighbors.len();
                if k < 2 {
                    return 0.0;
                }
                let mut links = 0usize;
                for a in neighbors {
                    for b in neighbors {
                        if a < b && undirected.get(a).is_some_and(|n| n.contains(b)) {
                            links += 1;
                        }
                    }
                }
                links as f64 / (k * (k - 1) / 2) as f64
            })
            .sum();

        total / self.len() as f64
    }

    /// Hop distance from `source` to every node it can reach along cache links
    pub fn distances_from(&self, source: PeerId) -> HashMap<PeerId, usize> {
        let mut distances = HashMap::new();
        if !self.is_live(source) {
            return distances;
        }
        let mut queue = VecDeque::new();
        distances.insert(source, 0);
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            let d = distances[&node];
            for p in self.live_neighbors(node) {
                if !distances.contains_key(&p) {
                    distances.insert(p, d + 1);
                    queue.push_back(p);
                }
            }
        }
        distances
    }

    /// Mean directed shortest-path length from `sources` to every node they
    /// reach. Unreachable pairs are left out; `None` if no pair is reachable.
    pub fn average_path_length(&self, sources: &[PeerId]) -> Option<f64> {
        let mut total = 0usize;
        let mut pairs = 0usize;
        for &source in sources {
            for (&target, &d) in &self.distances_from(source) {
                if target != source {
                    total += d;
                    pairs += 1;
                }
            }
        }
        if pairs == 0 {
            None
        } else {
            Some(total as f64 / pairs as f64)
        }
    }

    /// Sizes of the weakly connected components, largest first
    pub fn weak_components(&self) -> Vec<usize> {
        let undirected = self.undirected();
        let mut seen: HashSet<PeerId> = HashSet::new();
        let mut sizes = Vec::new();

        for &start in self.adjacency.keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut size = 0;
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                size += 1;
                for &p in undirected.get(&node).into_iter().flatten() {
                    if seen.insert(p) {
                        queue.push_back(p);
                    }
                }
            }
            sizes.push(size);
        }

        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }

    pub fn largest_component_fraction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let largest = self.weak_components().first().copied().unwrap_or(0);
        largest as f64 / self.len() as f64
    }

    pub fn is_partitioned(&self) -> bool {
        self.weak_components().len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(PeerId, &[PeerId])]) -> OverlayGraph {
        let mut g = OverlayGraph::new();
        for (node, neighbors) in edges {
            g.insert(*node, neighbors.to_vec());
        }
        g
    }

    #[test]
    fn test_summary() {
        let s = Summary::of(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(s.min, 2);
        assert_eq!(s.max, 9);
        assert!((s.avg - 5.0).abs() < 1e-9);
        assert!((s.stddev - 2.0).abs() < 1e-9);
        assert_eq!(Summary::of(&[]), Summary::default());
    }

    #[test]
    fn test_star_in_degrees() {
        let g = graph(&[(0, &[]), (1, &[0]), (2, &[0]), (3, &[0])]);
        assert_eq!(g.in_degrees(), vec![3, 0, 0, 0]);
        assert_eq!(g.in_degree_histogram(), vec![(0, 3), (3, 1)]);
        assert_eq!(g.clustering_coefficient(), 0.0);
        assert!(!g.is_partitioned());
    }

    #[test]
    fn test_triangle_clustering() {
        let g = graph(&[(1, &[2]), (2, &[3]), (3, &[1])]);
        assert!((g.clustering_coefficient() - 1.0).abs() < 1e-9);
        // 1->2 (1), 1->3 (2), 2->3 (1), 2->1 (2), 3->1 (1), 3->2 (2)
        assert_eq!(g.average_path_length(&[1, 2, 3]), Some(1.5));
    }

    #[test]
    fn test_dead_links_are_not_followed() {
        let g = graph(&[(1, &[2, 99]), (2, &[1, 98])]);
        assert_eq!(g.dead_links(), 2);
        assert!((g.dead_link_fraction() - 0.5).abs() < 1e-9);
        assert_eq!(g.distances_from(1).len(), 2);
        assert_eq!(g.in_degrees(), vec![1, 1]);
    }

    #[test]
    fn test_partition_detection() {
        let g = graph(&[(1, &[2]), (2, &[]), (3, &[4]), (4, &[]), (5, &[4])]);
        assert_eq!(g.weak_components(), vec![3, 2]);
        assert!(g.is_partitioned());
        assert!((g.largest_component_fraction() - 0.6).abs() < 1e-9);
        assert_eq!(g.average_path_length(&[2, 4]), None);
    }
}
