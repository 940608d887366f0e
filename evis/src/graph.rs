//! A symmetric adjacency graph over arbitrary keys.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub struct Graph<K: Eq + Hash + Clone> {
    edges: HashMap<K, HashSet<K>>,
}

impl<K: Eq + Hash + Clone> Graph<K> {
    pub fn new() -> Graph<K> {
        Graph {
            edges: HashMap::new(),
        }
    }

    /// Ensure a node exists.
    pub fn insert(&mut self, key: K) {
        self.edges.entry(key).or_insert_with(HashSet::new);
    }

    /// Connect two keys in both directions.
    pub fn insert_symmetric(&mut self, a: K, b: K) {
        self.edges
            .entry(a.clone())
            .or_insert_with(HashSet::new)
            .insert(b.clone());
        self.edges.entry(b).or_insert_with(HashSet::new).insert(a);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.edges.contains_key(key)
    }

    pub fn neighbours(&self, key: &K) -> Vec<K> {
        match self.edges.get(key) {
            Some(neighbours) => neighbours.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for Graph<K> {
    fn default() -> Graph<K> {
        Graph::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn edges_are_symmetric() {
        let mut graph = Graph::new();
        graph.insert_symmetric(("a", 1), ("b", 2));
        assert!(graph.neighbours(&("a", 1)).contains(&("b", 2)));
        assert!(graph.neighbours(&("b", 2)).contains(&("a", 1)));
    }

    #[test]
    fn missing_keys_have_no_neighbours() {
        let graph: Graph<(&str, i32)> = Graph::new();
        assert!(graph.neighbours(&("a", 1)).is_empty());
    }
}
