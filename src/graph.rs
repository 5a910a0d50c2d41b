//! Dataset-level lineage graph.
//!
//! Edges point from a derived dataset to what it reads (`target -> source`),
//! so walking them upstream yields ancestors and walking them in reverse
//! yields descendants.

use std::collections::{HashSet, VecDeque};
use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::lineage::{EdgeSource, LineageEdge};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Node {
    Dataset(String),
    File(String),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Dataset(name) | Node::File(name) => name,
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<&EdgeSource> for Node {
    fn from(source: &EdgeSource) -> Self {
        match source {
            EdgeSource::Dataset(name) => Node::Dataset(name.clone()),
            EdgeSource::File(path) => Node::File(path.clone()),
        }
    }
}

fn target_node(edge: &LineageEdge) -> Option<Node> {
    edge.target.as_ref().map(|target| Node::Dataset(target.clone()))
}

/// A circular dependency, listed in edge direction starting from its smallest node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub nodes: Vec<Node>,
}

impl Cycle {
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    nodes: IndexSet<Node>,
    edges: IndexSet<LineageEdge>,
    upstream: IndexMap<Node, IndexSet<Node>>,
    downstream: IndexMap<Node, IndexSet<Node>>,
}

pub fn build(edges: impl IntoIterator<Item = LineageEdge>) -> LineageGraph {
    let mut graph = LineageGraph::default();
    graph.merge(edges);
    graph
}

impl LineageGraph {
    /// Adds a batch of edges. Edges already present are ignored, so merging
    /// the same batch twice leaves the graph unchanged.
    pub fn merge(&mut self, edges: impl IntoIterator<Item = LineageEdge>) {
        for edge in edges {
            if self.edges.contains(&edge) {
                continue;
            }
            let source = Node::from(&edge.source);
            if let Some(target) = target_node(&edge) {
                self.nodes.insert(target.clone());
                self.nodes.insert(source.clone());
                self.upstream
                    .entry(target.clone())
                    .or_default()
                    .insert(source.clone());
                self.downstream.entry(source).or_default().insert(target);
            } else {
                self.nodes.insert(source);
            }
            self.edges.insert(edge);
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &LineageEdge> {
        self.edges.iter()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.contains(node)
    }

    /// Edges in which `node` is either the target or the source.
    pub fn edges_for(&self, node: &Node) -> Vec<&LineageEdge> {
        self.edges
            .iter()
            .filter(|edge| {
                target_node(edge).as_ref() == Some(node) || Node::from(&edge.source) == *node
            })
            .collect()
    }

    /// Everything `node` is transitively derived from, up to `max_depth` hops.
    pub fn ancestors_of(&self, node: &Node, max_depth: usize) -> Vec<Node> {
        Self::traverse(&self.upstream, node, max_depth)
    }

    /// Everything transitively derived from `node`, up to `max_depth` hops.
    pub fn descendants_of(&self, node: &Node, max_depth: usize) -> Vec<Node> {
        Self::traverse(&self.downstream, node, max_depth)
    }

    fn traverse(
        adjacency: &IndexMap<Node, IndexSet<Node>>,
        start: &Node,
        max_depth: usize,
    ) -> Vec<Node> {
        let mut visited: HashSet<&Node> = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = vec![];

        visited.insert(start);
        queue.push_back((start, 0));
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(next_nodes) = adjacency.get(node) else {
                continue;
            };
            for next in next_nodes {
                if visited.insert(next) {
                    result.push(next.clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }
        result
    }

    fn adjacency_indices(&self) -> Vec<Vec<usize>> {
        self.nodes
            .iter()
            .map(|node| {
                self.upstream
                    .get(node)
                    .map(|sources| {
                        sources
                            .iter()
                            .filter_map(|source| self.nodes.get_index_of(source))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }

    // Iterative Tarjan, so deep chains cannot overflow the call stack.
    fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
        const UNVISITED: usize = usize::MAX;
        let n = adjacency.len();
        let mut index = vec![UNVISITED; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = vec![];
        let mut next_index = 0;
        let mut components = vec![];

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            let mut call_stack = vec![(root, 0)];

            while let Some(&(v, child)) = call_stack.last() {
                if child < adjacency[v].len() {
                    if let Some(frame) = call_stack.last_mut() {
                        frame.1 += 1;
                    }
                    let w = adjacency[v][child];
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call_stack.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w]);
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    let mut component = vec![];
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
        components
    }

    /// Shortest cycle of two or more nodes through the smallest node of a
    /// strongly connected component.
    fn shortest_cycle(&self, adjacency: &[Vec<usize>], component: &[usize]) -> Option<Cycle> {
        let members: HashSet<usize> = component.iter().copied().collect();
        let start = *component
            .iter()
            .min_by(|a, b| self.nodes[**a].cmp(&self.nodes[**b]))?;

        let mut parent: IndexMap<usize, usize> = IndexMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for &w in &adjacency[v] {
                if w == v {
                    continue;
                }
                if w == start {
                    let mut path = vec![v];
                    let mut curr = v;
                    while curr != start {
                        curr = parent[&curr];
                        path.push(curr);
                    }
                    path.reverse();
                    return Some(Cycle {
                        nodes: path.into_iter().map(|i| self.nodes[i].clone()).collect(),
                    });
                }
                if members.contains(&w) && !parent.contains_key(&w) {
                    parent.insert(w, v);
                    queue.push_back(w);
                }
            }
        }
        None
    }

    /// Independent circular dependencies: every self-referencing dataset, plus
    /// the shortest cycle of each larger strongly connected component.
    /// Cycles are reported, never rejected.
    pub fn cycles(&self) -> Vec<Cycle> {
        let adjacency = self.adjacency_indices();
        let mut cycles = vec![];
        for component in Self::strongly_connected_components(&adjacency) {
            for &v in &component {
                if adjacency[v].contains(&v) {
                    cycles.push(Cycle {
                        nodes: vec![self.nodes[v].clone()],
                    });
                }
            }
            if component.len() > 1 {
                cycles.extend(self.shortest_cycle(&adjacency, &component));
            }
        }
        cycles.sort_by(|a, b| a.nodes.cmp(&b.nodes));
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(target: &str, source: &str) -> LineageEdge {
        LineageEdge::from_dataset(Some(target), source, "f.sas")
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|node| node.name()).collect()
    }

    #[test]
    fn three_node_cycle() {
        let graph = build(vec![edge("a", "b"), edge("b", "c"), edge("c", "a")]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = build(vec![edge("a", "a"), edge("b", "a")]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].names(), vec!["a"]);
    }

    #[test]
    fn self_loop_does_not_hide_larger_cycle() {
        let graph = build(vec![edge("a", "a"), edge("a", "b"), edge("b", "a")]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].names(), vec!["a"]);
        assert_eq!(cycles[1].names(), vec!["a", "b"]);
    }

    #[test]
    fn minimal_cycle_inside_component() {
        // b -> a closes a shorter loop than a -> b -> c -> a
        let graph = build(vec![
            edge("a", "b"),
            edge("b", "c"),
            edge("c", "a"),
            edge("b", "a"),
        ]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].names(), vec!["a", "b"]);
    }

    #[test]
    fn independent_cycles_are_reported_separately() {
        let graph = build(vec![
            edge("x", "y"),
            edge("y", "x"),
            edge("a", "b"),
            edge("b", "a"),
            edge("b", "x"),
        ]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].names(), vec!["a", "b"]);
        assert_eq!(cycles[1].names(), vec!["x", "y"]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = build(vec![edge("a", "b"), edge("b", "c"), edge("a", "c")]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn merge_deduplicates() {
        let mut graph = build(vec![edge("a", "b")]);
        graph.merge(vec![edge("a", "b"), edge("a", "b")]);
        assert_eq!(graph.edges().count(), 1);
        graph.merge(vec![LineageEdge::from_dataset(Some("a"), "b", "other.sas")]);
        assert_eq!(graph.edges().count(), 2);
        assert_eq!(graph.nodes().count(), 2);
    }

    #[test]
    fn traversal_respects_depth() {
        let graph = build(vec![
            edge("d", "c"),
            edge("c", "b"),
            edge("b", "a"),
            LineageEdge::from_file(Some("a"), "raw.csv", "f.sas"),
        ]);
        let d = Node::Dataset("d".to_owned());
        assert_eq!(names(&graph.ancestors_of(&d, 1)), vec!["c"]);
        assert_eq!(names(&graph.ancestors_of(&d, 10)), vec!["c", "b", "a", "raw.csv"]);
        assert!(graph.ancestors_of(&d, 0).is_empty());

        let raw = Node::File("raw.csv".to_owned());
        assert_eq!(names(&graph.descendants_of(&raw, 2)), vec!["a", "b"]);
        assert!(graph.descendants_of(&d, 5).is_empty());
    }

    #[test]
    fn traversal_terminates_on_cycles() {
        let graph = build(vec![edge("a", "b"), edge("b", "a")]);
        let a = Node::Dataset("a".to_owned());
        assert_eq!(names(&graph.ancestors_of(&a, usize::MAX)), vec!["b"]);
    }

    #[test]
    fn edges_for_matches_both_ends() {
        let graph = build(vec![
            edge("a", "b"),
            edge("b", "c"),
            LineageEdge::from_dataset(None, "b", "f.sas"),
        ]);
        let b = Node::Dataset("b".to_owned());
        assert_eq!(graph.edges_for(&b).len(), 3);
        let file = Node::File("b".to_owned());
        assert!(graph.edges_for(&file).is_empty());
    }
}
