//! Index-based adjacency graph built by triangulation.
//!
//! Nodes, circular connection lists and feature links all live in partitioned
//! arenas and reference each other by index; "null" is the [`NIL`] sentinel,
//! never a pointer.

use crate::error::{DtmError, Result};
use crate::feature::FeatureId;
use crate::storage::PartitionedArray;

/// Sentinel index meaning "no point" / "no entry" / "no link".
pub const NIL: usize = usize::MAX;

/// Per-point node: hull chain pointers plus the head of the point's circular
/// list of connections.
#[derive(Debug, Clone)]
pub struct Node {
    /// Next point along the hull, or `NIL` for interior points.
    pub hull_next: usize,
    /// Previous point along the hull.
    pub hull_prev: usize,
    /// Head entry of the circular connection list, or `NIL` if disconnected.
    pub clist: usize,
}

impl Node {
    fn unconnected() -> Self {
        Self { hull_next: NIL, hull_prev: NIL, clist: NIL }
    }
}

/// Entry in a point's circular connection list.
#[derive(Debug, Clone)]
struct ClistEntry {
    /// The connected point.
    to: usize,
    /// Next entry in the same list; wraps back to the head.
    next: usize,
    /// Head of the feature links attached to this directed edge.
    flink: usize,
}

/// Attaches a feature id to a directed edge. Links on edge `from -> to` mean
/// the feature continues from `from` to `to`.
#[derive(Debug, Clone)]
struct FeatureLink {
    feature: FeatureId,
    /// Next link attached to the same edge.
    next: usize,
}

/// The post-triangulation adjacency structure of a model.
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    nodes: PartitionedArray<Node>,
    entries: PartitionedArray<ClistEntry>,
    links: PartitionedArray<FeatureLink>,
    hull_start: usize,
    num_triangles: usize,
}

impl AdjacencyGraph {
    pub fn new(num_points: usize) -> Self {
        let nodes = (0..num_points).map(|_| Node::unconnected()).collect();
        Self {
            nodes,
            entries: PartitionedArray::new(),
            links: PartitionedArray::new(),
            hull_start: NIL,
            num_triangles: 0,
        }
    }

    pub fn num_points(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.num_triangles
    }

    pub fn set_num_triangles(&mut self, n: usize) {
        self.num_triangles = n;
    }

    pub fn node(&self, point: usize) -> Option<&Node> {
        self.nodes.get(point)
    }

    /// Records a directed connection `from -> to`; returns the list entry.
    /// Idempotent for an existing connection.
    pub fn connect(&mut self, from: usize, to: usize) -> usize {
        if let Some(existing) = self.find_entry(from, to) {
            return existing;
        }
        let head = self.nodes[from].clist;
        if head == NIL {
            let entry = self.entries.push(ClistEntry { to, next: NIL, flink: NIL });
            self.entries[entry].next = entry;
            self.nodes[from].clist = entry;
            entry
        } else {
            let entry = self.entries.push(ClistEntry {
                to,
                next: self.entries[head].next,
                flink: NIL,
            });
            self.entries[head].next = entry;
            entry
        }
    }

    fn find_entry(&self, from: usize, to: usize) -> Option<usize> {
        let head = self.nodes.get(from)?.clist;
        if head == NIL {
            return None;
        }
        let mut cur = head;
        loop {
            let e = &self.entries[cur];
            if e.to == to {
                return Some(cur);
            }
            cur = e.next;
            if cur == head {
                return None;
            }
        }
    }

    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        self.find_entry(a, b).is_some()
    }

    /// Points connected to `point`, in list order.
    pub fn neighbors(&self, point: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let head = match self.nodes.get(point) {
            Some(n) if n.clist != NIL => n.clist,
            _ => return out,
        };
        let mut cur = head;
        loop {
            let e = &self.entries[cur];
            out.push(e.to);
            cur = e.next;
            if cur == head {
                break;
            }
        }
        out
    }

    /// Attaches `feature` to the directed edge `from -> to`. The edge must
    /// already exist.
    pub fn add_feature_link(&mut self, from: usize, to: usize, feature: FeatureId) -> Result<()> {
        let entry = self
            .find_entry(from, to)
            .ok_or(DtmError::Consistency("feature link on a missing edge"))?;
        let link = self.links.push(FeatureLink {
            feature,
            next: self.entries[entry].flink,
        });
        self.entries[entry].flink = link;
        Ok(())
    }

    /// The point `feature` continues to from `point`, if any.
    pub fn feature_next(&self, point: usize, feature: FeatureId) -> Option<usize> {
        let head = match self.nodes.get(point) {
            Some(n) if n.clist != NIL => n.clist,
            _ => return None,
        };
        let mut cur = head;
        loop {
            let e = &self.entries[cur];
            let mut link = e.flink;
            while link != NIL {
                let l = &self.links[link];
                if l.feature == feature {
                    return Some(e.to);
                }
                link = l.next;
            }
            cur = e.next;
            if cur == head {
                return None;
            }
        }
    }

    /// Recovers a feature's ordered point sequence by following its links
    /// from `start`. Closed rings terminate when the walk returns to `start`.
    pub fn walk_feature(&self, feature: FeatureId, start: usize) -> Result<Vec<usize>> {
        let mut seq = vec![start];
        let mut cur = start;
        // One hop per stored link is the hard ceiling for a well-formed walk.
        let max_hops = self.links.len() + 1;
        for _ in 0..max_hops {
            match self.feature_next(cur, feature) {
                Some(next) => {
                    seq.push(next);
                    if next == start {
                        return Ok(seq);
                    }
                    cur = next;
                }
                None => return Ok(seq),
            }
        }
        Err(DtmError::Consistency("feature walk did not terminate"))
    }

    /// Installs the hull chain. `chain` lists hull points in order.
    pub fn set_hull(&mut self, chain: &[usize]) {
        if chain.is_empty() {
            return;
        }
        let n = chain.len();
        for i in 0..n {
            let p = chain[i];
            self.nodes[p].hull_next = chain[(i + 1) % n];
            self.nodes[p].hull_prev = chain[(i + n - 1) % n];
        }
        self.hull_start = chain[0];
    }

    /// The hull points in chain order, starting from the stored start point.
    pub fn hull(&self) -> Vec<usize> {
        let mut out = Vec::new();
        if self.hull_start == NIL {
            return out;
        }
        let mut cur = self.hull_start;
        for _ in 0..self.nodes.len() {
            out.push(cur);
            cur = self.nodes[cur].hull_next;
            if cur == self.hull_start || cur == NIL {
                return out;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_idempotent_and_directed() {
        let mut g = AdjacencyGraph::new(4);
        g.connect(0, 1);
        g.connect(0, 1);
        g.connect(0, 2);
        assert_eq!(g.neighbors(0).len(), 2);
        assert!(g.is_connected(0, 1));
        assert!(!g.is_connected(1, 0));
    }

    #[test]
    fn feature_walk_open_chain() {
        let mut g = AdjacencyGraph::new(4);
        let f = FeatureId(7);
        for (a, b) in [(0, 1), (1, 2), (2, 3)] {
            g.connect(a, b);
            g.add_feature_link(a, b, f).unwrap();
        }
        assert_eq!(g.walk_feature(f, 0).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn feature_walk_closed_ring_terminates() {
        let mut g = AdjacencyGraph::new(3);
        let f = FeatureId(1);
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            g.connect(a, b);
            g.add_feature_link(a, b, f).unwrap();
        }
        assert_eq!(g.walk_feature(f, 0).unwrap(), vec![0, 1, 2, 0]);
    }

    #[test]
    fn hull_chain_round_trip() {
        let mut g = AdjacencyGraph::new(5);
        g.set_hull(&[3, 1, 4, 2]);
        assert_eq!(g.hull(), vec![3, 1, 4, 2]);
        assert_eq!(g.node(1).unwrap().hull_prev, 3);
        assert_eq!(g.node(2).unwrap().hull_next, 3);
        assert_eq!(g.node(0).unwrap().hull_next, NIL);
    }
}
