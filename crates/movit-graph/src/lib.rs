#![forbid(unsafe_code)]

//! movit graph storage and edge surgery.
//!
//! This crate is **contract-only**: no GL handles, no effect semantics. It
//! stores an arena of nodes with ordered forward and backward edge lists and
//! provides the primitive rewrites the pipeline compiler is built from.
//!
//! Edge order matters: the order in which `connect` is called on a receiver is
//! the argument order its effect sees (`INPUT1`, `INPUT2`, ...).
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

use std::collections::HashSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: T,
    incoming: Vec<NodeId>,
    outgoing: Vec<NodeId>,
    disabled: bool,
}

/// Arena DAG. Nodes are never removed, only disabled, so ids stay stable.
#[derive(Debug, Clone)]
pub struct Graph<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Graph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever added, disabled ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn add_node(&mut self, value: T) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot {
            value,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            disabled: false,
        });
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.slots.len()
    }

    /// All node ids in insertion order, disabled ones included.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.slots.len() as u32).map(NodeId)
    }

    /// Enabled node ids in insertion order.
    pub fn enabled_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(move |id| !self.slots[id.index()].disabled)
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.slots[id.index()].value
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.slots[id.index()].value
    }

    pub fn incoming(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.index()].incoming
    }

    pub fn outgoing(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.index()].outgoing
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.slots[id.index()].disabled
    }

    /// Mark a node as dead. Its edges are left as they are; callers re-route
    /// them with `replace_sender` / `replace_receiver` first.
    pub fn disable(&mut self, id: NodeId) {
        self.slots[id.index()].disabled = true;
    }

    /// Append the edge `sender -> receiver` to both edge lists.
    pub fn connect(&mut self, sender: NodeId, receiver: NodeId) {
        assert_ne!(sender, receiver, "connect: self-loop on {sender}");
        self.slots[sender.index()].outgoing.push(receiver);
        self.slots[receiver.index()].incoming.push(sender);
    }

    /// Remove every edge `sender -> receiver`.
    pub fn disconnect(&mut self, sender: NodeId, receiver: NodeId) {
        let before = self.slots[sender.index()].outgoing.len();
        self.slots[sender.index()].outgoing.retain(|&r| r != receiver);
        assert!(
            self.slots[sender.index()].outgoing.len() < before,
            "disconnect: no edge {sender} -> {receiver}"
        );
        self.slots[receiver.index()].incoming.retain(|&s| s != sender);
    }

    /// Every edge `(s, old)` becomes `(s, new)`. `new` takes over `old`'s
    /// incoming list wholesale; `old` is left without inputs.
    pub fn replace_receiver(&mut self, old: NodeId, new: NodeId) {
        let incoming = std::mem::take(&mut self.slots[old.index()].incoming);
        for &sender in &incoming {
            for r in self.slots[sender.index()].outgoing.iter_mut() {
                if *r == old {
                    *r = new;
                }
            }
        }
        self.slots[new.index()].incoming = incoming;
    }

    /// Every edge `(old, r)` becomes `(new, r)`. `new` takes over `old`'s
    /// outgoing list wholesale; `old` is left without outputs.
    pub fn replace_sender(&mut self, old: NodeId, new: NodeId) {
        let outgoing = std::mem::take(&mut self.slots[old.index()].outgoing);
        for &receiver in &outgoing {
            for s in self.slots[receiver.index()].incoming.iter_mut() {
                if *s == old {
                    *s = new;
                }
            }
        }
        self.slots[new.index()].outgoing = outgoing;
    }

    /// Divert the edge(s) `sender -> receiver` through `middle`.
    pub fn insert_between(&mut self, sender: NodeId, middle: NodeId, receiver: NodeId) {
        let mut diverted = 0;
        for r in self.slots[sender.index()].outgoing.iter_mut() {
            if *r == receiver {
                *r = middle;
                diverted += 1;
            }
        }
        for _ in 0..diverted {
            self.slots[middle.index()].incoming.push(sender);
        }
        let mut rerouted = 0;
        for s in self.slots[receiver.index()].incoming.iter_mut() {
            if *s == sender {
                *s = middle;
                rerouted += 1;
            }
        }
        for _ in 0..rerouted {
            self.slots[middle.index()].outgoing.push(receiver);
        }
        assert!(
            diverted > 0 && diverted == rerouted,
            "insert_between: no edge {sender} -> {receiver}"
        );
    }

    /// Enabled nodes without outgoing edges.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.enabled_ids()
            .filter(|id| self.slots[id.index()].outgoing.is_empty())
            .collect()
    }

    /// Topologically sort `subset` (senders before receivers).
    ///
    /// Depth-first over outgoing edges, restricted to `subset`, emitting
    /// reverse postorder. The result is deterministic for a given subset order.
    pub fn topological_sort(&self, subset: &[NodeId]) -> Vec<NodeId> {
        let mut left: HashSet<NodeId> = subset.iter().copied().collect();
        let mut postorder = Vec::with_capacity(subset.len());
        for &id in subset {
            self.visit(id, &mut left, &mut postorder);
        }
        postorder.reverse();
        postorder
    }

    fn visit(&self, id: NodeId, left: &mut HashSet<NodeId>, postorder: &mut Vec<NodeId>) {
        if !left.remove(&id) {
            return;
        }
        for &next in &self.slots[id.index()].outgoing {
            self.visit(next, left, postorder);
        }
        postorder.push(id);
    }

    /// Render the enabled part of the graph in Graphviz DOT.
    pub fn to_dot<N, E>(&self, node_label: N, edge_label: E) -> String
    where
        N: Fn(NodeId, &T) -> String,
        E: Fn(NodeId, NodeId, &T) -> String,
    {
        let mut out = String::from("digraph G {\n");
        out.push_str("  output [shape=box label=\"(output)\"];\n");
        for id in self.enabled_ids() {
            let _ = writeln!(
                out,
                "  {id} [label=\"{}\"];",
                escape(&node_label(id, self.get(id)))
            );
        }
        for id in self.enabled_ids() {
            let slot = &self.slots[id.index()];
            for &to in &slot.outgoing {
                let label = edge_label(id, to, &slot.value);
                if label.is_empty() {
                    let _ = writeln!(out, "  {id} -> {to};");
                } else {
                    let _ = writeln!(out, "  {id} -> {to} [label=\"{}\"];", escape(&label));
                }
            }
            if slot.outgoing.is_empty() {
                let _ = writeln!(out, "  {id} -> output;");
            }
        }
        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain3() -> (Graph<&'static str>, NodeId, NodeId, NodeId) {
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.connect(a, b);
        g.connect(b, c);
        (g, a, b, c)
    }

    #[test]
    fn connect_preserves_argument_order() {
        let mut g = Graph::new();
        let x = g.add_node("x");
        let y = g.add_node("y");
        let mix = g.add_node("mix");
        g.connect(y, mix);
        g.connect(x, mix);
        assert_eq!(g.incoming(mix), &[y, x]);
        assert_eq!(g.outgoing(x), &[mix]);
    }

    #[test]
    fn topological_sort_puts_senders_first() {
        let (g, a, b, c) = chain3();
        assert_eq!(g.topological_sort(&[c, b, a]), vec![a, b, c]);
        assert_eq!(g.topological_sort(&[a, b, c]), vec![a, b, c]);
    }

    #[test]
    fn topological_sort_is_restricted_to_subset() {
        let (g, a, _b, c) = chain3();
        let sorted = g.topological_sort(&[c, a]);
        assert_eq!(sorted.len(), 2);
        assert!(sorted.contains(&a) && sorted.contains(&c));
    }

    #[test]
    fn topological_sort_handles_diamonds() {
        let mut g = Graph::new();
        let src = g.add_node("src");
        let l = g.add_node("l");
        let r = g.add_node("r");
        let join = g.add_node("join");
        g.connect(src, l);
        g.connect(src, r);
        g.connect(l, join);
        g.connect(r, join);
        let sorted = g.topological_sort(&[join, r, l, src]);
        let pos = |n| sorted.iter().position(|&x| x == n).unwrap();
        assert_eq!(pos(src), 0);
        assert!(pos(l) < pos(join));
        assert!(pos(r) < pos(join));
    }

    #[test]
    fn replace_sender_moves_all_outgoing_edges() {
        let mut g = Graph::new();
        let input = g.add_node("in");
        let u1 = g.add_node("u1");
        let u2 = g.add_node("u2");
        g.connect(input, u1);
        g.connect(input, u2);

        let conv = g.add_node("conv");
        g.replace_sender(input, conv);
        g.connect(input, conv);

        assert_eq!(g.outgoing(input), &[conv]);
        assert_eq!(g.outgoing(conv), &[u1, u2]);
        assert_eq!(g.incoming(u1), &[conv]);
        assert_eq!(g.incoming(u2), &[conv]);
        assert_eq!(g.incoming(conv), &[input]);
    }

    #[test]
    fn replace_receiver_moves_all_incoming_edges() {
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let old = g.add_node("old");
        let new = g.add_node("new");
        g.connect(a, old);
        g.connect(b, old);
        g.replace_receiver(old, new);
        assert!(g.incoming(old).is_empty());
        assert_eq!(g.incoming(new), &[a, b]);
        assert_eq!(g.outgoing(a), &[new]);
    }

    #[test]
    fn insert_between_diverts_only_that_edge() {
        let mut g = Graph::new();
        let s = g.add_node("s");
        let r1 = g.add_node("r1");
        let r2 = g.add_node("r2");
        g.connect(s, r1);
        g.connect(s, r2);
        let mid = g.add_node("mid");
        g.insert_between(s, mid, r1);
        assert_eq!(g.outgoing(s), &[mid, r2]);
        assert_eq!(g.incoming(mid), &[s]);
        assert_eq!(g.outgoing(mid), &[r1]);
        assert_eq!(g.incoming(r1), &[mid]);
        assert_eq!(g.incoming(r2), &[s]);
    }

    #[test]
    #[should_panic(expected = "insert_between")]
    fn insert_between_requires_existing_edge() {
        let mut g = Graph::new();
        let s = g.add_node("s");
        let r = g.add_node("r");
        let mid = g.add_node("mid");
        g.insert_between(s, mid, r);
    }

    #[test]
    fn disconnect_drops_both_directions() {
        let (mut g, a, b, c) = chain3();
        g.disconnect(b, c);
        assert!(g.outgoing(b).is_empty());
        assert!(g.incoming(c).is_empty());
        assert_eq!(g.incoming(b), &[a]);
        assert_eq!(g.sinks(), vec![b, c]);
    }

    #[test]
    fn sinks_ignore_disabled_nodes() {
        let (mut g, _, _, c) = chain3();
        assert_eq!(g.sinks(), vec![c]);
        g.disable(c);
        assert!(g.sinks().is_empty());
        assert_eq!(g.enabled_ids().count(), 2);
    }

    #[test]
    fn dot_lists_edges_and_output() {
        let (g, ..) = chain3();
        let dot = g.to_dot(|_, v| v.to_string(), |_, _, _| String::new());
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n2 -> output;"));
        assert!(dot.contains("label=\"b\""));
    }
}
