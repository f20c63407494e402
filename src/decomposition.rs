use std::collections::HashMap;

use crate::util::NaturalOrInfinite;
use crate::working_graph::NodeId;

/// A rooted snapshot of a terminal spanning tree, with compact indices
/// `0..len()` (the root is index 0). Built once per reduction rule invocation
/// and discarded afterwards; never mutated after construction.
pub struct SpanningTree {
    nodes: Vec<NodeId>,
    index_of: HashMap<NodeId, usize>,
    parent: Vec<Option<usize>>,
    parent_weight: Vec<u64>,
    children: Vec<Vec<usize>>,
    terminal: Vec<bool>,
}

impl SpanningTree {
    pub fn with_root(root: NodeId, is_terminal: bool) -> Self {
        SpanningTree {
            nodes: vec![root],
            index_of: HashMap::from([(root, 0)]),
            parent: vec![None],
            parent_weight: vec![0],
            children: vec![Vec::new()],
            terminal: vec![is_terminal],
        }
    }

    /// Attach `child` below the already-present `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, weight: u64, is_terminal: bool) {
        let p = self.index_of[&parent];
        debug_assert!(!self.index_of.contains_key(&child));
        let c = self.nodes.len();
        self.nodes.push(child);
        self.index_of.insert(child, c);
        self.parent.push(Some(p));
        self.parent_weight.push(weight);
        self.children.push(Vec::new());
        self.terminal.push(is_terminal);
        self.children[p].push(c);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false // there is always a root
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, index: usize) -> NodeId {
        self.nodes[index]
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.index_of.get(&node).copied()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.index_of.contains_key(&node)
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parent[index]
    }

    /// Weight of the edge towards the parent; 0 for the root.
    pub fn parent_weight(&self, index: usize) -> u64 {
        self.parent_weight[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        self.terminal[index]
    }
}

/// Iterative max segment tree over `u64` values.
struct SegmentTree {
    size: usize,
    data: Vec<u64>,
}

impl SegmentTree {
    fn build(values: &[u64]) -> Self {
        let size = values.len().next_power_of_two().max(1);
        let mut data = vec![0; 2 * size];
        data[size..size + values.len()].copy_from_slice(values);
        for i in (1..size).rev() {
            data[i] = data[2 * i].max(data[2 * i + 1]);
        }
        SegmentTree { size, data }
    }

    /// Max over the inclusive index range `[l, r]`.
    fn query(&self, l: usize, r: usize) -> u64 {
        debug_assert!(l <= r && r < self.size);
        let mut res = 0;
        let mut l = l + self.size;
        let mut r = r + self.size + 1;
        while l < r {
            if l & 1 == 1 {
                res = res.max(self.data[l]);
                l += 1;
            }
            if r & 1 == 1 {
                r -= 1;
                res = res.max(self.data[r]);
            }
            l >>= 1;
            r >>= 1;
        }
        res
    }
}

struct Chain {
    /// Tree indices, root-to-leaf order.
    nodes: Vec<usize>,
    /// The tree node the chain head hangs off of (`None` for the root chain).
    parent_attach: Option<usize>,
    /// `prefix_max[i]` = max gap value over `nodes[0..=i]`.
    prefix_max: Vec<u64>,
    /// Max segment tree over the same gap values, for ranges not anchored at
    /// the chain head.
    seg: SegmentTree,
    /// Positions (into `nodes`) of terminals, ascending (shallow first).
    terminal_positions: Vec<usize>,
}

/// Heavy path decomposition of a terminal spanning tree.
///
/// The per-node "gap value" is the distance from the node to its closest
/// Steiner (terminal) ancestor, terminals included (a terminal's gap value is
/// the length of the terminal-free stretch above it). Together with per-chain
/// prefix maxima and segment trees this answers bottleneck Steiner distance
/// queries in logarithmic time.
pub struct HeavyPathDecomposition<'a> {
    tree: &'a SpanningTree,
    depth: Vec<u32>,
    dist_root: Vec<u64>,
    chain: Vec<usize>,
    pos: Vec<usize>,
    chains: Vec<Chain>,
}

impl<'a> HeavyPathDecomposition<'a> {
    pub fn build(tree: &'a SpanningTree) -> Self {
        assert!(
            tree.is_terminal(tree.root()),
            "decomposition requires a terminal root"
        );
        let n = tree.len();
        // preorder traversal (parents before children)
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![tree.root()];
        while let Some(v) = stack.pop() {
            order.push(v);
            stack.extend(tree.children(v));
        }
        let mut subtree = vec![1u32; n];
        for &v in order.iter().rev() {
            for &c in tree.children(v) {
                subtree[v] += subtree[c];
            }
        }
        let mut depth = vec![0u32; n];
        let mut dist_root = vec![0u64; n];
        // distance from a node to its closest strict terminal ancestor
        let mut gap = vec![0u64; n];
        for &v in &order {
            if let Some(p) = tree.parent(v) {
                depth[v] = depth[p] + 1;
                dist_root[v] = dist_root[p] + tree.parent_weight(v);
                gap[v] = tree.parent_weight(v)
                    + if tree.is_terminal(p) { 0 } else { gap[p] };
            }
        }
        let heavy: Vec<Option<usize>> = (0..n)
            .map(|v| {
                tree.children(v)
                    .iter()
                    .copied()
                    .max_by_key(|&c| subtree[c])
            })
            .collect();
        let mut chain = vec![usize::MAX; n];
        let mut pos = vec![0usize; n];
        let mut chains = Vec::new();
        for &head in &order {
            let is_head = match tree.parent(head) {
                None => true,
                Some(p) => heavy[p] != Some(head),
            };
            if !is_head {
                continue;
            }
            let id = chains.len();
            let mut nodes = Vec::new();
            let mut v = head;
            loop {
                chain[v] = id;
                pos[v] = nodes.len();
                nodes.push(v);
                match heavy[v] {
                    Some(h) => v = h,
                    None => break,
                }
            }
            let values: Vec<u64> = nodes.iter().map(|&v| gap[v]).collect();
            let mut prefix_max = values.clone();
            for i in 1..prefix_max.len() {
                prefix_max[i] = prefix_max[i].max(prefix_max[i - 1]);
            }
            let terminal_positions = nodes
                .iter()
                .enumerate()
                .filter(|&(_, &v)| tree.is_terminal(v))
                .map(|(i, _)| i)
                .collect();
            chains.push(Chain {
                parent_attach: tree.parent(head),
                seg: SegmentTree::build(&values),
                prefix_max,
                terminal_positions,
                nodes,
            });
        }
        HeavyPathDecomposition {
            tree,
            depth,
            dist_root,
            chain,
            pos,
            chains,
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.contains(node)
    }

    pub fn lowest_common_ancestor(&self, x: NodeId, y: NodeId) -> Option<NodeId> {
        let a = self.tree.index_of(x)?;
        let b = self.tree.index_of(y)?;
        Some(self.tree.node(self.lca_idx(a, b)))
    }

    /// The bottleneck Steiner distance between two tree nodes: the maximum
    /// terminal-free stretch on the tree path between them, where the
    /// endpoints themselves also delimit stretches. `None` if either node is
    /// not part of the tree.
    pub fn bottleneck_steiner_distance(&self, x: NodeId, y: NodeId) -> Option<NaturalOrInfinite> {
        let a = self.tree.index_of(x)?;
        let b = self.tree.index_of(y)?;
        if a == b {
            return Some(0.into());
        }
        let l = self.lca_idx(a, b);
        let (inner_a, cross_a) = self.branch(a, l);
        let (inner_b, cross_b) = self.branch(b, l);
        Some(NaturalOrInfinite::from_finite(
            inner_a.max(inner_b).max(cross_a + cross_b),
        ))
    }

    fn lca_idx(&self, mut a: usize, mut b: usize) -> usize {
        while self.chain[a] != self.chain[b] {
            // jump the node whose chain attaches at the deeper level
            let head_a = self.chains[self.chain[a]].nodes[0];
            let head_b = self.chains[self.chain[b]].nodes[0];
            if self.depth[head_a] >= self.depth[head_b] {
                a = self.chains[self.chain[a]]
                    .parent_attach
                    .expect("chain walk escaped the root");
            } else {
                b = self.chains[self.chain[b]]
                    .parent_attach
                    .expect("chain walk escaped the root");
            }
        }
        if self.depth[a] <= self.depth[b] {
            a
        } else {
            b
        }
    }

    /// For the branch from `v` up to its ancestor `l`: the maximum gap lying
    /// entirely below the shallowest terminal of the branch, and the residual
    /// distance from that terminal up to `l` (the branch's share of the gap
    /// that crosses `l`). With no terminal on the branch the whole branch is
    /// residual.
    fn branch(&self, v: usize, l: usize) -> (u64, u64) {
        if v == l {
            return (0, 0);
        }
        let mut shallowest_terminal = None;
        let mut cur = v;
        loop {
            let c = self.chain[cur];
            let low = self.pos[cur];
            let high = if self.chain[l] == c { self.pos[l] } else { 0 };
            let terms = &self.chains[c].terminal_positions;
            let i = terms.partition_point(|&p| p < high);
            if i < terms.len() && terms[i] <= low {
                shallowest_terminal = Some(self.chains[c].nodes[terms[i]]);
            }
            if self.chain[l] == c {
                break;
            }
            cur = self.chains[c]
                .parent_attach
                .expect("branch walk escaped the root");
        }
        match shallowest_terminal {
            None => (0, self.dist_root[v] - self.dist_root[l]),
            Some(t) => (
                self.path_max_below(v, t),
                self.dist_root[t] - self.dist_root[l],
            ),
        }
    }

    /// Maximum gap value over the path `[v .. t)`, `t` excluded (`t`'s own gap
    /// value reaches above `t`).
    fn path_max_below(&self, v: usize, t: usize) -> u64 {
        let mut best = 0;
        let mut cur = v;
        while self.chain[cur] != self.chain[t] {
            let c = self.chain[cur];
            best = best.max(self.chains[c].prefix_max[self.pos[cur]]);
            cur = self.chains[c]
                .parent_attach
                .expect("path walk escaped the root");
        }
        if cur != t {
            best = best.max(self.range_max(self.chain[cur], self.pos[t] + 1, self.pos[cur]));
        }
        best
    }

    /// Max gap value over chain positions `[lo, hi]`, using the prefix-max
    /// array when the range is anchored at the chain head and the segment
    /// tree otherwise.
    fn range_max(&self, chain: usize, lo: usize, hi: usize) -> u64 {
        if lo > hi {
            return 0;
        }
        if lo == 0 {
            self.chains[chain].prefix_max[hi]
        } else {
            self.chains[chain].seg.query(lo, hi)
        }
    }
}
