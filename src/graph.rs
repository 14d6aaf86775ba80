use fixedbitset::FixedBitSet;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn to_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "nd#{}", self.0)
    }
}

// Successors are None only while the lowering pass is wiring the graph.
pub enum Node<M, C> {
    // straight-line run of mutations with a single successor
    Basic {
        mutations: Vec<M>,
        coda: Option<NodeId>,
    },

    // two-way conditional, destinations may coincide or point back at it
    Branch {
        condition: C,
        true_dest: Option<NodeId>,
        false_dest: Option<NodeId>,
    },

    // terminal node, no successors
    Return,
}

// Dense arena of nodes, edges are plain indices. Slots left behind by
// dropped constructs are never reachable from the entry.
pub struct Program<M, C> {
    nodes: Vec<Node<M, C>>,
    entry: NodeId,
    ret: NodeId,
}

impl<M, C> Program<M, C> {
    pub(crate) fn new(nodes: Vec<Node<M, C>>, entry: NodeId, ret: NodeId) -> Program<M, C> {
        Program { nodes, entry, ret }
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn ret(&self) -> NodeId {
        self.ret
    }

    pub fn node(&self, id: NodeId) -> &Node<M, C> {
        &self.nodes[id.0]
    }

    // number of arena slots, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    // true iff the entry is the terminal
    pub fn is_empty(&self) -> bool {
        self.entry == self.ret
    }

    // in coda or (true, false) order
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes[id.0] {
            Node::Basic { coda, .. } => coda.into_iter().collect(),
            Node::Branch {
                true_dest,
                false_dest,
                ..
            } => true_dest.into_iter().chain(false_dest).collect(),
            Node::Return => Vec::new(),
        }
    }

    // breadth-first from the entry, first-encounter order
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut visited = FixedBitSet::with_capacity(self.nodes.len());
        let mut order = Vec::new();
        let mut worklist = std::collections::VecDeque::new();

        visited.insert(self.entry.0);
        worklist.push_back(self.entry);

        while let Some(id) = worklist.pop_front() {
            order.push(id);

            for succ in self.successors(id) {
                if !visited.contains(succ.0) {
                    visited.insert(succ.0);
                    worklist.push_back(succ);
                }
            }
        }

        order
    }
}
