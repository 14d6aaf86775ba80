use std::collections::HashMap;

use crate::error::FlowError;
use crate::graph::{Node, NodeId, Program};
use crate::routine::{BlockId, Item, LoopId, Routine};

pub(crate) fn lower_routine<M: Clone, C: Clone>(
    routine: &Routine<M, C>,
) -> Result<Program<M, C>, FlowError> {
    let mut gen = GraphGen::new();
    let sub = gen.lower_block(routine, routine.root())?;
    let ret = gen.ret;

    let entry = match sub {
        None => ret,
        Some(sub) => {
            let entry = sub.entry;
            gen.fire(sub.exit, ret);

            match entry {
                Entry::Node(node) => node,
                // The routine runs straight into its own exit.
                Entry::OwnExit => ret,
                // Unreachable through the checked builder: a break escaping
                // every loop scope means the input is corrupted.
                Entry::LoopExit(_) => return Err(FlowError::InvalidLoopTarget),
            }
        }
    };

    Ok(Program::new(gen.nodes, entry, ret))
}

// deferred successor write, fired once the target node is known
enum Patch {
    NoOp,
    Coda(NodeId),
    TrueDest(NodeId),
    FalseDest(NodeId),
    Fanout(Vec<Patch>),
}

#[derive(Copy, Clone)]
enum Entry {
    Node(NodeId),

    // block starts with a break, entered through the loop's future exit
    LoopExit(LoopId),

    // entry coincides with whatever the exit patch is fired with
    OwnExit,
}

struct Subgraph {
    entry: Entry,
    exit: Patch,
}

// At most one of open_block/pending is set once the first item is in.
struct BlockState {
    entry: Option<Entry>,
    open_block: Option<NodeId>,
    pending: Option<Patch>,
}

struct LoopRecord {
    branch: NodeId,
    breaks: Vec<Patch>,
}

struct GraphGen<M, C> {
    nodes: Vec<Node<M, C>>,
    ret: NodeId,
    // Scoped: a loop is present exactly while its body is being lowered,
    // so jumps resolve only to loops that lexically enclose them.
    loops: HashMap<LoopId, LoopRecord>,
}

impl<M: Clone, C: Clone> GraphGen<M, C> {
    fn new() -> GraphGen<M, C> {
        GraphGen {
            nodes: vec![Node::Return],
            ret: NodeId(0),
            loops: HashMap::new(),
        }
    }

    fn add_basic(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Basic {
            mutations: Vec::new(),
            coda: None,
        });

        id
    }

    fn add_branch(&mut self, condition: C) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Branch {
            condition,
            true_dest: None,
            false_dest: None,
        });

        id
    }

    fn fire(&mut self, patch: Patch, target: NodeId) {
        match patch {
            Patch::NoOp => {}

            Patch::Coda(id) => match &mut self.nodes[id.0] {
                Node::Basic { coda, .. } => {
                    assert!(coda.is_none(), "coda wired twice");
                    *coda = Some(target);
                }
                _ => unreachable!(),
            },

            Patch::TrueDest(id) => match &mut self.nodes[id.0] {
                Node::Branch { true_dest, .. } => {
                    assert!(true_dest.is_none(), "true dest wired twice");
                    *true_dest = Some(target);
                }
                _ => unreachable!(),
            },

            Patch::FalseDest(id) => match &mut self.nodes[id.0] {
                Node::Branch { false_dest, .. } => {
                    assert!(false_dest.is_none(), "false dest wired twice");
                    *false_dest = Some(target);
                }
                _ => unreachable!(),
            },

            Patch::Fanout(patches) => {
                for patch in patches {
                    self.fire(patch, target);
                }
            }
        }
    }

    // patch that wires the block's current tail to the next node, None
    // before the first item
    fn detach(state: &mut BlockState) -> Option<Patch> {
        if let Some(patch) = state.pending.take() {
            Some(patch)
        } else {
            state.open_block.take().map(Patch::Coda)
        }
    }

    // wires the current tail to entry, cont becomes the new pending patch
    fn advance(&mut self, state: &mut BlockState, entry: Entry, cont: Patch) {
        let attach = Self::detach(state);

        match entry {
            Entry::Node(node) => {
                if let Some(patch) = attach {
                    self.fire(patch, node);
                }

                match state.entry {
                    None | Some(Entry::OwnExit) => state.entry = Some(entry),
                    _ => {}
                }

                state.pending = Some(cont);
            }

            Entry::LoopExit(loop_id) => {
                if let Some(patch) = attach {
                    self.loop_record(loop_id).breaks.push(patch);
                }

                match state.entry {
                    None | Some(Entry::OwnExit) => state.entry = Some(entry),
                    _ => {}
                }

                state.pending = Some(cont);
            }

            // Tail and continuation resolve to the same node later on.
            Entry::OwnExit => {
                let combined = match attach {
                    Some(patch) => Patch::Fanout(vec![cont, patch]),
                    None => cont,
                };

                if state.entry.is_none() {
                    state.entry = Some(Entry::OwnExit);
                }

                state.pending = Some(combined);
            }
        }
    }

    // couples a subgraph entry to the slot consuming it, returns the exit
    // patch extended when entry and exit coincide
    fn attach_entry(&mut self, entry: Entry, exit: Patch, slot: Patch) -> Patch {
        match entry {
            Entry::Node(node) => {
                self.fire(slot, node);
                exit
            }

            Entry::LoopExit(loop_id) => {
                self.loop_record(loop_id).breaks.push(slot);
                exit
            }

            Entry::OwnExit => Patch::Fanout(vec![exit, slot]),
        }
    }

    fn loop_record(&mut self, loop_id: LoopId) -> &mut LoopRecord {
        self.loops.get_mut(&loop_id).expect("loop not in scope")
    }

    fn lower_block(
        &mut self,
        routine: &Routine<M, C>,
        block: BlockId,
    ) -> Result<Option<Subgraph>, FlowError> {
        let mut state = BlockState {
            entry: None,
            open_block: None,
            pending: None,
        };

        for item in &routine.block(block).items {
            match item {
                Item::Mutation(mutation) => {
                    if state.open_block.is_none() {
                        let id = self.add_basic();
                        self.advance(&mut state, Entry::Node(id), Patch::NoOp);
                        state.pending = None;
                        state.open_block = Some(id);
                    }

                    let open = state.open_block.expect("no open block");
                    match &mut self.nodes[open.0] {
                        Node::Basic { mutations, .. } => mutations.push(mutation.clone()),
                        _ => unreachable!(),
                    }
                }

                Item::Return => {
                    let ret = self.ret;
                    self.advance(&mut state, Entry::Node(ret), Patch::NoOp);
                    // Everything after an unconditional jump is unreachable.
                    break;
                }

                Item::Continue(loop_id) => {
                    let branch = self
                        .loops
                        .get(loop_id)
                        .ok_or(FlowError::InvalidLoopTarget)?
                        .branch;
                    self.advance(&mut state, Entry::Node(branch), Patch::NoOp);
                    break;
                }

                Item::Break(loop_id) => {
                    if !self.loops.contains_key(loop_id) {
                        return Err(FlowError::InvalidLoopTarget);
                    }

                    if let Some(patch) = Self::detach(&mut state) {
                        self.loop_record(*loop_id).breaks.push(patch);
                    }

                    match state.entry {
                        // No entry node yet: the block is entered through
                        // the loop exit itself.
                        None | Some(Entry::OwnExit) => {
                            state.entry = Some(Entry::LoopExit(*loop_id));
                        }
                        _ => {}
                    }

                    break;
                }

                Item::If {
                    condition,
                    then_block,
                } => {
                    if let Some(sub) = self.lower_block(routine, *then_block)? {
                        self.lower_if(&mut state, condition.clone(), sub, false);
                    }
                    // An empty body drops the construct entirely.
                }

                Item::IfElse {
                    condition,
                    then_block,
                    else_block,
                } => {
                    let then_sub = self.lower_block(routine, *then_block)?;
                    let else_sub = self.lower_block(routine, *else_block)?;

                    match (then_sub, else_sub) {
                        (None, None) => {}

                        (Some(sub), None) => {
                            self.lower_if(&mut state, condition.clone(), sub, false)
                        }

                        // Only the else arm survives: route the condition's
                        // false edge into it and join on true.
                        (None, Some(sub)) => {
                            self.lower_if(&mut state, condition.clone(), sub, true)
                        }

                        (Some(then_sub), Some(else_sub)) => {
                            let branch = self.add_branch(condition.clone());
                            let then_exit = self.attach_entry(
                                then_sub.entry,
                                then_sub.exit,
                                Patch::TrueDest(branch),
                            );
                            let else_exit = self.attach_entry(
                                else_sub.entry,
                                else_sub.exit,
                                Patch::FalseDest(branch),
                            );
                            let cont = Patch::Fanout(vec![then_exit, else_exit]);
                            self.advance(&mut state, Entry::Node(branch), cont);
                        }
                    }
                }

                Item::While {
                    condition,
                    body,
                    loop_id,
                } => {
                    let (branch, _) = self.lower_loop(routine, condition.clone(), *body, *loop_id)?;
                    let cont = self.close_loop(*loop_id, branch);
                    self.advance(&mut state, Entry::Node(branch), cont);
                }

                Item::DoWhile {
                    condition,
                    body,
                    loop_id,
                } => {
                    let (branch, body_entry) =
                        self.lower_loop(routine, condition.clone(), *body, *loop_id)?;

                    // A do-while is entered through its body, not its test.
                    let entry = match body_entry {
                        None => Entry::Node(branch),
                        Some(Entry::Node(node)) => Entry::Node(node),
                        // The body breaks straight out of this very loop:
                        // the construct is entered through its own exit.
                        Some(Entry::LoopExit(target)) if target == *loop_id => Entry::OwnExit,
                        Some(Entry::LoopExit(target)) => Entry::LoopExit(target),
                        Some(Entry::OwnExit) => Entry::Node(branch),
                    };

                    let cont = self.close_loop(*loop_id, branch);
                    self.advance(&mut state, entry, cont);
                }
            }
        }

        Ok(Self::finish(state))
    }

    // with inverted the surviving arm hangs off the false edge and the
    // join is reached through the true edge
    fn lower_if(&mut self, state: &mut BlockState, condition: C, sub: Subgraph, inverted: bool) {
        let branch = self.add_branch(condition);

        let (arm_slot, join_slot) = if inverted {
            (Patch::FalseDest(branch), Patch::TrueDest(branch))
        } else {
            (Patch::TrueDest(branch), Patch::FalseDest(branch))
        };

        let exit = self.attach_entry(sub.entry, sub.exit, arm_slot);
        let cont = Patch::Fanout(vec![join_slot, exit]);
        self.advance(state, Entry::Node(branch), cont);
    }

    // Allocates the test, lowers the body in the loop's scope and wires
    // the back edge. The record stays in the map until close_loop.
    fn lower_loop(
        &mut self,
        routine: &Routine<M, C>,
        condition: C,
        body: BlockId,
        loop_id: LoopId,
    ) -> Result<(NodeId, Option<Entry>), FlowError> {
        let branch = self.add_branch(condition);
        self.loops.insert(
            loop_id,
            LoopRecord {
                branch,
                breaks: Vec::new(),
            },
        );

        let body_entry = match self.lower_block(routine, body)? {
            None => {
                // Empty body: the test spins on itself.
                self.fire(Patch::TrueDest(branch), branch);
                None
            }

            Some(sub) => {
                let body_entry = sub.entry;
                let exit = self.attach_entry(body_entry, sub.exit, Patch::TrueDest(branch));
                // The body's tail loops back into the test.
                self.fire(exit, branch);
                Some(body_entry)
            }
        };

        Ok((branch, body_entry))
    }

    // fired with the post-loop join, completes the false edge and every break
    fn close_loop(&mut self, loop_id: LoopId, branch: NodeId) -> Patch {
        let record = self.loops.remove(&loop_id).expect("loop record lost");

        let mut cont = vec![Patch::FalseDest(branch)];
        cont.extend(record.breaks);
        Patch::Fanout(cont)
    }

    fn finish(state: BlockState) -> Option<Subgraph> {
        let entry = state.entry?;

        let exit = if let Some(open) = state.open_block {
            Patch::Coda(open)
        } else if let Some(pending) = state.pending {
            pending
        } else {
            // The block ended in a jump; nothing falls through.
            Patch::NoOp
        };

        Some(Subgraph { entry, exit })
    }
}
