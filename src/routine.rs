use crate::error::FlowError;
use crate::graph::Program;
use crate::lower;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "blk#{}", self.0)
    }
}

// Compares by identity, a fresh integer per loop.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct LoopId(pub usize);

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

pub(crate) enum Item<M, C> {
    Mutation(M),
    Return,
    Continue(LoopId),
    Break(LoopId),
    If {
        condition: C,
        then_block: BlockId,
    },
    IfElse {
        condition: C,
        then_block: BlockId,
        else_block: BlockId,
    },
    While {
        condition: C,
        body: BlockId,
        loop_id: LoopId,
    },
    DoWhile {
        condition: C,
        body: BlockId,
        loop_id: LoopId,
    },
}

pub(crate) struct BlockData<M, C> {
    pub(crate) items: Vec<Item<M, C>>,
    parent: Option<BlockId>,
    // Set exactly on blocks that are the body of a loop.
    loop_of_body: Option<LoopId>,
}

struct LoopData {
    label: Option<String>,
}

pub struct Routine<M, C> {
    blocks: Vec<BlockData<M, C>>,
    loops: Vec<LoopData>,
}

impl<M, C> Routine<M, C> {
    pub fn new() -> Routine<M, C> {
        Routine {
            blocks: vec![BlockData {
                items: Vec::new(),
                parent: None,
                loop_of_body: None,
            }],
            loops: Vec::new(),
        }
    }

    pub fn root(&self) -> BlockId {
        BlockId(0)
    }

    fn add_block(&mut self, parent: BlockId, loop_of_body: Option<LoopId>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BlockData {
            items: Vec::new(),
            parent: Some(parent),
            loop_of_body,
        });

        id
    }

    fn add_loop(&mut self, label: Option<String>) -> LoopId {
        let id = LoopId(self.loops.len());
        self.loops.push(LoopData { label });

        id
    }

    pub(crate) fn block(&self, id: BlockId) -> &BlockData<M, C> {
        &self.blocks[id.0]
    }

    pub(crate) fn loop_label(&self, id: LoopId) -> Option<&str> {
        self.loops[id.0].label.as_deref()
    }

    pub fn add_mutation(&mut self, block: BlockId, mutation: M) {
        self.blocks[block.0].items.push(Item::Mutation(mutation));
    }

    pub fn add_if(&mut self, block: BlockId, condition: C) -> BlockId {
        let then_block = self.add_block(block, None);
        self.blocks[block.0].items.push(Item::If {
            condition,
            then_block,
        });

        then_block
    }

    pub fn add_if_else(&mut self, block: BlockId, condition: C) -> (BlockId, BlockId) {
        let then_block = self.add_block(block, None);
        let else_block = self.add_block(block, None);
        self.blocks[block.0].items.push(Item::IfElse {
            condition,
            then_block,
            else_block,
        });

        (then_block, else_block)
    }

    pub fn add_while(&mut self, block: BlockId, condition: C) -> (BlockId, LoopId) {
        self.add_while_loop(block, condition, None)
    }

    pub fn add_labeled_while(
        &mut self,
        block: BlockId,
        condition: C,
        label: &str,
    ) -> (BlockId, LoopId) {
        self.add_while_loop(block, condition, Some(label.to_string()))
    }

    fn add_while_loop(
        &mut self,
        block: BlockId,
        condition: C,
        label: Option<String>,
    ) -> (BlockId, LoopId) {
        let loop_id = self.add_loop(label);
        let body = self.add_block(block, Some(loop_id));
        self.blocks[block.0].items.push(Item::While {
            condition,
            body,
            loop_id,
        });

        (body, loop_id)
    }

    pub fn add_do_while(&mut self, block: BlockId, condition: C) -> (BlockId, LoopId) {
        self.add_do_while_loop(block, condition, None)
    }

    pub fn add_labeled_do_while(
        &mut self,
        block: BlockId,
        condition: C,
        label: &str,
    ) -> (BlockId, LoopId) {
        self.add_do_while_loop(block, condition, Some(label.to_string()))
    }

    fn add_do_while_loop(
        &mut self,
        block: BlockId,
        condition: C,
        label: Option<String>,
    ) -> (BlockId, LoopId) {
        let loop_id = self.add_loop(label);
        let body = self.add_block(block, Some(loop_id));
        self.blocks[block.0].items.push(Item::DoWhile {
            condition,
            body,
            loop_id,
        });

        (body, loop_id)
    }

    // Items appended after a jump are unreachable, the lowering drops them.
    pub fn add_break(&mut self, block: BlockId) -> Result<(), FlowError> {
        let target = self.nearest_loop(block).ok_or(FlowError::NoEnclosingLoop)?;
        self.blocks[block.0].items.push(Item::Break(target));

        Ok(())
    }

    pub fn add_continue(&mut self, block: BlockId) -> Result<(), FlowError> {
        let target = self.nearest_loop(block).ok_or(FlowError::NoEnclosingLoop)?;
        self.blocks[block.0].items.push(Item::Continue(target));

        Ok(())
    }

    pub fn add_break_to(&mut self, block: BlockId, target: LoopId) -> Result<(), FlowError> {
        if !self.loop_encloses(block, target) {
            return Err(FlowError::LoopNotEnclosing);
        }

        self.blocks[block.0].items.push(Item::Break(target));
        Ok(())
    }

    pub fn add_continue_to(&mut self, block: BlockId, target: LoopId) -> Result<(), FlowError> {
        if !self.loop_encloses(block, target) {
            return Err(FlowError::LoopNotEnclosing);
        }

        self.blocks[block.0].items.push(Item::Continue(target));
        Ok(())
    }

    pub fn add_return(&mut self, block: BlockId) {
        self.blocks[block.0].items.push(Item::Return);
    }

    // the loop whose body most closely encloses block
    pub(crate) fn nearest_loop(&self, block: BlockId) -> Option<LoopId> {
        let mut current = Some(block);

        while let Some(id) = current {
            let data = &self.blocks[id.0];

            if let Some(loop_id) = data.loop_of_body {
                return Some(loop_id);
            }

            current = data.parent;
        }

        None
    }

    fn loop_encloses(&self, block: BlockId, target: LoopId) -> bool {
        let mut current = Some(block);

        while let Some(id) = current {
            let data = &self.blocks[id.0];

            if data.loop_of_body == Some(target) {
                return true;
            }

            current = data.parent;
        }

        false
    }
}

impl<M: Clone, C: Clone> Routine<M, C> {
    pub fn to_program(&self) -> Result<Program<M, C>, FlowError> {
        lower::lower_routine(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_outside_loop() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();

        assert_eq!(Err(FlowError::NoEnclosingLoop), routine.add_break(root));
        assert_eq!(Err(FlowError::NoEnclosingLoop), routine.add_continue(root));
    }

    #[test]
    fn break_in_nested_block_without_loop() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();
        let then_block = routine.add_if(root, "c");

        assert_eq!(
            Err(FlowError::NoEnclosingLoop),
            routine.add_break(then_block)
        );
    }

    #[test]
    fn nearest_loop_through_if() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();
        let (body, loop_id) = routine.add_while(root, "c1");
        let then_block = routine.add_if(body, "c2");

        assert_eq!(Some(loop_id), routine.nearest_loop(then_block));
        assert!(routine.add_break(then_block).is_ok());
    }

    #[test]
    fn labeled_jump_must_target_enclosing_loop() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();
        let (_first_body, first) = routine.add_while(root, "c1");
        let (second_body, second) = routine.add_while(root, "c2");

        // Sibling loop is not an ancestor of the second body.
        assert_eq!(
            Err(FlowError::LoopNotEnclosing),
            routine.add_break_to(second_body, first)
        );
        assert_eq!(
            Err(FlowError::LoopNotEnclosing),
            routine.add_continue_to(second_body, first)
        );
        assert!(routine.add_break_to(second_body, second).is_ok());
    }

    #[test]
    fn labeled_jump_to_outer_loop() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();
        let (outer_body, outer) = routine.add_while(root, "c1");
        let (inner_body, _inner) = routine.add_while(outer_body, "c2");

        assert!(routine.add_continue_to(inner_body, outer).is_ok());
        assert!(routine.add_break_to(inner_body, outer).is_ok());
    }

    #[test]
    fn loop_handles_are_distinct() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();
        let (_, first) = routine.add_while(root, "c");
        let (_, second) = routine.add_while(root, "c");

        assert_ne!(first, second);
    }

    #[test]
    fn loop_labels() {
        let mut routine: Routine<&str, &str> = Routine::new();
        let root = routine.root();
        let (_, outer) = routine.add_labeled_while(root, "c", "outer");
        let (_, plain) = routine.add_while(root, "c");

        assert_eq!(Some("outer"), routine.loop_label(outer));
        assert_eq!(None, routine.loop_label(plain));
    }
}
