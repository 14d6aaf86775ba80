use std::collections::HashMap;
use std::fmt::Display;
use std::fmt::Write;

use crate::graph::{Node, NodeId, Program};
use crate::routine::{BlockId, Item, LoopId, Routine};

pub fn dump_routine<M: Display, C: Display>(routine: &Routine<M, C>) -> String {
    let mut dumper = RoutineDumper {
        routine,
        named_loops: named_loops(routine),
        indent: 0,
        out: String::new(),
    };
    dumper.dump_block(routine.root());

    dumper.out
}

// Loops that need their name in the dump: labeled ones, and targets of
// jumps from blocks they do not immediately enclose.
fn named_loops<M, C>(routine: &Routine<M, C>) -> Vec<LoopId> {
    let mut named = Vec::new();
    let mut worklist = vec![routine.root()];

    while let Some(block) = worklist.pop() {
        for item in &routine.block(block).items {
            match item {
                Item::Break(target) | Item::Continue(target) => {
                    if routine.nearest_loop(block) != Some(*target) && !named.contains(target) {
                        named.push(*target);
                    }
                }

                Item::If { then_block, .. } => worklist.push(*then_block),

                Item::IfElse {
                    then_block,
                    else_block,
                    ..
                } => {
                    worklist.push(*then_block);
                    worklist.push(*else_block);
                }

                Item::While { body, loop_id, .. } | Item::DoWhile { body, loop_id, .. } => {
                    if routine.loop_label(*loop_id).is_some() && !named.contains(loop_id) {
                        named.push(*loop_id);
                    }
                    worklist.push(*body);
                }

                Item::Mutation(_) | Item::Return => {}
            }
        }
    }

    named
}

struct RoutineDumper<'a, M, C> {
    routine: &'a Routine<M, C>,
    named_loops: Vec<LoopId>,
    indent: u32,
    out: String,
}

impl<'a, M: Display, C: Display> RoutineDumper<'a, M, C> {
    fn loop_name(&self, id: LoopId) -> String {
        match self.routine.loop_label(id) {
            Some(label) => label.to_string(),
            None => format!("{}", id),
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..(self.indent * 2) {
            self.out.push(' ');
        }

        self.out.push_str(text);
        self.out.push('\n');
    }

    fn dump_block(&mut self, block: BlockId) {
        self.line("{");
        self.dump_nested(block);
        self.line("}");
    }

    fn dump_item(&mut self, block: BlockId, item: &Item<M, C>) {
        match item {
            Item::Mutation(mutation) => self.line(&format!("{};", mutation)),

            Item::Return => self.line("return;"),

            Item::Break(target) => self.dump_jump(block, "break", *target),

            Item::Continue(target) => self.dump_jump(block, "continue", *target),

            Item::If {
                condition,
                then_block,
            } => {
                self.line(&format!("if ({}) {{", condition));
                self.dump_nested(*then_block);
                self.line("}");
            }

            Item::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                self.line(&format!("if ({}) {{", condition));
                self.dump_nested(*then_block);
                self.line("}");
                self.line("else {");
                self.dump_nested(*else_block);
                self.line("}");
            }

            Item::While {
                condition,
                body,
                loop_id,
            } => {
                self.dump_loop_name(*loop_id);
                self.line(&format!("while ({}) {{", condition));
                self.dump_nested(*body);
                self.line("}");
            }

            Item::DoWhile {
                condition,
                body,
                loop_id,
            } => {
                self.dump_loop_name(*loop_id);
                self.line("do {");
                self.dump_nested(*body);
                self.line(&format!("}} while ({});", condition));
            }
        }
    }

    fn dump_nested(&mut self, block: BlockId) {
        self.indent += 1;

        let routine = self.routine;
        for item in &routine.block(block).items {
            self.dump_item(block, item);
        }

        self.indent -= 1;
    }

    fn dump_loop_name(&mut self, loop_id: LoopId) {
        if self.named_loops.contains(&loop_id) {
            let name = self.loop_name(loop_id);
            self.line(&format!("{}:", name));
        }
    }

    fn dump_jump(&mut self, block: BlockId, keyword: &str, target: LoopId) {
        let nearest = self.routine.nearest_loop(block);

        if nearest == Some(target) && self.routine.loop_label(target).is_none() {
            self.line(&format!("{};", keyword));
        } else {
            let name = self.loop_name(target);
            self.line(&format!("{} {};", keyword, name));
        }
    }
}

// Nodes are named by decimal in first-encounter order, RETURN is reserved
// for the terminal.
pub fn dump_program<M: Display, C: Display>(program: &Program<M, C>) -> String {
    if program.is_empty() {
        return "(EMPTY PROGRAM GRAPH)\n".to_string();
    }

    let order = program.reachable();
    let mut names: HashMap<NodeId, usize> = HashMap::new();

    for id in &order {
        if *id != program.ret() {
            let name = names.len();
            names.insert(*id, name);
        }
    }

    let name = |id: NodeId| -> String {
        if id == program.ret() {
            "RETURN".to_string()
        } else {
            names[&id].to_string()
        }
    };

    let mut out = String::new();

    for id in order {
        match program.node(id) {
            Node::Basic { mutations, coda } => {
                writeln!(out, "BASIC BLOCK {}", name(id)).unwrap();

                for mutation in mutations {
                    writeln!(out, "  {}", mutation).unwrap();
                }

                let coda = coda.expect("dangling coda");
                writeln!(out, "  GOTO: {}", name(coda)).unwrap();
            }

            Node::Branch {
                condition,
                true_dest,
                false_dest,
            } => {
                writeln!(out, "BRANCH {}: {}", name(id), condition).unwrap();

                let true_dest = true_dest.expect("dangling true dest");
                let false_dest = false_dest.expect("dangling false dest");
                writeln!(out, "  TRUE DEST: {}", name(true_dest)).unwrap();
                writeln!(out, "  FALSE DEST: {}", name(false_dest)).unwrap();
            }

            Node::Return => {}
        }
    }

    out
}
