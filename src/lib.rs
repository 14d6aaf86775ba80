pub mod dump;
pub mod error;
pub mod graph;
pub mod lower;
pub mod routine;

pub use dump::{dump_program, dump_routine};
pub use error::FlowError;
pub use graph::{Node, NodeId, Program};
pub use routine::{BlockId, LoopId, Routine};
