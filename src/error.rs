use std::error::Error;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FlowError {
    NoEnclosingLoop,
    LoopNotEnclosing,
    InvalidLoopTarget,
}

impl FlowError {
    pub fn message(&self) -> String {
        match *self {
            FlowError::NoEnclosingLoop => "jump statement outside of any loop.".into(),
            FlowError::LoopNotEnclosing => {
                "jump target is not an enclosing loop of this block.".into()
            }
            FlowError::InvalidLoopTarget => {
                "jump references a loop unknown to the lowering pass.".into()
            }
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Error for FlowError {}
