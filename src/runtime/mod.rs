pub mod machine;
pub mod runtime_error;

pub use machine::{Machine, MachineConfig};
pub use runtime_error::RuntimeError;
