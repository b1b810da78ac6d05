pub mod update;
pub mod workflow;

pub use update::*;
pub use workflow::*;
