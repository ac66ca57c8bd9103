pub mod classifier;
pub mod labels;
pub mod zero_shot;

pub use classifier::*;
pub use labels::*;
pub use zero_shot::*;
