pub mod delivery;
pub mod task;

pub use delivery::{DeletionPolicy, TracePropagation};
pub use task::{NewTask, Task};
