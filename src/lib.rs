pub mod config;
pub mod coordinator;
pub mod engine;
pub mod protocol;
pub mod sequence;

pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorError, SortReport, sort_distributed};
pub use engine::SortEngine;
pub use sequence::Element;
