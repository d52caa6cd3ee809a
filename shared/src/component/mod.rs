pub mod change_tracker;
pub mod dirty_mask;
pub mod replicate;
pub mod replicated_component;
pub mod schema;
