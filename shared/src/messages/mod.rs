pub mod control;
pub mod spawn;
pub mod update;
