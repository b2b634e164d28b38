pub mod carrying;
pub mod drop_cmd;
pub mod supersede;
