#[macro_use]
pub mod macros;
pub mod global_config;
pub mod names;
pub mod resource_id;
pub mod types;
