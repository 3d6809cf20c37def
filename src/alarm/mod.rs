pub mod gesture;
pub mod monitor;
pub mod resolver;
