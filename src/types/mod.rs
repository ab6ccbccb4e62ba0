pub mod config;
pub mod point;
