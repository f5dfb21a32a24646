//! scriptgate library exports

pub mod config;
pub mod engine;
pub mod gate;
pub mod resolver;
pub mod trust;
