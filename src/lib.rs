
pub mod math;
pub mod constants;
pub mod collections;
pub mod store;
pub mod components;
pub mod physics;
pub mod camera;
pub mod context;
pub mod scheduler;
pub mod config;
pub mod output;
pub mod cli;
