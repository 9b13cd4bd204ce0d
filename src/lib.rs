#![recursion_limit = "384"]

pub mod beacon;
pub mod capability;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod pacer;
pub mod shaper;
pub mod store;
pub mod supervisor;
pub mod utils;
