pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod simulation;
pub mod utils;

pub use error::{Error, Result};
