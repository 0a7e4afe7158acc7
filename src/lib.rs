pub mod cli;
pub mod config;
pub mod errors;
pub mod extract;
pub mod log;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod safety;
pub mod server;
pub mod wire;

pub use errors::{GenError, Result};
