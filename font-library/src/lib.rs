pub mod cli;
pub mod frappe;
pub mod load_config;

pub use cli::{run, Cli, Commands};
