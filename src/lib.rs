pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod report;
pub mod scheduler;
pub mod util;
