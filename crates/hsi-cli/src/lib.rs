//! Library side of the `hsi` binary: arguments, configuration, logging, the
//! batch driver, and table rendering.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod summary;
pub mod types;
