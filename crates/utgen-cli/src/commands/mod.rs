//! Subcommand implementations
//!
//! Each returns the process exit code; errors bubble up as `anyhow::Error`.

pub(crate) mod doctor;
pub(crate) mod generate;
pub(crate) mod init_config;
