//! CLI subcommand implementations.

pub mod convert;
pub mod delete;
pub mod list;
pub mod status;
pub mod upload;
mod util;
