//! `pak-cli` library.

pub mod cache;
pub mod commands;
pub mod config_store;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod launcher;
pub mod manifest;
pub mod platform;
pub mod prompt;
pub mod references;
pub mod registry;
pub mod styles;
pub mod user_config;
pub mod vars;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use cache::*;
pub use commands::*;
pub use config_store::*;
pub use constants::*;
pub use error::*;
pub use launcher::*;
pub use manifest::*;
pub use platform::*;
pub use references::*;
pub use registry::*;
pub use user_config::*;
pub use vars::*;
