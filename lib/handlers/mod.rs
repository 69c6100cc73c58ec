//! Command handlers.

mod config_cmd;
mod run;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use config_cmd::{config_clear, config_get, config_pak, config_registry, config_set};
pub use run::{ensure_cached, prepare_launch, run_package};
