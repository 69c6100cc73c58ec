//! CLI command definitions.

use crate::styles::styles;
use crate::{examples, examples_section};
use clap::{Parser, Subcommand};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const RUN_EXAMPLES: &str = examples![
    "pak run @acme/weather             " # "Run the cached (or latest) version",
    "pak run @acme/weather@1.2.0       " # "Run a specific version",
    "pak run @acme/weather --update    " # "Check the registry for a newer version first",
    "PAK_USER_CONFIG_API_KEY=xxx pak run @acme/weather" # "Supply config from the environment",
];

const CONFIG_SET_EXAMPLES: &str = examples![
    "pak config set @acme/weather api_key=xxx  " # "Save a single value",
    "pak config set @acme/weather k=a units=m  " # "Save multiple values",
];

const CONFIG_GET_EXAMPLES: &str = examples![
    "pak config get @acme/weather              " # "Show all saved values",
    "pak config get @acme/weather api_key      " # "Show one value",
];

const CONFIG_CLEAR_EXAMPLES: &str = examples![
    "pak config clear @acme/weather api_key    " # "Remove one value",
    "pak config clear @acme/weather k1 k2      " # "Remove several values",
    "pak config clear @acme/weather            " # "Remove everything saved for the package",
];

const CONFIG_REGISTRY_EXAMPLES: &str = examples![
    "pak config registry                       " # "Show the registry in use",
    "pak config registry https://mirror.dev    " # "Use a different registry",
    "pak config registry --reset               " # "Go back to the default registry",
];

const CLI_EXAMPLES: &str = concat!(
    examples![
        "pak run @acme/weather                  " # "Fetch and run an MCP server over stdio",
        "pak config set @acme/weather api_key=x " # "Save config for future runs",
    ],
    "\n\n",
    examples_section!["Environment:";
        "PAK_HOME                          " # "State directory (default ~/.pak)",
        "PAK_REGISTRY_URL                  " # "Registry override",
        "PAK_USER_CONFIG_<KEY>             " # "Value for a user_config key",
        "RUST_LOG                          " # "Enable diagnostic logging on stderr",
    ],
);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// pak - run MCP server bundles.
#[derive(Debug, Parser)]
#[command(name = "pak", author, version, styles=styles())]
#[command(about = "Fetch and run MCP server bundles", after_help = CLI_EXAMPLES)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a package, pulling it into the cache if needed.
    #[command(after_help = RUN_EXAMPLES)]
    Run {
        /// Package reference (@scope/name or @scope/name@version).
        package: String,

        /// Ask the registry for the latest version even if a copy is cached.
        #[arg(short, long)]
        update: bool,
    },

    /// Manage saved package configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Save configuration values for a package.
    #[command(after_help = CONFIG_SET_EXAMPLES)]
    Set {
        /// Package name.
        package: String,

        /// Values to save (KEY=VALUE).
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Show saved configuration for a package.
    #[command(after_help = CONFIG_GET_EXAMPLES)]
    Get {
        /// Package name.
        package: String,

        /// Specific key to show (shows all if omitted).
        key: Option<String>,
    },

    /// Remove saved configuration.
    #[command(after_help = CONFIG_CLEAR_EXAMPLES)]
    Clear {
        /// Package name.
        package: String,

        /// Keys to remove (removes all if omitted).
        keys: Vec<String>,
    },

    /// Show or change the registry URL.
    #[command(after_help = CONFIG_REGISTRY_EXAMPLES)]
    Registry {
        /// New registry URL.
        #[arg(conflicts_with = "reset")]
        url: Option<String>,

        /// Remove the saved override.
        #[arg(long)]
        reset: bool,
    },
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
