//! Bundle manifest types.
//!
//! Only the parts of `manifest.json` needed to launch a server are modelled;
//! other fields are ignored.

use crate::constants::MANIFEST_FILE;
use crate::error::{PakError, PakResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Bundle manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Bundle version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Server configuration.
    pub server: ManifestServer,

    /// User-configurable fields, in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub user_config: IndexMap<String, UserConfigField>,
}

/// The `server` block of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestServer {
    /// Declared runtime tag. See [`Manifest::server_kind`].
    #[serde(rename = "type")]
    pub server_type: String,

    /// Path of the entry point, relative to the bundle root.
    pub entry_point: String,

    /// Launch configuration.
    pub mcp_config: McpConfig,
}

/// Launch command, arguments and environment declared by the bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Command to execute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Command arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Runtime kinds a bundle can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    /// Pre-compiled executable.
    Binary,
    /// Node.js script.
    Node,
    /// Python script.
    Python,
}

/// A user-configurable field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfigField {
    /// Value type.
    #[serde(rename = "type", default)]
    pub field_type: UserConfigType,

    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the value should be masked when entered or shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<bool>,

    /// Whether a value must be supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// User config value type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserConfigType {
    /// String value.
    #[default]
    String,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// Directory path.
    Directory,
    /// File path.
    File,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(content: &str, path: &Path) -> PakResult<Self> {
        serde_json::from_str(content).map_err(|e| PakError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The declared runtime kind.
    pub fn server_kind(&self) -> PakResult<ServerKind> {
        self.server.server_type.parse()
    }
}

impl UserConfigField {
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive.unwrap_or(false)
    }

    /// The default value coerced to a string.
    pub fn default_string(&self) -> Option<String> {
        self.default.as_ref().map(|d| match d {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => d.to_string(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Read `manifest.json` from an extracted bundle.
pub fn read_manifest(bundle_dir: &Path) -> PakResult<Manifest> {
    let path = bundle_dir.join(MANIFEST_FILE);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PakError::ManifestMissing(bundle_dir.to_path_buf()));
        }
        Err(e) => return Err(PakError::Io(e)),
    };

    Manifest::from_json(&content, &path)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Node => write!(f, "node"),
            Self::Python => write!(f, "python"),
        }
    }
}

impl FromStr for ServerKind {
    type Err = PakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(Self::Binary),
            "node" => Ok(Self::Node),
            "python" => Ok(Self::Python),
            other => Err(PakError::UnsupportedServerKind(other.to_string())),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
