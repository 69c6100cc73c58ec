//! Host platform detection in the registry's vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Operating system as understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformOs {
    /// macOS.
    Darwin,
    /// Linux.
    Linux,
    /// Windows.
    Win32,
    /// Matches any OS.
    Any,
}

/// CPU architecture as understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformArch {
    /// x86_64.
    X64,
    /// aarch64.
    Arm64,
    /// Matches any architecture.
    Any,
}

/// An OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: PlatformOs,
    pub arch: PlatformArch,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PlatformOs {
    /// Map a Rust `target_os` value. Unknown systems become `Any`.
    pub fn from_rust_os(os: &str) -> Self {
        match os {
            "macos" => Self::Darwin,
            "linux" => Self::Linux,
            "windows" => Self::Win32,
            _ => Self::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Win32 => "win32",
            Self::Any => "any",
        }
    }
}

impl PlatformArch {
    /// Map a Rust `target_arch` value. Unknown architectures become `Any`.
    pub fn from_rust_arch(arch: &str) -> Self {
        match arch {
            "x86_64" => Self::X64,
            "aarch64" => Self::Arm64,
            _ => Self::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
            Self::Any => "any",
        }
    }
}

impl Platform {
    /// The wildcard platform.
    pub const ANY: Platform = Platform {
        os: PlatformOs::Any,
        arch: PlatformArch::Any,
    };
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Detect the current platform. Never fails; unknown values degrade to `any`.
pub fn detect_platform() -> Platform {
    Platform {
        os: PlatformOs::from_rust_os(std::env::consts::OS),
        arch: PlatformArch::from_rust_arch(std::env::consts::ARCH),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_os_values() {
        assert_eq!(PlatformOs::from_rust_os("macos"), PlatformOs::Darwin);
        assert_eq!(PlatformOs::from_rust_os("linux"), PlatformOs::Linux);
        assert_eq!(PlatformOs::from_rust_os("windows"), PlatformOs::Win32);
    }

    #[test]
    fn test_unknown_values_degrade_to_any() {
        assert_eq!(PlatformOs::from_rust_os("freebsd"), PlatformOs::Any);
        assert_eq!(PlatformArch::from_rust_arch("riscv64"), PlatformArch::Any);
    }

    #[test]
    fn test_known_arch_values() {
        assert_eq!(PlatformArch::from_rust_arch("x86_64"), PlatformArch::X64);
        assert_eq!(PlatformArch::from_rust_arch("aarch64"), PlatformArch::Arm64);
    }

    #[test]
    fn test_detect_matches_host() {
        let platform = detect_platform();
        assert_eq!(platform.os, PlatformOs::from_rust_os(std::env::consts::OS));
        assert_eq!(
            platform.arch,
            PlatformArch::from_rust_arch(std::env::consts::ARCH)
        );
    }

    #[test]
    fn test_serialized_form() {
        let platform = Platform {
            os: PlatformOs::Win32,
            arch: PlatformArch::Arm64,
        };
        let json = serde_json::to_value(platform).unwrap();
        assert_eq!(json, serde_json::json!({ "os": "win32", "arch": "arm64" }));
        assert_eq!(platform.to_string(), "win32-arm64");
    }
}
