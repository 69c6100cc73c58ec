//! Package references.
//!
//! Packages are addressed as `@<scope>/<name>[@<version>]`. Parsing is total:
//! anything that does not look like a scoped name followed by a version is
//! kept whole as the name.

use std::fmt;
use std::str::FromStr;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A package name with an optional requested version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    /// Full package name (e.g., "@acme/tool").
    name: String,

    /// Requested version, absent for "latest".
    version: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PackageRef {
    /// Parse a package reference. Never fails.
    ///
    /// The version separator is the first `@` after the scope's `/`, so
    /// versions may themselves contain `@`. Inputs without a `/` split on the
    /// last `@`. A split only happens when the name part still starts with `@`.
    pub fn parse(input: &str) -> Self {
        let split_at = match input.find('/') {
            Some(slash) => input[slash..].find('@').map(|i| slash + i),
            None => input.rfind('@'),
        };

        if let Some(at_pos) = split_at {
            let (name, version) = (&input[..at_pos], &input[at_pos + 1..]);
            if name.starts_with('@') && name.len() > 1 && !version.is_empty() {
                return Self {
                    name: name.to_string(),
                    version: Some(version.to_string()),
                };
            }
        }

        Self {
            name: input.to_string(),
            version: None,
        }
    }

    /// Get the package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the requested version.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(ref version) = self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for PackageRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PackageRef::parse(s))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_name_without_version() {
        for input in ["@acme/tool", "@nimblebraininc/echo", "@a/b-c_d.e"] {
            let parsed = PackageRef::parse(input);
            assert_eq!(parsed.name(), input);
            assert_eq!(parsed.version(), None);
        }
    }

    #[test]
    fn test_scoped_name_with_version() {
        let parsed = PackageRef::parse("@acme/tool@1.2.0");
        assert_eq!(parsed.name(), "@acme/tool");
        assert_eq!(parsed.version(), Some("1.2.0"));
    }

    #[test]
    fn test_prerelease_and_build_metadata() {
        let parsed = PackageRef::parse("@acme/tool@1.0.0-rc.1+build.5");
        assert_eq!(parsed.name(), "@acme/tool");
        assert_eq!(parsed.version(), Some("1.0.0-rc.1+build.5"));
    }

    #[test]
    fn test_version_containing_at() {
        let parsed = PackageRef::parse("@acme/tool@next@2");
        assert_eq!(parsed.name(), "@acme/tool");
        assert_eq!(parsed.version(), Some("next@2"));
    }

    #[test]
    fn test_unscoped_name_with_at_is_whole_name() {
        let parsed = PackageRef::parse("tool@1.0.0");
        assert_eq!(parsed.name(), "tool@1.0.0");
        assert_eq!(parsed.version(), None);

        let parsed = PackageRef::parse("org/tool@1.0.0");
        assert_eq!(parsed.name(), "org/tool@1.0.0");
        assert_eq!(parsed.version(), None);
    }

    #[test]
    fn test_degenerate_inputs_are_total() {
        for input in ["", "@", "@@", "@acme/tool@", "@/x"] {
            let parsed = PackageRef::parse(input);
            assert_eq!(parsed.name(), input);
            assert_eq!(parsed.version(), None);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(PackageRef::parse("@acme/tool@1.0.0").to_string(), "@acme/tool@1.0.0");
        assert_eq!(PackageRef::parse("@acme/tool").to_string(), "@acme/tool");
    }
}
