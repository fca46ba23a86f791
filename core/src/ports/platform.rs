//! Platform strategy port (interface).

use std::collections::HashMap;

use crate::domain::{PortRecord, ProcessEntry};
use crate::error::{Error, Result};

use super::CommandSpec;

/// Operating system family the commands are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    /// Detect the host platform.
    pub fn detect() -> Result<Self> {
        Self::from_os(std::env::consts::OS, cfg!(unix))
    }

    /// Map an OS identifier (as in `std::env::consts::OS`) to a platform.
    ///
    /// Unix systems other than macOS use the Linux command set.
    pub fn from_os(os: &str, unix_family: bool) -> Result<Self> {
        match os {
            "macos" | "ios" => Ok(Platform::MacOs),
            "windows" => Ok(Platform::Windows),
            "linux" | "android" => Ok(Platform::Linux),
            _ if unix_family => Ok(Platform::Linux),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macOS"),
            Platform::Linux => write!(f, "Linux"),
            Platform::Windows => write!(f, "Windows"),
        }
    }
}

/// Per-platform command construction and output parsing.
///
/// One implementation exists per platform family; it is chosen once when
/// the service is built. Parsers never fail: lines they cannot read are
/// skipped.
pub trait PlatformStrategy: Send + Sync {
    /// Platform this strategy targets.
    fn platform(&self) -> Platform;

    /// Command listing every listening socket.
    fn list_command(&self) -> CommandSpec;

    /// Parse the output of [`list_command`](Self::list_command).
    fn parse_listing(&self, output: &str) -> Vec<PortRecord>;

    /// Command listing the sockets on a single port.
    fn port_lookup_command(&self, port: u16) -> CommandSpec;

    /// Parse the output of [`port_lookup_command`](Self::port_lookup_command),
    /// keeping only records on `port`.
    fn parse_port_lookup(&self, output: &str, port: u16) -> Vec<PortRecord>;

    /// Secondary listing command used when the primary one fails.
    fn fallback_list_command(&self) -> Option<CommandSpec>;

    /// Parse the output of [`fallback_list_command`](Self::fallback_list_command).
    fn parse_fallback_listing(&self, output: &str) -> Vec<PortRecord>;

    /// Command that force-terminates `pid`.
    fn kill_command(&self, pid: u32) -> CommandSpec;

    /// Command listing name and usage of every process.
    fn process_table_command(&self) -> CommandSpec;

    /// Command listing name and usage of one process, in the same format as
    /// [`process_table_command`](Self::process_table_command).
    fn process_command(&self, pid: u32) -> CommandSpec;

    /// Parse process table output into entries keyed by PID.
    fn parse_process_table(&self, output: &str) -> HashMap<u32, ProcessEntry>;

    /// Whether permission failures should offer to re-run as administrator.
    fn elevation_hint(&self) -> bool {
        self.platform().is_windows()
    }

    /// Explanation when the primary listing cannot see every process.
    fn visibility_notice(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_os() {
        assert_eq!(Platform::from_os("macos", true).unwrap(), Platform::MacOs);
        assert_eq!(Platform::from_os("linux", true).unwrap(), Platform::Linux);
        assert_eq!(Platform::from_os("freebsd", true).unwrap(), Platform::Linux);
        assert_eq!(Platform::from_os("windows", false).unwrap(), Platform::Windows);
        assert!(Platform::from_os("wasi", false).is_err());
    }

    #[test]
    fn test_detect_current_host() {
        let platform = Platform::detect().unwrap();
        assert_eq!(platform.is_windows(), cfg!(windows));
    }
}
