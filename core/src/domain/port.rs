//! Listening socket and process statistics models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::protection::{is_critical_port, ProtectionVerdict};

/// Placeholder used when the platform cannot resolve a name or owner.
pub const UNKNOWN: &str = "Unknown";

/// Transport protocol reported by the listing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    /// Parse a protocol column such as `TCP`, `tcp6` or `UDP`.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        if token.starts_with("tcp") {
            Some(Protocol::Tcp)
        } else if token.starts_with("udp") {
            Some(Protocol::Udp)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// CPU and memory usage of a single process.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    /// CPU usage in percent of one core.
    pub cpu_percent: f64,
    /// Resident memory in bytes.
    pub memory_bytes: u64,
}

/// One observed listening socket and the process that owns it.
///
/// Records are created fresh on every scan. The `id` is only a list key for
/// consumers; the `(port, pid)` pair is the record's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    /// Unique identifier for this record instance.
    pub id: Uuid,

    /// The port number (1-65535).
    pub port: u16,

    /// Process ID of the owning process.
    pub pid: u32,

    /// Name of the owning process, or `"Unknown"`.
    pub process_name: String,

    /// Owner account of the process, or `"Unknown"`.
    pub user: String,

    /// Address the socket is bound to (e.g., "*", "127.0.0.1", "[::1]").
    pub address: String,

    /// Transport protocol.
    pub protocol: Protocol,

    /// CPU usage of the owning process; zero when unavailable.
    pub cpu_percent: f64,

    /// Resident memory of the owning process; zero when unavailable.
    pub memory_bytes: u64,

    /// Protection verdict for this process/port pair.
    pub protection: ProtectionVerdict,

    /// Whether the port is privileged or hosts a well-known critical service.
    pub is_critical: bool,
}

impl PortRecord {
    /// Create a record for a listening socket straight out of a parser.
    pub fn listening(
        port: u16,
        pid: u32,
        process_name: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            port,
            pid,
            process_name: process_name.into(),
            user: user.into(),
            address: "*".to_string(),
            protocol: Protocol::Tcp,
            cpu_percent: 0.0,
            memory_bytes: 0,
            protection: ProtectionVerdict::unprotected(),
            is_critical: is_critical_port(port),
        }
    }

    /// Set the bound address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the transport protocol.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Identity of this record within and across scans.
    pub fn key(&self) -> (u16, u32) {
        (self.port, self.pid)
    }

    /// Whether the owning process name could not be resolved.
    pub fn has_unknown_name(&self) -> bool {
        self.process_name.is_empty() || self.process_name == UNKNOWN
    }

    /// Current CPU/memory figures.
    pub fn stats(&self) -> ProcessStats {
        ProcessStats {
            cpu_percent: self.cpu_percent,
            memory_bytes: self.memory_bytes,
        }
    }

    /// Replace CPU/memory figures.
    pub fn apply_stats(&mut self, stats: ProcessStats) {
        self.cpu_percent = stats.cpu_percent;
        self.memory_bytes = stats.memory_bytes;
    }

    /// Get the formatted port number for display (e.g., ":3000").
    pub fn display_port(&self) -> String {
        format!(":{}", self.port)
    }

    /// Check if this record matches a search query.
    ///
    /// Searches across process name, port number, PID, address and user.
    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }

        let query_lower = query.to_lowercase();
        self.process_name.to_lowercase().contains(&query_lower)
            || self.port.to_string().contains(&query_lower)
            || self.pid.to_string().contains(&query_lower)
            || self.address.to_lowercase().contains(&query_lower)
            || self.user.to_lowercase().contains(&query_lower)
    }
}

impl std::fmt::Display for PortRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} (PID: {}, Process: {})",
            self.address, self.port, self.pid, self.process_name
        )
    }
}
