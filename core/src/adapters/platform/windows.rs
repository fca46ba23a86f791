//! Windows strategy: `netstat -ano` for discovery, `tasklist` for names and usage.

use std::collections::HashMap;

use crate::domain::{PortRecord, ProcessEntry, ProcessStats, Protocol, UNKNOWN};
use crate::ports::{CommandSpec, Platform, PlatformStrategy};

use super::utils::{parse_address, parse_csv_line, parse_pid};

/// Windows port discovery strategy.
#[derive(Debug, Default)]
pub struct WindowsStrategy;

impl WindowsStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Parse the output of `netstat -ano` into listening records.
    ///
    /// Example output:
    /// ```text
    /// Active Connections
    ///
    ///   Proto  Local Address          Foreign Address        State           PID
    ///   TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
    ///   TCP    [::]:445               [::]:0                 LISTENING       4
    ///   TCP    127.0.0.1:3000         0.0.0.0:0              LISTENING       5432
    /// ```
    ///
    /// Names and users stay `"Unknown"`; they are filled from `tasklist`.
    pub fn parse_netstat_output(output: &str) -> Vec<PortRecord> {
        let mut ports = Vec::new();

        for line in output.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();

            // Expected format: Proto, Local Address, Foreign Address, State, PID
            if parts.len() < 5 || parts[3] != "LISTENING" {
                continue;
            }

            let Some((address, port)) = parse_address(parts[1]) else {
                continue;
            };
            let Some(pid) = parts.last().and_then(|p| parse_pid(p)) else {
                continue;
            };

            let address = if address == "0.0.0.0" { "*".to_string() } else { address };
            let protocol = Protocol::from_token(parts[0]).unwrap_or_default();
            ports.push(
                PortRecord::listening(port, pid, UNKNOWN, UNKNOWN)
                    .with_address(address)
                    .with_protocol(protocol),
            );
        }

        ports
    }

    /// Parse the output of `tasklist /FO CSV /NH` into entries keyed by PID.
    ///
    /// Example output:
    /// ```text
    /// "System Idle Process","0","Services","0","8 K"
    /// "node.exe","5432","Console","1","45,000 K"
    /// ```
    ///
    /// `tasklist` reports no CPU figure, so CPU stays zero.
    pub fn parse_tasklist_output(output: &str) -> HashMap<u32, ProcessEntry> {
        let mut entries = HashMap::new();

        for line in output.lines() {
            let fields = parse_csv_line(line.trim());
            if fields.len() < 2 {
                continue;
            }

            let Some(pid) = parse_pid(fields[1]) else {
                continue;
            };

            let memory_bytes = fields.get(4).map_or(0, |m| Self::parse_memory(m));
            entries.insert(
                pid,
                ProcessEntry {
                    name: Some(fields[0].to_string()).filter(|n| !n.is_empty()),
                    stats: ProcessStats {
                        cpu_percent: 0.0,
                        memory_bytes,
                    },
                },
            );
        }

        entries
    }

    /// Parse a memory column such as `"45,000 K"` (grouping separators vary by locale).
    fn parse_memory(field: &str) -> u64 {
        let digits: String = field.chars().filter(char::is_ascii_digit).collect();
        digits.parse::<u64>().map_or(0, |kib| kib * 1024)
    }
}

impl PlatformStrategy for WindowsStrategy {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn list_command(&self) -> CommandSpec {
        CommandSpec::new("netstat", ["-ano"])
    }

    fn parse_listing(&self, output: &str) -> Vec<PortRecord> {
        Self::parse_netstat_output(output)
    }

    fn port_lookup_command(&self, _port: u16) -> CommandSpec {
        self.list_command()
    }

    fn parse_port_lookup(&self, output: &str, port: u16) -> Vec<PortRecord> {
        let mut records = Self::parse_netstat_output(output);
        records.retain(|r| r.port == port);
        records
    }

    fn fallback_list_command(&self) -> Option<CommandSpec> {
        None
    }

    fn parse_fallback_listing(&self, _output: &str) -> Vec<PortRecord> {
        Vec::new()
    }

    fn kill_command(&self, pid: u32) -> CommandSpec {
        CommandSpec::new("taskkill", ["/F".to_string(), "/PID".into(), pid.to_string()])
    }

    fn process_table_command(&self) -> CommandSpec {
        CommandSpec::new("tasklist", ["/FO", "CSV", "/NH"])
    }

    fn process_command(&self, pid: u32) -> CommandSpec {
        CommandSpec::new(
            "tasklist",
            [
                "/FI".to_string(),
                format!("PID eq {}", pid),
                "/FO".into(),
                "CSV".into(),
                "/NH".into(),
            ],
        )
    }

    fn parse_process_table(&self, output: &str) -> HashMap<u32, ProcessEntry> {
        Self::parse_tasklist_output(output)
    }
}
