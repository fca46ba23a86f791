//! macOS/Linux strategy: `lsof` for discovery, `netstat` as fallback, `ps` for usage.

use std::collections::HashMap;

use tracing::trace;

use crate::adapters::privilege;
use crate::domain::{PortRecord, ProcessEntry, ProcessStats, Protocol, UNKNOWN};
use crate::ports::{CommandSpec, Platform, PlatformStrategy};

use super::utils::{
    base_name, parse_address, parse_dotted_address, parse_pid, unescape_lsof,
};

/// lsof columns: COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME
const MIN_LSOF_COLUMNS: usize = 9;

/// netstat columns up to the state: Proto Recv-Q Send-Q Local Foreign State
const MIN_NETSTAT_COLUMNS: usize = 6;

/// lsof exits with 1 when no socket matches the selection.
const LSOF_NO_MATCH: i32 = 1;

/// Unix-like port discovery strategy.
pub struct UnixStrategy {
    platform: Platform,
    elevated: bool,
}

impl UnixStrategy {
    /// Create a strategy for `platform`, detecting the current privileges.
    pub fn new(platform: Platform) -> Self {
        Self::with_privileges(platform, privilege::is_elevated())
    }

    /// Create a strategy with explicitly given privileges.
    pub fn with_privileges(platform: Platform, elevated: bool) -> Self {
        Self { platform, elevated }
    }

    /// Parse lsof output into records.
    ///
    /// Expected lsof output format:
    /// ```text
    /// COMMAND    PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
    /// node     34805  code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP [::1]:3000 (LISTEN)
    /// ```
    ///
    /// Only `LISTEN` lines are considered.
    pub fn parse_lsof_output(output: &str) -> Vec<PortRecord> {
        let mut ports = Vec::new();

        for line in output.lines() {
            if !line.contains("LISTEN") {
                continue;
            }

            let components: Vec<&str> = line.split_whitespace().collect();
            if components.len() < MIN_LSOF_COLUMNS {
                trace!(line, "Skipping short lsof line");
                continue;
            }

            let Some(pid) = parse_pid(components[1]) else {
                continue;
            };

            // Search backwards for the NAME column, skipping "(LISTEN)" and device ids
            let Some((address, port)) = components[3..]
                .iter()
                .rev()
                .filter(|c| c.contains(':') && !c.starts_with("0x") && !c.starts_with("0t"))
                .find_map(|c| parse_address(c))
            else {
                continue;
            };

            let protocol = components[3..]
                .iter()
                .find_map(|c| Protocol::from_token(c))
                .unwrap_or_default();

            ports.push(
                PortRecord::listening(port, pid, unescape_lsof(components[0]), components[2])
                    .with_address(address)
                    .with_protocol(protocol),
            );
        }

        ports
    }

    /// Parse `netstat` listening output from Linux (`-tulnp`) or macOS (`-anv`).
    ///
    /// ```text
    /// tcp   0  0 0.0.0.0:22      0.0.0.0:*  LISTEN  812/sshd
    /// tcp4  0  0 127.0.0.1.5432  *.*        LISTEN  131072 131072  610  0 0x0080 0x00000006
    /// tcp4  0  0 *.3000          *.*        LISTEN  131072 131072  node:4242  0 00100 00000006
    /// ```
    ///
    /// Lines without a PID are skipped; names stay `"Unknown"` unless the
    /// line carries them.
    pub fn parse_netstat_output(output: &str) -> Vec<PortRecord> {
        let mut ports = Vec::new();

        for line in output.lines() {
            let components: Vec<&str> = line.split_whitespace().collect();
            if components.len() < MIN_NETSTAT_COLUMNS {
                continue;
            }

            let Some(state_idx) = components.iter().position(|c| *c == "LISTEN") else {
                continue;
            };

            let local = components[3];
            let Some((address, port)) =
                parse_address(local).or_else(|| parse_dotted_address(local))
            else {
                continue;
            };

            let Some((pid, name)) = Self::netstat_owner(&components[state_idx + 1..]) else {
                continue;
            };

            let protocol = Protocol::from_token(components[0]).unwrap_or_default();
            ports.push(
                PortRecord::listening(port, pid, name.unwrap_or(UNKNOWN), UNKNOWN)
                    .with_address(address)
                    .with_protocol(protocol),
            );
        }

        ports
    }

    /// Owner columns after the state: Linux `pid/name`, macOS `pid` or
    /// `name:pid` in the third column (after rhiwat and shiwat).
    fn netstat_owner<'a>(after_state: &[&'a str]) -> Option<(u32, Option<&'a str>)> {
        if let Some((pid, name)) = after_state.iter().find_map(|c| c.split_once('/')) {
            return parse_pid(pid).map(|pid| (pid, Some(name).filter(|n| !n.is_empty())));
        }

        let column = after_state.get(2)?;
        match column.rsplit_once(':') {
            Some((name, pid)) => parse_pid(pid).map(|pid| (pid, Some(name))),
            None => parse_pid(column).map(|pid| (pid, None)),
        }
    }

    /// Parse `ps -o pid=,pcpu=,rss=,comm=` output.
    ///
    /// ```text
    ///   610   0.3  20480 /opt/homebrew/bin/postgres
    /// ```
    pub fn parse_ps_output(output: &str) -> HashMap<u32, ProcessEntry> {
        let mut entries = HashMap::new();

        for line in output.lines() {
            let mut parts = line.split_whitespace();
            let (Some(pid), Some(cpu), Some(rss)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            let Some(pid) = parse_pid(pid) else {
                continue;
            };
            let cpu_percent = cpu.parse::<f64>().unwrap_or(0.0);
            let rss_kib = rss.parse::<u64>().unwrap_or(0);

            let command: Vec<&str> = parts.collect();
            let name = if command.is_empty() {
                None
            } else {
                Some(base_name(&command.join(" ")).to_string())
            };

            entries.insert(
                pid,
                ProcessEntry {
                    name,
                    stats: ProcessStats {
                        cpu_percent,
                        memory_bytes: rss_kib * 1024,
                    },
                },
            );
        }

        entries
    }
}

impl PlatformStrategy for UnixStrategy {
    fn platform(&self) -> Platform {
        self.platform
    }

    /// Executes: `lsof -i -P -n`
    ///
    /// Flags explained:
    /// - -i: Show internet sockets
    /// - -P: Show port numbers (don't resolve to service names)
    /// - -n: Show IP addresses (don't resolve to hostnames)
    fn list_command(&self) -> CommandSpec {
        CommandSpec::new("lsof", ["-i", "-P", "-n"]).with_no_match_status(LSOF_NO_MATCH)
    }

    fn parse_listing(&self, output: &str) -> Vec<PortRecord> {
        Self::parse_lsof_output(output)
    }

    fn port_lookup_command(&self, port: u16) -> CommandSpec {
        CommandSpec::new("lsof", ["-i".to_string(), format!(":{}", port), "-P".into(), "-n".into()])
            .with_no_match_status(LSOF_NO_MATCH)
    }

    fn parse_port_lookup(&self, output: &str, port: u16) -> Vec<PortRecord> {
        let mut records = Self::parse_lsof_output(output);
        records.retain(|r| r.port == port);
        records
    }

    fn fallback_list_command(&self) -> Option<CommandSpec> {
        Some(match self.platform {
            Platform::MacOs => CommandSpec::new("netstat", ["-anv", "-p", "tcp"]),
            _ => CommandSpec::new("netstat", ["-tulnp"]),
        })
    }

    fn parse_fallback_listing(&self, output: &str) -> Vec<PortRecord> {
        Self::parse_netstat_output(output)
    }

    fn kill_command(&self, pid: u32) -> CommandSpec {
        CommandSpec::new("kill", ["-9".to_string(), pid.to_string()])
    }

    fn process_table_command(&self) -> CommandSpec {
        CommandSpec::new("ps", ["-axo", "pid=,pcpu=,rss=,comm="])
    }

    fn process_command(&self, pid: u32) -> CommandSpec {
        CommandSpec::new(
            "ps",
            ["-p".to_string(), pid.to_string(), "-o".into(), "pid=,pcpu=,rss=,comm=".into()],
        )
        .with_no_match_status(1)
    }

    fn parse_process_table(&self, output: &str) -> HashMap<u32, ProcessEntry> {
        Self::parse_ps_output(output)
    }

    fn visibility_notice(&self) -> Option<String> {
        if self.elevated {
            None
        } else {
            Some(
                "Showing ports of processes you own; run with elevated privileges to see every process."
                    .to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSOF_OUTPUT: &str = r#"COMMAND     PID   USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
postgres    610  pgsql    7u  IPv6 0x2b9a9f1f0e0d7c11      0t0  TCP [::1]:5432 (LISTEN)
postgres    610  pgsql    8u  IPv4 0x2b9a9f1f0e0d7c22      0t0  TCP 127.0.0.1:5432 (LISTEN)
node      34805   code   19u  IPv6 0x3d8015e195af1f3f      0t0  TCP *:3000 (LISTEN)
node      34805   code   23u  IPv4 0x3d8015e195af1f40      0t0  TCP 127.0.0.1:3000->127.0.0.1:51000 (ESTABLISHED)
rapportd    512   code    4u  IPv4 0x3d8015e195af1f41      0t0  UDP *:5353
"#;

    #[test]
    fn test_parse_lsof_output() {
        let ports = UnixStrategy::parse_lsof_output(LSOF_OUTPUT);
        assert_eq!(ports.len(), 3);

        assert_eq!(ports[0].key(), (5432, 610));
        assert_eq!(ports[0].process_name, "postgres");
        assert_eq!(ports[0].user, "pgsql");
        assert_eq!(ports[0].address, "[::1]");

        assert_eq!(ports[2].key(), (3000, 34805));
        assert_eq!(ports[2].address, "*");
        assert_eq!(ports[2].protocol, Protocol::Tcp);
    }

    #[test]
    fn test_no_listen_lines_is_empty() {
        assert!(UnixStrategy::parse_lsof_output("").is_empty());
        let output = "COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME\n\
                      node 1 code 23u IPv4 0x1 0t0 TCP 127.0.0.1:3000->127.0.0.1:5 (ESTABLISHED)\n";
        assert!(UnixStrategy::parse_lsof_output(output).is_empty());
    }

    #[test]
    fn test_synthetic_line_round_trip() {
        for (name, pid, user, port) in [("node", 1u32, "dev", 3000u16), ("nginx", 65000, "root", 80), ("redis-server", 77, "redis", 65535)] {
            let line = format!(
                "{} {} {} 6u IPv4 0x1234567890abcdef 0t0 TCP 127.0.0.1:{} (LISTEN)",
                name, pid, user, port
            );
            let ports = UnixStrategy::parse_lsof_output(&line);
            assert_eq!(ports.len(), 1);
            assert_eq!(ports[0].key(), (port, pid));
            assert_eq!(ports[0].process_name, name);
            assert_eq!(ports[0].user, user);
        }
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let output = "node abc code 19u IPv6 0x1 0t0 TCP *:3000 (LISTEN)\n\
                      node 12 code (LISTEN)\n\
                      node 0 code 19u IPv6 0x1 0t0 TCP *:3000 (LISTEN)\n\
                      node 13 code 19u IPv6 0x1 0t0 TCP *:99999 (LISTEN)\n\
                      \u{fffd}\u{fffd} garbage LISTEN\n\
                      node 14 code 19u IPv6 0x1 0t0 TCP *:4000 (LISTEN)\n";
        let ports = UnixStrategy::parse_lsof_output(output);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].key(), (4000, 14));
    }

    #[test]
    fn test_unescape_process_name() {
        let output = "Code\\x20Helper  1234  user   10u  IPv4 0x1234567890abcdef      0t0  TCP *:3000 (LISTEN)";
        let ports = UnixStrategy::parse_lsof_output(output);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].process_name, "Code Helper");
    }

    #[test]
    fn test_port_lookup_filters_port() {
        let strategy = UnixStrategy::with_privileges(Platform::MacOs, true);
        let ports = strategy.parse_port_lookup(LSOF_OUTPUT, 3000);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].pid, 34805);
    }

    #[test]
    fn test_parse_linux_netstat() {
        let output = r#"Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      812/sshd
tcp6       0      0 :::3000                 :::*                    LISTEN      4242/node
tcp        0      0 127.0.0.1:631           0.0.0.0:*               LISTEN      -
udp        0      0 0.0.0.0:68              0.0.0.0:*                           700/dhclient
"#;
        let ports = UnixStrategy::parse_netstat_output(output);
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].key(), (22, 812));
        assert_eq!(ports[0].process_name, "sshd");
        assert_eq!(ports[0].user, UNKNOWN);
        assert_eq!(ports[1].key(), (3000, 4242));
        assert_eq!(ports[1].address, "::");
    }

    #[test]
    fn test_parse_macos_netstat() {
        let output = r#"Active Internet connections (including servers)
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)     rhiwat shiwat    pid   epid  state    options
tcp4       0      0  127.0.0.1.5432         *.*                    LISTEN      131072 131072    610      0 0x0080 0x00000006
tcp46      0      0  *.3000                 *.*                    LISTEN      131072 131072  node:4242  0 00100 00000006
tcp4       0      0  192.168.1.5.50000      17.57.146.1.443        ESTABLISHED 131072 131072    999      0 0x0102 0x00000008
"#;
        let ports = UnixStrategy::parse_netstat_output(output);
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].key(), (5432, 610));
        assert_eq!(ports[0].process_name, UNKNOWN);
        assert_eq!(ports[0].address, "127.0.0.1");
        assert_eq!(ports[1].key(), (3000, 4242));
        assert_eq!(ports[1].process_name, "node");
    }

    #[test]
    fn test_parse_ps_output() {
        let output = "  610   0.3  20480 /opt/homebrew/bin/postgres\n\
                      34805  12.5 102400 node\n\
                      bogus line\n\
                      77 1.0\n";
        let table = UnixStrategy::parse_ps_output(output);
        assert_eq!(table.len(), 2);

        let pg = &table[&610];
        assert_eq!(pg.name.as_deref(), Some("postgres"));
        assert_eq!(pg.stats.memory_bytes, 20480 * 1024);
        assert_eq!(table[&34805].stats.cpu_percent, 12.5);
    }

    #[test]
    fn test_commands() {
        let strategy = UnixStrategy::with_privileges(Platform::Linux, false);
        assert_eq!(strategy.list_command().to_string(), "lsof -i -P -n");
        assert_eq!(strategy.port_lookup_command(8080).to_string(), "lsof -i :8080 -P -n");
        assert_eq!(strategy.kill_command(42).to_string(), "kill -9 42");
        assert_eq!(
            strategy.fallback_list_command().unwrap().to_string(),
            "netstat -tulnp"
        );
        assert!(strategy.visibility_notice().is_some());
        assert!(!strategy.elevation_hint());

        let mac = UnixStrategy::with_privileges(Platform::MacOs, true);
        assert_eq!(
            mac.fallback_list_command().unwrap().to_string(),
            "netstat -anv -p tcp"
        );
        assert!(mac.visibility_notice().is_none());
    }
}
