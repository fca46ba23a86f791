//! Parsing helpers shared by the platform strategies.

use std::sync::OnceLock;

use regex::Regex;

fn trailing_port() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*):(\d+)$").expect("trailing port pattern is valid"))
}

fn parse_port(digits: &str) -> Option<u16> {
    match digits.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Split an `address:port` token.
///
/// Handles multiple address formats:
/// - IPv4: "127.0.0.1:3000" or "*:8080"
/// - IPv6: "\[::1]:3000", "\[fe80::1]:8080" or bare ":::3000"
///
/// An empty address becomes `*`. Port `0` and out-of-range ports are rejected.
pub fn parse_address(token: &str) -> Option<(String, u16)> {
    let caps = trailing_port().captures(token.trim())?;
    let port = parse_port(&caps[2])?;
    let addr = match &caps[1] {
        "" => "*",
        other => other,
    };
    Some((addr.to_string(), port))
}

/// Split a BSD netstat `address.port` token (e.g. "127.0.0.1.5432", "*.3000").
pub fn parse_dotted_address(token: &str) -> Option<(String, u16)> {
    let (addr, digits) = token.trim().rsplit_once('.')?;
    let port = parse_port(digits)?;
    let addr = if addr.is_empty() { "*" } else { addr };
    Some((addr.to_string(), port))
}

/// Parse a positive PID.
pub fn parse_pid(token: &str) -> Option<u32> {
    match token.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(pid) => Some(pid),
    }
}

/// Undo lsof's escaping of spaces and slashes in command names.
pub fn unescape_lsof(name: &str) -> String {
    name.replace("\\x20", " ").replace("\\x2f", "/")
}

/// Last path component of an executable path.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Parse a CSV line, handling quoted fields.
pub fn parse_csv_line(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut field_start: Option<usize> = None;

    for (i, c) in line.char_indices() {
        match c {
            '"' => {
                if in_quotes {
                    // End of quoted field
                    if let Some(start) = field_start {
                        fields.push(&line[start..i]);
                    }
                    field_start = None;
                    in_quotes = false;
                } else {
                    in_quotes = true;
                    field_start = Some(i + 1);
                }
            }
            ',' if !in_quotes => {
                if let Some(start) = field_start.take() {
                    fields.push(&line[start..i]);
                }
            }
            _ => {
                if field_start.is_none() && !in_quotes {
                    field_start = Some(i);
                }
            }
        }
    }

    if let Some(start) = field_start {
        if !in_quotes {
            fields.push(&line[start..]);
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4_address() {
        assert_eq!(parse_address("127.0.0.1:3000"), Some(("127.0.0.1".to_string(), 3000)));
        assert_eq!(parse_address("*:8080"), Some(("*".to_string(), 8080)));
        assert_eq!(parse_address(":9000"), Some(("*".to_string(), 9000)));
    }

    #[test]
    fn test_parse_ipv6_address() {
        assert_eq!(parse_address("[::1]:3000"), Some(("[::1]".to_string(), 3000)));
        assert_eq!(parse_address("[fe80::1]:8080"), Some(("[fe80::1]".to_string(), 8080)));
        assert_eq!(parse_address(":::3000"), Some(("::".to_string(), 3000)));
    }

    #[test]
    fn test_parse_address_rejects_bad_ports() {
        assert_eq!(parse_address("127.0.0.1:0"), None);
        assert_eq!(parse_address("127.0.0.1:70000"), None);
        assert_eq!(parse_address("127.0.0.1:http"), None);
        assert_eq!(parse_address("(LISTEN)"), None);
        assert_eq!(parse_address("0.0.0.0:*"), None);
    }

    #[test]
    fn test_parse_dotted_address() {
        assert_eq!(parse_dotted_address("127.0.0.1.5432"), Some(("127.0.0.1".to_string(), 5432)));
        assert_eq!(parse_dotted_address("*.3000"), Some(("*".to_string(), 3000)));
        assert_eq!(parse_dotted_address("::1.8080"), Some(("::1".to_string(), 8080)));
        assert_eq!(parse_dotted_address("*.*"), None);
    }

    #[test]
    fn test_unescape_and_base_name() {
        assert_eq!(unescape_lsof("Code\\x20Helper"), "Code Helper");
        assert_eq!(base_name("/usr/sbin/sshd"), "sshd");
        assert_eq!(base_name("C:\\Windows\\svchost.exe"), "svchost.exe");
        assert_eq!(base_name("node"), "node");
    }

    #[test]
    fn test_parse_csv_line() {
        let line = r#""node.exe","5432","Console","1","45,000 K""#;
        let fields = parse_csv_line(line);

        assert_eq!(fields, vec!["node.exe", "5432", "Console", "1", "45,000 K"]);
    }
}
