//! Process protection policy.
//!
//! Classifies a `(process name, port)` pair into a [`ProtectionVerdict`]:
//!
//! 1. Critical system processes are blocked outright and can never be
//!    overridden.
//! 2. Protected services (databases, container runtimes, web servers, ...)
//!    warn with category-specific reasons.
//! 3. Privileged ports (`< 1024`) warn that elevated privileges are needed.
//! 4. Well-known critical-service ports warn with the affected service.
//!
//! Rules accumulate: every matching rule contributes its reasons and the
//! verdict takes the most severe level.
//!
//! Name matching is case-insensitive and deliberately permissive (see
//! [`name_matches`]); flagging a harmless process is preferable to letting a
//! database be killed without a warning.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Ports whose termination takes down a well-known service.
const CRITICAL_SERVICE_PORTS: &[(u16, &str)] = &[
    (22, "SSH"),
    (80, "HTTP"),
    (443, "HTTPS"),
    (3306, "MySQL"),
    (5432, "PostgreSQL"),
    (27017, "MongoDB"),
    (6379, "Redis"),
];

/// Core OS processes that must never be terminated.
const CRITICAL_PROCESSES: &[&str] = &[
    "kernel_task",
    "launchd",
    "systemd",
    "kthreadd",
    "windowserver",
    "loginwindow",
    "csrss",
    "lsass",
    "wininit",
    "winlogon",
    "smss",
    "svchost",
];

/// Highest port number that requires elevated privileges to bind.
const SYSTEM_PORT_LIMIT: u16 = 1024;

/// Name of the service conventionally hosted on `port`, if it is critical.
pub fn critical_service(port: u16) -> Option<&'static str> {
    CRITICAL_SERVICE_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
}

/// Whether a port is privileged or hosts a critical service.
pub fn is_critical_port(port: u16) -> bool {
    port < SYSTEM_PORT_LIMIT || critical_service(port).is_some()
}

/// Whether `process_name` belongs to the set entry `entry`.
///
/// Both sides are compared lowercase. A name matches when it equals the
/// entry, contains it, ends with `/entry` (path-qualified executables such
/// as `/usr/bin/mongod`) or starts with `entry.` (extension-qualified names
/// such as `mysqld.exe`).
pub fn name_matches(process_name: &str, entry: &str) -> bool {
    let name = process_name.trim().to_lowercase();
    let entry = entry.trim().to_lowercase();
    if name.is_empty() || entry.is_empty() {
        return false;
    }

    name == entry
        || name.contains(&entry)
        || name.ends_with(&format!("/{}", entry))
        || name.starts_with(&format!("{}.", entry))
}

/// Severity of a protection verdict. Ordered: `None < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionLevel {
    #[default]
    None,
    Warning,
    Critical,
}

impl std::fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionLevel::None => write!(f, "none"),
            ProtectionLevel::Warning => write!(f, "warning"),
            ProtectionLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Outcome of classifying a process/port pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionVerdict {
    pub level: ProtectionLevel,
    pub reasons: Vec<String>,
    pub can_override: bool,
}

impl ProtectionVerdict {
    /// Verdict for a process nothing objects to.
    pub fn unprotected() -> Self {
        Self {
            level: ProtectionLevel::None,
            reasons: Vec::new(),
            can_override: true,
        }
    }

    /// Any rule fired.
    pub fn is_protected(&self) -> bool {
        self.level > ProtectionLevel::None
    }

    /// Termination is forbidden no matter what the user answers.
    pub fn is_blocked(&self) -> bool {
        self.level == ProtectionLevel::Critical && !self.can_override
    }

    /// Combine two verdicts for the same process: the higher level wins,
    /// reasons are joined, and overriding needs both to allow it.
    pub fn merge(mut self, other: ProtectionVerdict) -> Self {
        self.level = self.level.max(other.level);
        self.can_override &= other.can_override;
        for reason in other.reasons {
            if !self.reasons.contains(&reason) {
                self.reasons.push(reason);
            }
        }
        self
    }

    /// Flag a process whose identity could not be confirmed.
    pub fn unverified(&mut self, reason: impl Into<String>) {
        self.raise(ProtectionLevel::Warning, reason.into());
    }

    fn raise(&mut self, level: ProtectionLevel, reason: String) {
        self.level = self.level.max(level);
        self.reasons.push(reason);
    }
}

impl Default for ProtectionVerdict {
    fn default() -> Self {
        Self::unprotected()
    }
}

/// Why a service is on the protected list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectedCategory {
    /// Database engines and caches (postgres, mysqld, redis, ...)
    Database,
    /// Container and virtualization runtimes (dockerd, containerd, ...)
    Infrastructure,
    /// Web servers and reverse proxies (nginx, httpd, ...)
    WebServer,
    /// Remote access daemons (sshd)
    RemoteAccess,
}

impl ProtectedCategory {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProtectedCategory::Database => "Database",
            ProtectedCategory::Infrastructure => "Infrastructure",
            ProtectedCategory::WebServer => "Web Server",
            ProtectedCategory::RemoteAccess => "Remote Access",
        }
    }

    fn reasons(&self, process_name: &str) -> Vec<String> {
        match self {
            ProtectedCategory::Database => vec![
                format!("{} is a database service", process_name),
                "Terminating it may cause data loss or corruption of uncommitted transactions"
                    .to_string(),
            ],
            ProtectedCategory::Infrastructure => vec![
                format!("{} is an infrastructure service", process_name),
                "Containers and services that depend on it will stop working".to_string(),
            ],
            ProtectedCategory::WebServer => vec![
                format!("{} is a web server", process_name),
                "Sites and applications it serves will become unreachable".to_string(),
            ],
            ProtectedCategory::RemoteAccess => vec![
                format!("{} provides remote access", process_name),
                "Active remote sessions will be disconnected".to_string(),
            ],
        }
    }
}

impl std::str::FromStr for ProtectedCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "database" | "db" => Ok(ProtectedCategory::Database),
            "infrastructure" | "infra" => Ok(ProtectedCategory::Infrastructure),
            "webserver" | "web" => Ok(ProtectedCategory::WebServer),
            "remoteaccess" | "remote" => Ok(ProtectedCategory::RemoteAccess),
            other => Err(format!("unknown protection category: {}", other)),
        }
    }
}

impl std::fmt::Display for ProtectedCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One entry of a [`ProtectedProcessSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedEntry {
    pub name: String,
    pub category: ProtectedCategory,
}

/// Named process list whose members warn before termination.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtectedProcessSet {
    entries: Vec<ProtectedEntry>,
}

impl ProtectedProcessSet {
    /// An empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in list of databases, runtimes and servers.
    pub fn with_defaults() -> Self {
        use ProtectedCategory::*;

        const DEFAULTS: &[(&str, ProtectedCategory)] = &[
            ("postgres", Database),
            ("mysqld", Database),
            ("mysql", Database),
            ("mariadb", Database),
            ("mongod", Database),
            ("redis-server", Database),
            ("redis", Database),
            ("sqlservr", Database),
            ("oracle", Database),
            ("memcached", Database),
            ("elasticsearch", Database),
            ("cassandra", Database),
            ("clickhouse", Database),
            ("cockroach", Database),
            ("dockerd", Infrastructure),
            ("docker", Infrastructure),
            ("com.docker", Infrastructure),
            ("containerd", Infrastructure),
            ("kubelet", Infrastructure),
            ("podman", Infrastructure),
            ("vmware", Infrastructure),
            ("virtualbox", Infrastructure),
            ("qemu", Infrastructure),
            ("nginx", WebServer),
            ("httpd", WebServer),
            ("apache", WebServer),
            ("caddy", WebServer),
            ("traefik", WebServer),
            ("w3wp", WebServer),
            ("sshd", RemoteAccess),
        ];

        let mut set = Self::empty();
        for (name, category) in DEFAULTS {
            set.add(*name, *category);
        }
        set
    }

    /// Add an entry. Returns `false` if the name was already present.
    pub fn add(&mut self, name: impl Into<String>, category: ProtectedCategory) -> bool {
        let name = name.into().trim().to_lowercase();
        if name.is_empty() || self.entries.iter().any(|e| e.name == name) {
            return false;
        }
        self.entries.push(ProtectedEntry { name, category });
        true
    }

    /// Remove an entry by exact (case-insensitive) name.
    pub fn remove(&mut self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    /// First entry `process_name` is a member of, by [`name_matches`].
    pub fn find(&self, process_name: &str) -> Option<&ProtectedEntry> {
        self.entries
            .iter()
            .find(|e| name_matches(process_name, &e.name))
    }

    pub fn contains(&self, process_name: &str) -> bool {
        self.find(process_name).is_some()
    }

    pub fn entries(&self) -> &[ProtectedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classifies process/port pairs against the protection policy.
///
/// Owns its protected set; mutations affect this instance only.
pub struct ProtectionClassifier {
    protected: RwLock<ProtectedProcessSet>,
}

impl ProtectionClassifier {
    /// Create a classifier over the given protected set.
    pub fn new(protected: ProtectedProcessSet) -> Self {
        Self {
            protected: RwLock::new(protected),
        }
    }

    /// Classify a process/port pair.
    pub fn classify(&self, process_name: &str, port: u16) -> ProtectionVerdict {
        let mut verdict = ProtectionVerdict::unprotected();

        if let Some(entry) = CRITICAL_PROCESSES
            .iter()
            .find(|entry| name_matches(process_name, entry))
        {
            verdict.raise(
                ProtectionLevel::Critical,
                format!("{} is a critical system process ({})", process_name, entry),
            );
            verdict.reasons.push(
                "Terminating it can crash or destabilize the operating system".to_string(),
            );
            verdict.can_override = false;
        }

        if let Some(entry) = self.protected.read().find(process_name) {
            for reason in entry.category.reasons(process_name) {
                verdict.raise(ProtectionLevel::Warning, reason);
            }
        }

        if port > 0 && port < SYSTEM_PORT_LIMIT {
            verdict.raise(
                ProtectionLevel::Warning,
                format!(
                    "Port {} is a system port; stopping its owner requires elevated privileges",
                    port
                ),
            );
        }

        if let Some(service) = critical_service(port) {
            verdict.raise(
                ProtectionLevel::Warning,
                format!("Port {} is the standard {} port", port, service),
            );
        }

        verdict
    }

    /// Whether `process_name` is in this classifier's protected set.
    pub fn is_protected(&self, process_name: &str) -> bool {
        self.protected.read().contains(process_name)
    }

    /// Add a name to the protected set.
    pub fn add_protected(&self, name: &str, category: ProtectedCategory) -> bool {
        self.protected.write().add(name, category)
    }

    /// Remove a name from the protected set.
    pub fn remove_protected(&self, name: &str) -> bool {
        self.protected.write().remove(name)
    }

    /// Snapshot of the protected set.
    pub fn protected_set(&self) -> ProtectedProcessSet {
        self.protected.read().clone()
    }
}

impl Default for ProtectionClassifier {
    fn default() -> Self {
        Self::new(ProtectedProcessSet::with_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_process_is_blocked_on_any_port() {
        let classifier = ProtectionClassifier::default();
        for port in [9999, 80, 1] {
            let verdict = classifier.classify("kernel_task", port);
            assert_eq!(verdict.level, ProtectionLevel::Critical);
            assert!(!verdict.can_override);
            assert!(verdict.is_blocked());
        }
    }

    #[test]
    fn test_plain_dev_server_is_unprotected() {
        let classifier = ProtectionClassifier::default();
        let verdict = classifier.classify("node", 8080);
        assert_eq!(verdict.level, ProtectionLevel::None);
        assert!(verdict.reasons.is_empty());
        assert!(verdict.can_override);
    }

    #[test]
    fn test_system_port_fires_for_unknown_process() {
        let classifier = ProtectionClassifier::default();
        let verdict = classifier.classify("unknown-app", 22);
        assert_ne!(verdict.level, ProtectionLevel::None);
        assert!(verdict.can_override);
        assert!(verdict.reasons.iter().any(|r| r.contains("elevated privileges")));
        assert!(verdict.reasons.iter().any(|r| r.contains("SSH")));
    }

    #[test]
    fn test_protected_matching_is_case_insensitive() {
        let classifier = ProtectionClassifier::default();
        assert!(classifier.is_protected("POSTGRES"));
        assert!(classifier.is_protected("postgres"));
        assert!(classifier.is_protected("PostgreSQL"));
    }

    #[test]
    fn test_path_and_extension_qualified_names() {
        let set = ProtectedProcessSet::with_defaults();
        assert!(set.contains("mysqld.exe"));
        assert!(set.contains("/usr/bin/mongod"));
        assert!(set.contains("Docker Desktop"));
        assert!(!set.contains("node"));
        assert!(!set.contains("python3"));
    }

    #[test]
    fn test_name_matches_rules() {
        assert!(name_matches("nginx", "nginx"));
        assert!(name_matches("NGINX: worker process", "nginx"));
        assert!(name_matches("/opt/homebrew/bin/redis", "redis"));
        assert!(name_matches("sqlservr.exe", "sqlservr"));
        assert!(!name_matches("", "nginx"));
        assert!(!name_matches("nginx", ""));
        assert!(!name_matches("vite", "nginx"));
    }

    #[test]
    fn test_permissive_match_flags_lookalikes() {
        // Over-matching is accepted: a backup tool named after the database still warns.
        let classifier = ProtectionClassifier::default();
        assert!(classifier.is_protected("mypostgres-backup"));
    }

    #[test]
    fn test_database_reasons_mention_data_loss() {
        let classifier = ProtectionClassifier::default();
        let verdict = classifier.classify("postgres", 5432);
        assert_eq!(verdict.level, ProtectionLevel::Warning);
        assert!(verdict.can_override);
        assert!(verdict.reasons.iter().any(|r| r.contains("data loss")));
        assert!(verdict.reasons.iter().any(|r| r.contains("PostgreSQL")));
    }

    #[test]
    fn test_infrastructure_reasons_mention_dependents() {
        let classifier = ProtectionClassifier::default();
        let verdict = classifier.classify("com.docker.backend", 2375);
        assert_eq!(verdict.level, ProtectionLevel::Warning);
        assert!(verdict.reasons.iter().any(|r| r.contains("depend")));
    }

    #[test]
    fn test_critical_wins_and_keeps_all_reasons() {
        let classifier = ProtectionClassifier::default();
        let verdict = classifier.classify("svchost.exe", 443);
        assert_eq!(verdict.level, ProtectionLevel::Critical);
        assert!(!verdict.can_override);
        assert!(verdict.reasons.iter().any(|r| r.contains("critical system process")));
        assert!(verdict.reasons.iter().any(|r| r.contains("system port")));
        assert!(verdict.reasons.iter().any(|r| r.contains("HTTPS")));
    }

    #[test]
    fn test_critical_service_port_above_1024() {
        let classifier = ProtectionClassifier::default();
        let verdict = classifier.classify("my-cache", 6379);
        assert_eq!(verdict.level, ProtectionLevel::Warning);
        assert_eq!(verdict.reasons.len(), 1);
        assert!(verdict.reasons[0].contains("Redis"));
    }

    #[test]
    fn test_instances_do_not_share_sets() {
        let first = ProtectionClassifier::default();
        let second = ProtectionClassifier::new(ProtectedProcessSet::empty());

        assert!(first.add_protected("My-Worker", ProtectedCategory::Infrastructure));
        assert!(first.is_protected("my-worker"));
        assert!(!second.is_protected("my-worker"));

        assert!(first.remove_protected("MY-WORKER"));
        assert!(!first.is_protected("my-worker"));
        assert!(!first.remove_protected("my-worker"));
    }

    #[test]
    fn test_add_rejects_duplicates_and_blank() {
        let mut set = ProtectedProcessSet::empty();
        assert!(set.add("Nginx", ProtectedCategory::WebServer));
        assert!(!set.add("nginx", ProtectedCategory::WebServer));
        assert!(!set.add("  ", ProtectedCategory::WebServer));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("database".parse::<ProtectedCategory>(), Ok(ProtectedCategory::Database));
        assert_eq!("Web-Server".parse::<ProtectedCategory>(), Ok(ProtectedCategory::WebServer));
        assert_eq!("remote".parse::<ProtectedCategory>(), Ok(ProtectedCategory::RemoteAccess));
        assert!("printer".parse::<ProtectedCategory>().is_err());
    }

    #[test]
    fn test_critical_port_table() {
        assert_eq!(critical_service(22), Some("SSH"));
        assert_eq!(critical_service(27017), Some("MongoDB"));
        assert_eq!(critical_service(3000), None);
        assert!(is_critical_port(1023));
        assert!(!is_critical_port(1024));
        assert!(is_critical_port(3306));
    }

    #[test]
    fn test_merge_keeps_the_stricter_verdict() {
        let classifier = ProtectionClassifier::default();
        let claimed = classifier.classify("node", 8080);
        let actual = classifier.classify("launchd", 8080);

        let merged = claimed.merge(actual);
        assert_eq!(merged.level, ProtectionLevel::Critical);
        assert!(merged.is_blocked());
        assert!(merged.reasons.iter().any(|r| r.contains("launchd")));

        let mut unknown = ProtectionVerdict::unprotected();
        unknown.unverified("PID 42 could not be identified");
        assert!(unknown.is_protected());
        assert!(!unknown.is_blocked());
        let merged = unknown.clone().merge(unknown);
        assert_eq!(merged.reasons.len(), 1);
    }
}
