//! Privilege detection.

/// Whether the current process runs as root.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Windows visibility does not depend on elevation for `netstat -ano`.
#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}
