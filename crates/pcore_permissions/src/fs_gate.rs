//! Filesystem permission gate: glob allow/deny over a normalised,
//! syntactic path — no symlink resolution, no filesystem access.

use crate::{GateDecision, SECURITY_CRITICAL_DENY};
use globset::{Glob, GlobSetBuilder};
use pcore_protocol::{FsMode, FsPermission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Read,
    Write,
}

/// Collapse `.` and `..` components syntactically, without touching
/// the filesystem or following symlinks. A `..` that would climb above
/// the root is kept as a literal leading component so later matching
/// (and the caller) can treat it as suspicious rather than silently
/// dropping it.
pub fn normalize_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if matches!(out.last(), Some(last) if *last != "..") {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

fn build_globset(patterns: &[String]) -> globset::GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// `checkFs(perm, path)`: deny precedes allow, `mode=none` denies
/// everything, writes are rejected under `mode=read`, and an empty
/// allow list denies (absence of an allow list for a required
/// resource denies).
pub fn check_fs(perm: &FsPermission, path: &str, op: FsOp) -> GateDecision {
    let normalized = normalize_path(path);

    let hard_deny = build_globset(&SECURITY_CRITICAL_DENY.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    if hard_deny.is_match(&normalized) {
        return GateDecision::deny(format!(
            "'{normalized}' matches a security-critical deny pattern"
        ));
    }

    match perm.mode() {
        FsMode::None => {
            return GateDecision::deny("fs.mode is 'none'")
                .with_remediation("set permissions.fs.mode to 'read' or 'readWrite'");
        }
        FsMode::Read if op == FsOp::Write => {
            return GateDecision::deny("fs.mode is 'read'; write access requires 'readWrite'")
                .with_remediation("set permissions.fs.mode to 'readWrite'");
        }
        FsMode::Read | FsMode::ReadWrite => {}
    }

    let deny_set = build_globset(&perm.deny);
    if deny_set.is_match(&normalized) {
        return GateDecision::deny(format!("'{normalized}' matches an fs.deny pattern"));
    }

    if perm.allow.is_empty() {
        return GateDecision::deny("fs.allow is empty; no resource is granted by default")
            .with_remediation("add a glob pattern covering this path to permissions.fs.allow");
    }

    let allow_set = build_globset(&perm.allow);
    if allow_set.is_match(&normalized) {
        GateDecision::allow()
    } else {
        GateDecision::deny(format!("'{normalized}' does not match any fs.allow pattern"))
            .with_remediation(format!("add a pattern matching '{normalized}' to permissions.fs.allow"))
    }
}
