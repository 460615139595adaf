//! Network permission gate: host allow/deny lists plus IPv4 CIDR
//! matching, evaluated against a normalised host string.

use crate::GateDecision;
use ipnetwork::IpNetwork;
use pcore_protocol::NetPermission;
use std::net::IpAddr;

/// Strip scheme, port, path, and a trailing dot; lower-case the rest.
pub fn normalize_host(raw: &str) -> String {
    let without_scheme = raw.split("://").last().unwrap_or(raw);
    let host_and_port = without_scheme.split('/').next().unwrap_or(without_scheme);
    let host = if let Some(idx) = host_and_port.rfind(':') {
        // Guard against stripping a port out of a bare IPv6 literal; our
        // inputs are always plain hostnames or dotted-quad IPv4.
        if host_and_port[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
            &host_and_port[..idx]
        } else {
            host_and_port
        }
    } else {
        host_and_port
    };
    host.trim_end_matches('.').to_lowercase()
}

fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        host == suffix || host.ends_with(&format!(".{suffix}"))
    } else {
        pattern.eq_ignore_ascii_case(host)
    }
}

fn matches_cidr(cidr: &str, host: &str) -> bool {
    let Ok(ip) = host.parse::<IpAddr>() else { return false };
    let Ok(network) = cidr.parse::<IpNetwork>() else { return false };
    network.contains(ip)
}

/// `checkNet(perm, host)`: `none` denies everything; otherwise an
/// explicit deny wins, then exact/`*.suffix` allow matches or CIDR
/// membership grant.
pub fn check_net(perm: &NetPermission, host: &str) -> GateDecision {
    let normalized = normalize_host(host);

    match perm {
        NetPermission::None => GateDecision::deny("net permission is 'none'")
            .with_remediation("grant an allowHosts/allowCidrs entry in permissions.net"),
        NetPermission::Allow { allow_hosts, deny_hosts, allow_cidrs } => {
            if deny_hosts.iter().any(|p| matches_host_pattern(p, &normalized)) {
                return GateDecision::deny(format!("host '{normalized}' matches a net.denyHosts pattern"));
            }
            let host_allowed = allow_hosts.iter().any(|p| matches_host_pattern(p, &normalized));
            let cidr_allowed = allow_cidrs.iter().any(|c| matches_cidr(c, &normalized));
            if host_allowed || cidr_allowed {
                GateDecision::allow()
            } else {
                GateDecision::deny(format!("host '{normalized}' does not match any allowHosts/allowCidrs entry"))
                    .with_remediation(format!("add '{normalized}' to permissions.net.allowHosts"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(hosts: &[&str], deny: &[&str], cidrs: &[&str]) -> NetPermission {
        NetPermission::Allow {
            allow_hosts: hosts.iter().map(|s| s.to_string()).collect(),
            deny_hosts: deny.iter().map(|s| s.to_string()).collect(),
            allow_cidrs: cidrs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn none_permission_denies_all() {
        assert!(!check_net(&NetPermission::None, "example.com").granted);
    }

    #[test]
    fn suffix_wildcard_matches_subdomains() {
        let p = allow(&["*.example.com"], &[], &[]);
        assert!(check_net(&p, "api.example.com").granted);
        assert!(check_net(&p, "example.com").granted);
        assert!(!check_net(&p, "evil.com").granted);
    }

    #[test]
    fn deny_host_wins_over_allow() {
        let p = allow(&["*.example.com"], &["internal.example.com"], &[]);
        assert!(!check_net(&p, "internal.example.com").granted);
    }

    #[test]
    fn cidr_membership_grants_access() {
        let p = allow(&[], &[], &["10.0.0.0/8"]);
        assert!(check_net(&p, "10.1.2.3").granted);
        assert!(!check_net(&p, "192.168.1.1").granted);
    }

    #[test]
    fn normalize_host_strips_scheme_port_and_path() {
        assert_eq!(normalize_host("HTTPS://Example.com:8443/path"), "example.com");
    }
}
