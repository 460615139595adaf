//! Event permission matching: `events.produce[]` / `events.consume[]`
//! topic patterns (suffix `*` = prefix match, otherwise exact) and
//! `events.scopes[]`.

use pcore_protocol::{EventScope, EventsPermission};

fn topic_matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

pub fn can_produce(perm: &EventsPermission, scope: EventScope, topic: &str) -> Result<(), String> {
    if !perm.scopes.contains(&scope) {
        return Err(format!("scope '{scope:?}' is not in events.scopes"));
    }
    if perm.produce.iter().any(|p| topic_matches(p, topic)) {
        Ok(())
    } else {
        Err(format!("topic '{topic}' does not match any events.produce pattern"))
    }
}

pub fn can_consume(perm: &EventsPermission, scope: EventScope, topic: &str) -> Result<(), String> {
    if !perm.scopes.contains(&scope) {
        return Err(format!("scope '{scope:?}' is not in events.scopes"));
    }
    if perm.consume.iter().any(|p| topic_matches(p, topic)) {
        Ok(())
    } else {
        Err(format!("topic '{topic}' does not match any events.consume pattern"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm() -> EventsPermission {
        EventsPermission {
            produce: vec!["plugin.formatter.*".into()],
            consume: vec!["plugin.upstream.done".into()],
            scopes: vec![EventScope::Local],
        }
    }

    #[test]
    fn prefix_pattern_matches_produce() {
        assert!(can_produce(&perm(), EventScope::Local, "plugin.formatter.started").is_ok());
        assert!(can_produce(&perm(), EventScope::Local, "plugin.other.started").is_err());
    }

    #[test]
    fn exact_pattern_required_for_consume() {
        assert!(can_consume(&perm(), EventScope::Local, "plugin.upstream.done").is_ok());
        assert!(can_consume(&perm(), EventScope::Local, "plugin.upstream.done.extra").is_err());
    }

    #[test]
    fn scope_not_declared_is_denied() {
        assert!(can_produce(&perm(), EventScope::Plugin, "plugin.formatter.started").is_err());
    }
}
