use std::fmt;

use shared::broker::ReceivedMessage;

use crate::envelope::GroupRegistry;

/// Which messages a consumer is willing to process. Fixed for the
/// consumer's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerScope {
    Any,
    Group(String),
}

impl fmt::Display for ConsumerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerScope::Any => f.write_str("any"),
            ConsumerScope::Group(g) => f.write_str(g),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    Accept,
    Reject,
}

impl ConsumerScope {
    /// Decision for a message whose group has already been recovered.
    pub fn admits(&self, group: &str) -> DispatchDecision {
        match self {
            ConsumerScope::Any => DispatchDecision::Accept,
            ConsumerScope::Group(g) if g == group => DispatchDecision::Accept,
            ConsumerScope::Group(_) => DispatchDecision::Reject,
        }
    }
}

pub fn decide(registry: &GroupRegistry, msg: &ReceivedMessage, scope: &ConsumerScope) -> DispatchDecision {
    match scope {
        ConsumerScope::Any => DispatchDecision::Accept,
        ConsumerScope::Group(_) => scope.admits(registry.recover(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::UNKNOWN_GROUP;

    fn msg(body: &str) -> ReceivedMessage {
        ReceivedMessage {
            message_id: Some("m-1".into()),
            body: body.into(),
            receipt_handle: "rh-1".into(),
            group_id: None,
        }
    }

    #[test]
    fn any_scope_accepts_everything() {
        let reg = GroupRegistry::generate(3);
        for body in ["group-1 - Message 1", "group-3 - Message 9", "garbage", ""] {
            assert_eq!(decide(&reg, &msg(body), &ConsumerScope::Any), DispatchDecision::Accept);
        }
    }

    #[test]
    fn group_scope_accepts_only_its_group() {
        let reg = GroupRegistry::generate(3);
        let scope = ConsumerScope::Group("group-2".into());
        for body in ["group-1 - Message 1", "group-2 - Message 1", "group-3 - Message 1", "garbage"] {
            let expected = if reg.classify(body) == "group-2" {
                DispatchDecision::Accept
            } else {
                DispatchDecision::Reject
            };
            assert_eq!(decide(&reg, &msg(body), &scope), expected, "body {body:?}");
        }
    }

    #[test]
    fn group_scope_rejects_longer_group_id() {
        let reg = GroupRegistry::generate(12);
        let scope = ConsumerScope::Group("group-1".into());
        assert_eq!(decide(&reg, &msg("group-11 - Message 1"), &scope), DispatchDecision::Reject);
        assert_eq!(decide(&reg, &msg("group-1 - Message 1"), &scope), DispatchDecision::Accept);
    }

    #[test]
    fn group_scope_uses_transport_group_id() {
        let reg = GroupRegistry::generate(2);
        let mut m = msg("no group in this body");
        m.group_id = Some("group-1".into());
        assert_eq!(
            decide(&reg, &m, &ConsumerScope::Group("group-1".into())),
            DispatchDecision::Accept
        );
    }

    #[test]
    fn unknown_scope_never_matches_registered_bodies() {
        let scope = ConsumerScope::Group("group-1".into());
        assert_eq!(scope.admits(UNKNOWN_GROUP), DispatchDecision::Reject);
        assert_eq!(ConsumerScope::Any.admits(UNKNOWN_GROUP), DispatchDecision::Accept);
    }

    #[test]
    fn scope_display() {
        assert_eq!(ConsumerScope::Any.to_string(), "any");
        assert_eq!(ConsumerScope::Group("group-4".into()).to_string(), "group-4");
    }
}
