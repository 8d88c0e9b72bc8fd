//! Recovering a message's group from what the queue hands back.
//!
//! SQS only returns `MessageGroupId` when asked for it, and LocalStack does
//! not always include it for messages fanned out from SNS. The producer
//! therefore writes the group id into every body, and the reader falls back
//! to finding it there.

use shared::broker::ReceivedMessage;

/// Stats bucket for messages whose group could not be recovered.
pub const UNKNOWN_GROUP: &str = "unknown";

/// Ordered group ids `group-1 ..= group-N`, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRegistry {
    groups: Vec<String>,
}

impl GroupRegistry {
    pub fn generate(count: usize) -> Self {
        Self {
            groups: (1..=count).map(|i| format!("group-{i}")).collect(),
        }
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// First registered group that appears in `body` as a whole token, or
    /// [`UNKNOWN_GROUP`].
    pub fn classify<'a>(&'a self, body: &str) -> &'a str {
        self.groups
            .iter()
            .find(|g| contains_token(body, g))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_GROUP)
    }

    /// Group of `msg`: the transport's group id when it names a registered
    /// group, otherwise whatever the body says.
    pub fn recover<'a>(&'a self, msg: &ReceivedMessage) -> &'a str {
        if let Some(attr) = msg.group_id.as_deref() {
            if let Some(g) = self.groups.iter().find(|g| *g == attr) {
                return g;
            }
        }
        self.classify(&msg.body)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// `needle` occurs in `haystack` with no identifier character on either side,
/// so `group-1` is not found inside `group-10` or `subgroup-1`.
fn contains_token(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}
