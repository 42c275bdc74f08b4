//! Cache-Control Annotator (spec §4.8): marks up to four positions in an
//! aggregated message list as cacheable, based on tags.

use crate::message::{self, tags, Message};

/// Walks `messages` and marks at most four positions cacheable:
/// (a) immediately before the last `LAST_ASSISTANT_MESSAGE`,
/// (b) immediately before the last `USER_PROMPT`,
/// (c) immediately before the last `STEP_PROMPT`,
/// (d) the last message overall.
///
/// Pure: returns a new list, never mutates `messages`. Duplicate target
/// indices collapse to a single marker (the targets are a set of positions,
/// not a multiset of applications).
pub fn annotate(messages: &[Message]) -> Vec<Message> {
    if messages.is_empty() {
        return Vec::new();
    }

    let mut targets = std::collections::BTreeSet::new();
    if let Some(idx) = last_tag_index(messages, tags::LAST_ASSISTANT_MESSAGE) {
        if idx > 0 {
            targets.insert(idx - 1);
        }
    }
    if let Some(idx) = last_tag_index(messages, tags::USER_PROMPT) {
        if idx > 0 {
            targets.insert(idx - 1);
        }
    }
    if let Some(idx) = last_tag_index(messages, tags::STEP_PROMPT) {
        if idx > 0 {
            targets.insert(idx - 1);
        }
    }
    targets.insert(messages.len() - 1);

    messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            if targets.contains(&i) {
                message::with_cache_control(m)
            } else {
                m.clone()
            }
        })
        .collect()
}

fn last_tag_index(messages: &[Message], tag: &str) -> Option<usize> {
    messages.iter().rposition(|m| m.has_tag(tag))
}

/// Number of messages in `messages` carrying a cache-control marker.
pub fn marker_count(messages: &[Message]) -> usize {
    messages.iter().filter(|m| message::has_cache_control(m)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn msgs() -> Vec<Message> {
        vec![
            Message::system("sys", 0),
            Message::user("hi", 1).with_tag(tags::USER_PROMPT),
            Message::assistant("hello", 2).with_tag(tags::LAST_ASSISTANT_MESSAGE),
        ]
    }

    #[test]
    fn marks_at_most_four_positions() {
        let out = annotate(&msgs());
        assert!(marker_count(&out) <= 4);
    }

    #[test]
    fn last_message_always_marked() {
        let out = annotate(&msgs());
        assert!(message::has_cache_control(out.last().unwrap()));
    }

    #[test]
    fn annotator_is_idempotent() {
        let once = annotate(&msgs());
        let twice = annotate(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn annotator_does_not_mutate_input() {
        let input = msgs();
        let _ = annotate(&input);
        assert_eq!(marker_count(&input), 0);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        assert!(annotate(&[]).is_empty());
    }

    #[test]
    fn marks_message_before_last_assistant_message() {
        let msgs = vec![
            Message::user("a", 0),
            Message::user("b", 1),
            Message::assistant("c", 2).with_tag(tags::LAST_ASSISTANT_MESSAGE),
        ];
        let out = annotate(&msgs);
        assert!(message::has_cache_control(&out[1]));
        assert!(!message::has_cache_control(&out[0]));
    }
}
