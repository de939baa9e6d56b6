//! Topic name and topic filter rules.
//!
//! Publish topics must be concrete. Subscription filters may use `+` for
//! exactly one level and `#` for the remainder, each occupying a whole level.

use crate::error::{Error, Result};

const MAX_TOPIC_LEN: usize = u16::MAX as usize;

fn invalid(topic: &str, reason: &'static str) -> Error {
    Error::InvalidTopic {
        topic: topic.to_string(),
        reason,
    }
}

fn check_common(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(invalid(topic, "empty"));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(invalid(topic, "longer than 65535 bytes"));
    }
    if topic.contains('\0') {
        return Err(invalid(topic, "contains NUL"));
    }
    Ok(())
}

/// Validate a topic used for PUBLISH.
pub fn validate_topic(topic: &str) -> Result<()> {
    check_common(topic)?;
    if topic.contains(['+', '#']) {
        return Err(invalid(topic, "wildcards are not allowed in publish topics"));
    }
    Ok(())
}

/// Validate a topic filter used for SUBSCRIBE.
pub fn validate_filter(filter: &str) -> Result<()> {
    check_common(filter)?;

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != last) {
            return Err(invalid(filter, "'#' must be the whole last level"));
        }
        if level.contains('+') && *level != "+" {
            return Err(invalid(filter, "'+' must occupy a whole level"));
        }
    }
    Ok(())
}

/// Whether `topic` matches `filter`.
///
/// Topics starting with `$` are not matched by a leading wildcard.
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
