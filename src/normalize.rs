use crate::models::CanonicalName;

/// Turns a row's raw display text into the canonical query name.
/// Returns `None` when nothing usable remains, which tells the caller to
/// skip the row entirely.
pub fn canonical_name(raw: &str) -> Option<CanonicalName> {
    let stripped = strip_parentheticals(raw);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }

    // "Last, First" registration format swaps to "First Last". Segments
    // past a second comma (suffixes like ", PhD") are dropped.
    let mut parts = trimmed.split(',');
    let query = match (parts.next(), parts.next()) {
        (Some(last), Some(first)) => format!("{} {}", first.trim(), last.trim()),
        _ => trimmed.to_string(),
    };

    let query = query.trim().to_string();
    if query.is_empty() {
        return None;
    }
    Some(CanonicalName::from_query(query))
}

// Removes every "(...)" segment and the whitespace around it. Pronoun
// annotations like "(she/her)" are the common case. An unclosed paren is
// left in place rather than eating the rest of the name.
fn strip_parentheticals(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = rest.find('(') {
        let Some(close_rel) = rest[open..].find(')') else {
            break;
        };
        out.push_str(rest[..open].trim_end());
        rest = rest[open + close_rel + 1..].trim_start();
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &str) -> Option<String> {
        canonical_name(raw).map(|n| n.query().to_string())
    }

    #[test]
    fn strips_parenthesized_pronouns() {
        assert_eq!(query("Jane Doe (she/her)"), Some("Jane Doe".to_string()));
    }

    #[test]
    fn swaps_comma_separated_names() {
        assert_eq!(query("Doe, Jane"), Some("Jane Doe".to_string()));
    }

    #[test]
    fn passes_plain_names_through() {
        assert_eq!(query("Jane Doe"), Some("Jane Doe".to_string()));
    }

    #[test]
    fn handles_pronouns_and_comma_together() {
        assert_eq!(query("Smith, John (he/him)"), Some("John Smith".to_string()));
    }

    #[test]
    fn drops_segments_past_the_second_comma() {
        assert_eq!(query("Doe, Jane, PhD"), Some("Jane Doe".to_string()));
    }

    #[test]
    fn strips_repeated_parenthesized_suffixes() {
        assert_eq!(
            query("Jane Doe (she/her) (on leave)"),
            Some("Jane Doe".to_string())
        );
    }

    #[test]
    fn empty_after_stripping_yields_none() {
        assert_eq!(query("(she/her)"), None);
        assert_eq!(query("   "), None);
        assert_eq!(query(""), None);
    }

    #[test]
    fn unclosed_paren_is_kept_verbatim() {
        assert_eq!(query("Jane Doe (she"), Some("Jane Doe (she".to_string()));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(query("Doe, Jane (she/her)"), query("Doe, Jane (she/her)"));
    }
}
