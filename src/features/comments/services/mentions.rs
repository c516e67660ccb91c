use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `@name` or `@name@example.com`, only at the start of the text or after
    /// whitespace/an opening bracket so plain email addresses are not mentions.
    static ref MENTION_REGEX: Regex =
        Regex::new(r"(?:^|[\s(\[])@([A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+|[A-Za-z0-9_][A-Za-z0-9._-]*)")
            .unwrap();
}

/// Lowercased, de-duplicated mention handles in order of appearance.
///
/// A handle is either a full email or the local part of one.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for caps in MENTION_REGEX.captures_iter(content) {
        let handle = caps[1].trim_end_matches(['.', '-']).to_lowercase();
        if !handle.is_empty() && !handles.contains(&handle) {
            handles.push(handle);
        }
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_part_and_email_mentions() {
        let mentions = extract_mentions("@Ana please check, cc @bob.smith@Example.com");
        assert_eq!(mentions, vec!["ana", "bob.smith@example.com"]);
    }

    #[test]
    fn test_plain_email_is_not_a_mention() {
        assert!(extract_mentions("write to support@example.com").is_empty());
    }

    #[test]
    fn test_trailing_punctuation_and_duplicates() {
        let mentions = extract_mentions("Thanks @ana. (@ana) @carol-");
        assert_eq!(mentions, vec!["ana", "carol"]);
    }

    #[test]
    fn test_no_mentions() {
        assert!(extract_mentions("nothing to see @ here").is_empty());
    }
}
