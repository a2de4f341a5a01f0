use crate::platform::EntitySpan;

/// Derive the registry lookup term from a mention's text by cutting out every
/// user-mention and hashtag span, then trimming whitespace.
///
/// Offsets count characters, matching the platform's entity indices. The two
/// span lists are merged and removed left-to-right as a union of covered
/// ranges, so overlapping spans behave like one larger span and offsets past
/// the end of the text are clamped.
pub fn search_term(text: &str, mentions: &[EntitySpan], hashtags: &[EntitySpan]) -> String {
    let chars: Vec<char> = text.chars().collect();

    let mut spans: Vec<EntitySpan> = mentions.iter().chain(hashtags).copied().collect();
    spans.sort_by_key(|s| (s.start, s.end));

    let mut kept = String::new();
    let mut cursor = 0usize;
    for span in spans {
        let start = span.start.min(chars.len());
        let end = span.end.max(start).min(chars.len());
        if start > cursor {
            kept.extend(&chars[cursor..start]);
        }
        cursor = cursor.max(end);
    }
    if cursor < chars.len() {
        kept.extend(&chars[cursor..]);
    }

    kept.trim().to_string()
}
