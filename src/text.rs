/// Telegram caps a single message at 4096 characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Split `text` into ordered pieces no longer than `max_length` characters.
///
/// Prefers cutting at a line boundary when one falls past the midpoint of
/// the current window, otherwise cuts hard at `max_length`. Newlines left
/// at the start of the remainder are dropped so no piece begins with one.
pub fn split_message(text: &str, max_length: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_length {
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut rest: &[char] = &chars;
    while !rest.is_empty() {
        if rest.len() <= max_length {
            chunks.push(rest.iter().collect());
            break;
        }
        let window = &rest[..max_length];
        let cut = match window.iter().rposition(|&c| c == '\n') {
            Some(pos) if pos > max_length / 2 => pos + 1,
            _ => max_length,
        };
        chunks.push(rest[..cut].iter().collect());
        rest = &rest[cut..];
        while rest.first() == Some(&'\n') {
            rest = &rest[1..];
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_empty() {
        assert_eq!(split_message("short", 4096), vec!["short"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn test_hard_cut_without_newlines() {
        let text = "x".repeat(9000);
        let chunks = split_message(&text, 4096);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![4096, 4096, 808]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4096));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_cut_at_newline_past_midpoint() {
        let mut text = "a".repeat(3000);
        text.push('\n');
        text.push_str(&"b".repeat(1999));
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with('\n'));
        assert_eq!(chunks[0].chars().count(), 3001);
        assert!(!chunks[1].starts_with('\n'));
        assert_eq!(chunks[1], "b".repeat(1999));
    }

    #[test]
    fn test_newline_before_midpoint_ignored() {
        let mut text = "a".repeat(100);
        text.push('\n');
        text.push_str(&"b".repeat(5000));
        let chunks = split_message(&text, 4096);
        // Newline at index 100 is before the midpoint, so the cut is hard.
        assert_eq!(chunks[0].chars().count(), 4096);
    }

    #[test]
    fn test_run_of_newlines_at_cut_is_stripped() {
        let mut text = "a".repeat(3000);
        text.push_str("\n\n\n");
        text.push_str(&"b".repeat(2000));
        let chunks = split_message(&text, 4096);
        assert!(!chunks[1].starts_with('\n'));
        assert!(chunks[1].starts_with('b'));
    }

    #[test]
    fn test_multibyte_lengths_counted_in_chars() {
        let text = "й".repeat(5000);
        let chunks = split_message(&text, 4096);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![4096, 904]);
    }
}
