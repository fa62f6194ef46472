//! Text layout for the glasses display
//!
//! The display shows a fixed number of lines; anything longer is cut. Widths
//! are measured in characters, which matches the firmware's monospace font
//! closely enough for wrapping.

/// Lines visible on one screen
pub const MAX_LINES: usize = 5;

/// Characters that fit on one line
pub const LINE_WIDTH: usize = 40;

/// Characters per column of a double text wall, including the gutter
const COLUMN_WIDTH: usize = LINE_WIDTH / 2;

/// Word-wrap `text` into lines of at most `width` characters
///
/// Explicit newlines are kept. Words longer than `width` are split hard.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > width {
                if current_len > 0 {
                    lines.push(core::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > width {
                lines.push(core::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    lines
}

/// Wrap and cut `text` to one screen
pub fn text_wall(text: &str) -> String {
    let mut lines = wrap_text(text, LINE_WIDTH);
    lines.truncate(MAX_LINES);
    lines.join("\n")
}

/// Two columns side by side on one screen
///
/// Each column is wrapped independently; the left one is padded so the right
/// column starts at the same offset on every line.
pub fn double_text_wall(left: &str, right: &str) -> String {
    let column = COLUMN_WIDTH - 1;
    let left_lines = wrap_text(left, column);
    let right_lines = wrap_text(right, column);
    let rows = left_lines.len().max(right_lines.len()).min(MAX_LINES);

    (0..rows)
        .map(|row| {
            let l = left_lines.get(row).map(String::as_str).unwrap_or("");
            let r = right_lines.get(row).map(String::as_str).unwrap_or("");
            let pad = COLUMN_WIDTH - l.chars().count();
            format!("{l}{}{r}", " ".repeat(pad)).trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Title above body, as used for reference cards
pub fn reference_card(title: &str, body: &str) -> String {
    text_wall(&format!("{title}\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(
            lines,
            vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]
        );
        assert!(lines.iter().all(|line| line.chars().count() <= 10));
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_keeps_newlines() {
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }

    #[test]
    fn test_text_wall_truncates_lines() {
        let wall = text_wall("1\n2\n3\n4\n5\n6\n7");
        assert_eq!(wall, "1\n2\n3\n4\n5");
    }

    #[test]
    fn test_double_text_wall_aligns_columns() {
        let wall = double_text_wall("left", "right");
        assert_eq!(wall, format!("left{}right", " ".repeat(COLUMN_WIDTH - 4)));

        let wall = double_text_wall("a\nb", "c");
        let lines: Vec<&str> = wall.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "b");
    }
}
