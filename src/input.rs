/* Wraps the text being parsed. Combinators only ever look at the input through
 * this cursor, and errors turn their byte offsets into line/column positions
 * with it. */

use std::fmt;


/* Public Interface */

/* A human readable location. Both fields are 1-based, and the column counts
 * characters (not bytes) from the start of the line. The all-zero default
 * marks a position that has not been resolved. */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.column)
    }
}

#[derive(Debug, Clone)]
pub struct Input<'a> {
    text: &'a str,
    /* Offset of the first byte of every line after the first, i.e. one past
     * each '\n'. Sorted, since it is built by a single forward scan. */
    line_starts: Vec<usize>,
}

impl<'a> Input<'a> {
    pub fn new(text: &'a str) -> Self {
        let line_starts = text.match_indices('\n')
            .map(|(index, _)| index + 1)
            .collect();

        Input { text, line_starts }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /* None at (or past) the end of input, or when offset splits a character. */
    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.text.get(offset..)?.chars().next()
    }

    /* Up to `len` bytes starting at `offset`, clamped to the end of input. */
    pub fn substring(&self, offset: usize, len: usize) -> &'a str {
        let end = offset.saturating_add(len).min(self.text.len());
        self.text.get(offset..end).unwrap_or("")
    }

    pub fn starts_with(&self, offset: usize, word: &str) -> bool {
        self.text.get(offset..).is_some_and(|rest| rest.starts_with(word))
    }

    /* The next `count` characters at `offset` (fewer near the end of input).
     * Used to show what was found where a literal was expected. */
    pub fn take_chars(&self, offset: usize, count: usize) -> &'a str {
        let Some(rest) = self.text.get(offset..) else {
            return "";
        };
        let end = rest.char_indices()
            .nth(count)
            .map_or(rest.len(), |(index, _)| index);
        &rest[..end]
    }

    /* Binary search over the recorded line starts. Counting the column walks
     * the line up to `offset`, so callers resolve reported errors only. */
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let preceding_breaks = self.line_starts.partition_point(|&start| start <= offset);

        let line_start = match preceding_breaks {
            0 => 0,
            n => self.line_starts[n - 1],
        };

        let column = match self.text.get(line_start..offset) {
            Some(prefix) => prefix.chars().count(),
            None => offset - line_start,
        };

        Position { line: preceding_breaks + 1, column: column + 1 }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len() + 1
    }
}


/* Tests */

#[cfg(test)]
mod tests {
    use super::*;

    /* Reference implementation: walk every character up to offset. */
    fn naive_position(text: &str, offset: usize) -> Position {
        let mut line = 1;
        let mut column = 1;
        for ch in text[..offset].chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            }
            else {
                column += 1;
            }
        }
        Position { line, column }
    }

    #[test]
    fn positions_match_linear_scan() {
        let text = "ab\n\ncde\nf\n";
        let input = Input::new(text);

        for offset in 0..=text.len() {
            assert_eq!(input.position(offset), naive_position(text, offset), "offset {offset}");
        }
        assert_eq!(input.line_count(), 5);
    }

    #[test]
    fn position_at_line_start() {
        let input = Input::new("a\nb\nc");

        assert_eq!(input.position(0), Position { line: 1, column: 1 });
        assert_eq!(input.position(2), Position { line: 2, column: 1 });
        assert_eq!(input.position(4), Position { line: 3, column: 1 });
        assert_eq!(input.position(99), Position { line: 3, column: 2 });
    }

    #[test]
    fn columns_count_characters() {
        let input = Input::new("héllo\nwörld");

        assert_eq!(input.position(3), Position { line: 1, column: 3 });
        assert_eq!(input.position(11), Position { line: 2, column: 4 });
    }

    #[test]
    fn cursor_access() {
        let input = Input::new("héllo");

        assert_eq!(input.char_at(0), Some('h'));
        assert_eq!(input.char_at(1), Some('é'));
        assert_eq!(input.char_at(2), None); // inside 'é'
        assert_eq!(input.char_at(6), None);
        assert_eq!(input.substring(3, 10), "llo");
        assert_eq!(input.take_chars(0, 2), "hé");
        assert_eq!(input.take_chars(4, 5), "lo");
        assert!(input.starts_with(1, "él"));
        assert!(!input.starts_with(5, "o!"));
        assert_eq!(input.len(), 6);
    }
}
