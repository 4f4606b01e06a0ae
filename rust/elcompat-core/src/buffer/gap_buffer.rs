//! A character gap buffer for buffer text.
//!
//! Text is stored as a `Vec<char>` with a movable gap at the last edit site,
//! so runs of insertions or deletions near point avoid shifting the whole
//! text.  All positions are 0-based **character** positions into the logical
//! text (the text with the gap removed); Lisp-facing positions are converted
//! by the caller.

use std::fmt;

/// Default initial gap size in characters.
const DEFAULT_GAP_SIZE: usize = 64;

/// Minimum growth when the gap must be widened.
const MIN_GAP_GROW: usize = 64;

/// ```text
///  [ text-before-gap | gap (unused) | text-after-gap ]
///    0..gap_start      gap_start..gap_end  gap_end..buf.len()
/// ```
#[derive(Clone)]
pub struct GapBuffer {
    buf: Vec<char>,
    gap_start: usize,
    gap_end: usize,
}

impl GapBuffer {
    pub fn new() -> Self {
        Self {
            buf: vec!['\0'; DEFAULT_GAP_SIZE],
            gap_start: 0,
            gap_end: DEFAULT_GAP_SIZE,
        }
    }

    pub fn from_text(s: &str) -> Self {
        let mut buf: Vec<char> = s.chars().collect();
        let len = buf.len();
        buf.resize(len + DEFAULT_GAP_SIZE, '\0');
        Self {
            buf,
            gap_start: len,
            gap_end: len + DEFAULT_GAP_SIZE,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Logical length in characters.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.gap_size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn gap_size(&self) -> usize {
        self.gap_end - self.gap_start
    }

    /// Character at logical position `pos`, or `None` past the end.
    pub fn char_at(&self, pos: usize) -> Option<char> {
        if pos >= self.len() {
            return None;
        }
        if pos < self.gap_start {
            Some(self.buf[pos])
        } else {
            Some(self.buf[pos + self.gap_size()])
        }
    }

    /// Copy of the logical range `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or `end > self.len()`.
    pub fn text_range(&self, start: usize, end: usize) -> String {
        assert!(start <= end && end <= self.len(), "text_range: bad range {start}..{end}");
        let mut out = String::with_capacity(end - start);
        if start < self.gap_start {
            let stop = end.min(self.gap_start);
            out.extend(&self.buf[start..stop]);
        }
        if end > self.gap_start {
            let from = start.max(self.gap_start) + self.gap_size();
            let to = end + self.gap_size();
            out.extend(&self.buf[from..to]);
        }
        out
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.buf[..self.gap_start]
            .iter()
            .chain(self.buf[self.gap_end..].iter())
            .copied()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert `s` at logical position `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos > self.len()`.
    pub fn insert_str(&mut self, pos: usize, s: &str) {
        assert!(
            pos <= self.len(),
            "insert_str: position {pos} out of range (len {})",
            self.len()
        );
        let incoming: Vec<char> = s.chars().collect();
        if incoming.is_empty() {
            return;
        }
        self.move_gap_to(pos);
        self.ensure_gap(incoming.len());
        self.buf[self.gap_start..self.gap_start + incoming.len()].copy_from_slice(&incoming);
        self.gap_start += incoming.len();
    }

    /// Delete the logical range `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or `end > self.len()`.
    pub fn delete_range(&mut self, start: usize, end: usize) {
        assert!(start <= end, "delete_range: start ({start}) > end ({end})");
        assert!(end <= self.len(), "delete_range: end ({end}) > len ({})", self.len());
        if start == end {
            return;
        }
        self.move_gap_to(start);
        self.gap_end += end - start;
    }

    /// Replace the character at `pos`.  Returns false past the end.
    pub fn set_char(&mut self, pos: usize, c: char) -> bool {
        if pos >= self.len() {
            return false;
        }
        let idx = if pos < self.gap_start { pos } else { pos + self.gap_size() };
        self.buf[idx] = c;
        true
    }

    // -----------------------------------------------------------------------
    // Gap management
    // -----------------------------------------------------------------------

    fn move_gap_to(&mut self, pos: usize) {
        if pos == self.gap_start {
            return;
        }
        let gap = self.gap_size();
        if pos < self.gap_start {
            let count = self.gap_start - pos;
            self.buf.copy_within(pos..pos + count, pos + gap);
        } else {
            let count = pos - self.gap_start;
            self.buf
                .copy_within(self.gap_end..self.gap_end + count, self.gap_start);
        }
        self.gap_start = pos;
        self.gap_end = pos + gap;
    }

    fn ensure_gap(&mut self, min_size: usize) {
        if self.gap_size() >= min_size {
            return;
        }
        let grow = (min_size - self.gap_size()).max(MIN_GAP_GROW);
        let old_gap_end = self.gap_end;
        let after_gap_len = self.buf.len() - old_gap_end;
        self.buf.resize(self.buf.len() + grow, '\0');
        if after_gap_len > 0 {
            self.buf
                .copy_within(old_gap_end..old_gap_end + after_gap_len, old_gap_end + grow);
        }
        self.gap_end += grow;
    }
}

impl Default for GapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.chars() {
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GapBuffer")
            .field("text", &self.to_string())
            .field("gap", &(self.gap_start..self.gap_end))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_and_delete_around_the_gap() {
        let mut gb = GapBuffer::from_text("hello world");
        gb.insert_str(5, ",");
        assert_eq!(gb.to_string(), "hello, world");
        gb.delete_range(0, 7);
        assert_eq!(gb.to_string(), "world");
        gb.insert_str(0, "a ");
        assert_eq!(gb.text_range(0, 3), "a w");
        assert_eq!(gb.char_at(2), Some('w'));
        assert_eq!(gb.char_at(99), None);
    }

    #[test]
    fn multibyte_text_is_char_addressed() {
        let mut gb = GapBuffer::from_text("héllo");
        assert_eq!(gb.len(), 5);
        gb.delete_range(1, 2);
        assert_eq!(gb.to_string(), "hllo");
        assert!(gb.set_char(0, 'λ'));
        assert_eq!(gb.to_string(), "λllo");
    }

    #[test]
    fn large_insert_grows_the_gap() {
        let mut gb = GapBuffer::new();
        let big = "x".repeat(500);
        gb.insert_str(0, &big);
        gb.insert_str(250, "MID");
        assert_eq!(gb.len(), 503);
        assert_eq!(gb.text_range(249, 254), "xMIDx");
    }

    proptest! {
        #[test]
        fn edits_match_a_plain_string(
            base in "[a-z]{0,30}",
            ops in proptest::collection::vec((any::<bool>(), 0usize..40, "[A-Z]{0,5}", 0usize..6), 0..20),
        ) {
            let mut gb = GapBuffer::from_text(&base);
            let mut model: Vec<char> = base.chars().collect();
            for (insert, pos, text, span) in ops {
                let pos = pos.min(model.len());
                if insert {
                    gb.insert_str(pos, &text);
                    for (i, c) in text.chars().enumerate() {
                        model.insert(pos + i, c);
                    }
                } else {
                    let end = (pos + span).min(model.len());
                    gb.delete_range(pos, end);
                    model.drain(pos..end);
                }
                prop_assert_eq!(gb.to_string(), model.iter().collect::<String>());
            }
        }
    }
}
