//! Buffers and the buffer/window arena.
//!
//! Buffers are owned by [`BufferManager`] and addressed by [`BufferId`];
//! names are unique and index into the same table.  The manager also owns the
//! [`WindowManager`], because the current buffer is whatever the selected
//! window shows.  Positions here are 0-based character offsets; the Lisp
//! layer adds 1.

use std::collections::{BTreeMap, HashMap};

use super::gap_buffer::GapBuffer;
use crate::elisp::print::BufferNames;
use crate::elisp::value::{eq_value, Value};
use crate::window::{WindowConfiguration, WindowId, WindowManager};

/// Buffer that always exists (or is recreated) as the fallback current buffer.
pub const SCRATCH_BUFFER_NAME: &str = "*scratch*";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// A named text buffer with a point, a local keymap, buffer-local variables
/// and buffer-local hooks.
#[derive(Debug)]
pub struct Buffer {
    pub id: BufferId,
    pub name: String,
    text: GapBuffer,
    pt: usize,
    /// Keymap installed by `use-local-map` or a major mode.
    pub local_map: Option<Value>,
    locals: HashMap<String, Value>,
    hooks: HashMap<String, Vec<Value>>,
    pub modified: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl Buffer {
    pub fn new(id: BufferId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            text: GapBuffer::new(),
            pt: 0,
            local_map: None,
            locals: HashMap::new(),
            hooks: HashMap::new(),
            modified: false,
        }
    }

    // -----------------------------------------------------------------------
    // Text and point
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn buffer_string(&self) -> String {
        self.text.to_string()
    }

    pub fn point(&self) -> usize {
        self.pt
    }

    pub fn point_min(&self) -> usize {
        0
    }

    pub fn point_max(&self) -> usize {
        self.text.len()
    }

    fn clamp(&self, pos: usize) -> usize {
        pos.min(self.text.len())
    }

    /// Move point, clamped to the text.  Returns the new point.
    pub fn goto_char(&mut self, pos: usize) -> usize {
        self.pt = self.clamp(pos);
        self.pt
    }

    pub fn char_after(&self, pos: usize) -> Option<char> {
        self.text.char_at(pos)
    }

    pub fn char_before(&self, pos: usize) -> Option<char> {
        pos.checked_sub(1).and_then(|p| self.text.char_at(p))
    }

    /// Text between two positions, in either order, clamped.
    pub fn buffer_substring(&self, start: usize, end: usize) -> String {
        let (s, e) = self.ordered(start, end);
        self.text.text_range(s, e)
    }

    fn ordered(&self, a: usize, b: usize) -> (usize, usize) {
        let (a, b) = (self.clamp(a), self.clamp(b));
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Insert at point and leave point after the new text.
    pub fn insert(&mut self, s: &str) {
        let at = self.pt;
        self.text.insert_str(at, s);
        self.pt = at + s.chars().count();
        self.modified = true;
    }

    /// Insert at `pos`; point moves with the text after it.
    pub fn insert_at(&mut self, pos: usize, s: &str) {
        let pos = self.clamp(pos);
        self.text.insert_str(pos, s);
        if self.pt > pos {
            self.pt += s.chars().count();
        }
        self.modified = true;
    }

    /// Delete `[start, end)` (either order).  Returns the removed text.
    pub fn delete_region(&mut self, start: usize, end: usize) -> String {
        let (s, e) = self.ordered(start, end);
        let removed = self.text.text_range(s, e);
        self.text.delete_range(s, e);
        if self.pt >= e {
            self.pt -= e - s;
        } else if self.pt > s {
            self.pt = s;
        }
        if s != e {
            self.modified = true;
        }
        removed
    }

    /// Replace `[start, end)` with `s`.  A point after the region shifts by
    /// the size difference; a point inside it moves to `start`.
    pub fn replace_region(&mut self, start: usize, end: usize, s: &str) {
        let (start, end) = self.ordered(start, end);
        self.delete_region(start, end);
        self.insert_at(start, s);
    }

    pub fn erase(&mut self) {
        let len = self.text.len();
        self.text.delete_range(0, len);
        self.pt = 0;
        self.modified = true;
    }

    /// Delete `n` chars after point (or `-n` before it).
    pub fn delete_char(&mut self, n: i64) {
        let count = n.unsigned_abs() as usize;
        if n >= 0 {
            self.delete_region(self.pt, self.pt.saturating_add(count));
        } else {
            self.delete_region(self.pt.saturating_sub(count), self.pt);
        }
    }

    /// Replace every `from` with `to` in `[start, end)`.  Returns the count.
    pub fn subst_char(&mut self, start: usize, end: usize, from: char, to: char) -> usize {
        let (s, e) = self.ordered(start, end);
        let mut changed = 0;
        for pos in s..e {
            if self.text.char_at(pos) == Some(from) {
                self.text.set_char(pos, to);
                changed += 1;
            }
        }
        if changed > 0 {
            self.modified = true;
        }
        changed
    }

    /// Turn tabs in `[start, end)` into single spaces.
    pub fn untabify(&mut self, start: usize, end: usize) {
        self.subst_char(start, end, '\t', ' ');
    }

    // -----------------------------------------------------------------------
    // Lines and columns
    // -----------------------------------------------------------------------

    pub fn line_beginning(&self, pos: usize) -> usize {
        let mut p = self.clamp(pos);
        while p > 0 && self.text.char_at(p - 1) != Some('\n') {
            p -= 1;
        }
        p
    }

    pub fn line_end(&self, pos: usize) -> usize {
        let mut p = self.clamp(pos);
        while p < self.text.len() && self.text.char_at(p) != Some('\n') {
            p += 1;
        }
        p
    }

    pub fn current_column(&self) -> usize {
        self.pt - self.line_beginning(self.pt)
    }

    /// Move `n` lines (negative = up), keeping the column where the target
    /// line is long enough.  Returns how many lines could not be moved.
    pub fn forward_line(&mut self, n: i64) -> i64 {
        if n == 0 {
            return 0;
        }
        let col = self.current_column();
        for moved in 0..n.unsigned_abs() {
            let ok = if n > 0 {
                self.move_one_line_down(col)
            } else {
                self.move_one_line_up(col)
            };
            if !ok {
                return (n.unsigned_abs() - moved) as i64;
            }
        }
        0
    }

    fn move_one_line_down(&mut self, col: usize) -> bool {
        let eol = self.line_end(self.pt);
        if eol >= self.text.len() {
            self.pt = self.text.len();
            return false;
        }
        let next = eol + 1;
        self.pt = (next + col).min(self.line_end(next));
        true
    }

    fn move_one_line_up(&mut self, col: usize) -> bool {
        let bol = self.line_beginning(self.pt);
        if bol == 0 {
            self.pt = 0;
            return false;
        }
        let prev = self.line_beginning(bol - 1);
        self.pt = (prev + col).min(self.line_end(prev));
        true
    }

    /// Go to column `col` on the current line (not past its end).
    pub fn move_to_column(&mut self, col: usize) -> usize {
        let bol = self.line_beginning(self.pt);
        let eol = self.line_end(self.pt);
        self.pt = (bol + col).min(eol);
        self.pt - bol
    }

    pub fn count_lines(&self, start: usize, end: usize) -> usize {
        let (s, e) = self.ordered(start, end);
        (s..e).filter(|p| self.text.char_at(*p) == Some('\n')).count()
    }

    /// Delete blank lines around point: on a blank line keep one of the
    /// surrounding run (or none if it stood alone); on a non-blank line drop
    /// the blank lines that follow it.
    pub fn delete_blank_lines(&mut self) {
        let is_blank = |buf: &Buffer, bol: usize| {
            let eol = buf.line_end(bol);
            buf.buffer_substring(bol, eol).trim().is_empty()
        };
        let bol = self.line_beginning(self.pt);
        if is_blank(self, bol) {
            let mut first = bol;
            while first > 0 {
                let prev = self.line_beginning(first - 1);
                if !is_blank(self, prev) {
                    break;
                }
                first = prev;
            }
            let mut last_end = self.line_end(bol);
            while last_end < self.text.len() && is_blank(self, last_end + 1) {
                last_end = self.line_end(last_end + 1);
            }
            let run_is_single = first == bol && last_end == self.line_end(bol);
            if run_is_single {
                let end = (last_end + 1).min(self.text.len());
                self.delete_region(bol, end);
            } else {
                let keep_end = self.line_end(first);
                self.delete_region(keep_end, last_end);
                self.pt = first;
            }
        } else {
            let eol = self.line_end(bol);
            let mut last_end = eol;
            while last_end < self.text.len() && is_blank(self, last_end + 1) {
                last_end = self.line_end(last_end + 1);
            }
            if last_end > eol {
                self.delete_region(eol, last_end);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Characters and words
    // -----------------------------------------------------------------------

    /// Move `n` chars (negative = back), clamped.  Returns false when
    /// clamping occurred.
    pub fn forward_char(&mut self, n: i64) -> bool {
        let target = self.pt as i64 + n;
        let clamped = target.clamp(0, self.text.len() as i64);
        self.pt = clamped as usize;
        clamped == target
    }

    pub fn backward_word(&mut self, n: usize) -> usize {
        for _ in 0..n {
            while self.pt > 0 && !self.char_before(self.pt).is_some_and(is_word_char) {
                self.pt -= 1;
            }
            while self.pt > 0 && self.char_before(self.pt).is_some_and(is_word_char) {
                self.pt -= 1;
            }
        }
        self.pt
    }

    pub fn forward_word(&mut self, n: usize) -> usize {
        let len = self.text.len();
        for _ in 0..n {
            while self.pt < len && !self.char_after(self.pt).is_some_and(is_word_char) {
                self.pt += 1;
            }
            while self.pt < len && self.char_after(self.pt).is_some_and(is_word_char) {
                self.pt += 1;
            }
        }
        self.pt
    }

    /// Advance point over characters accepted by `allowed`, up to `limit`.
    /// Returns the distance moved.
    pub fn skip_chars_forward(&mut self, allowed: impl Fn(char) -> bool, limit: usize) -> usize {
        let start = self.pt;
        let limit = self.clamp(limit);
        while self.pt < limit && self.char_after(self.pt).is_some_and(&allowed) {
            self.pt += 1;
        }
        self.pt - start
    }

    pub fn skip_chars_backward(&mut self, allowed: impl Fn(char) -> bool, limit: usize) -> usize {
        let start = self.pt;
        let limit = self.clamp(limit);
        while self.pt > limit && self.char_before(self.pt).is_some_and(&allowed) {
            self.pt -= 1;
        }
        start - self.pt
    }

    // -----------------------------------------------------------------------
    // Buffer-local variables and hooks
    // -----------------------------------------------------------------------

    pub fn get_buffer_local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn set_buffer_local(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }

    pub fn has_buffer_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Drop the local value so the global one shows through again.
    pub fn kill_local_variable(&mut self, name: &str) -> bool {
        self.locals.remove(name).is_some()
    }

    pub fn buffer_local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locals.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn local_hooks(&self, hook: &str) -> Vec<Value> {
        self.hooks.get(hook).cloned().unwrap_or_default()
    }

    /// Add `function` to this buffer's `hook` unless already present.
    pub fn add_local_hook(&mut self, hook: &str, function: Value, append: bool) {
        let entry = self.hooks.entry(hook.to_string()).or_default();
        if entry.iter().any(|f| eq_value(f, &function)) {
            return;
        }
        if append {
            entry.push(function);
        } else {
            entry.insert(0, function);
        }
    }

    pub fn remove_local_hook(&mut self, hook: &str, function: &Value) {
        if let Some(entry) = self.hooks.get_mut(hook) {
            entry.retain(|f| !eq_value(f, function));
        }
    }
}

// ===========================================================================
// BufferManager
// ===========================================================================

/// Owns every live buffer and the window table.
///
/// Invariant: after any public call returns, the selected window exists and
/// shows a live buffer.
#[derive(Debug)]
pub struct BufferManager {
    buffers: HashMap<BufferId, Buffer>,
    by_name: BTreeMap<String, BufferId>,
    next_id: u64,
    windows: WindowManager,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferManager {
    /// A manager holding `*scratch*` shown in one selected window.
    pub fn new() -> Self {
        let mut mgr = Self {
            buffers: HashMap::new(),
            by_name: BTreeMap::new(),
            next_id: 1,
            windows: WindowManager::new(),
        };
        mgr.ensure_selected();
        mgr
    }

    fn insert_new(&mut self, name: &str) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, Buffer::new(id, name));
        self.by_name.insert(name.to_string(), id);
        tracing::debug!(buffer = name, id = id.0, "created buffer");
        id
    }

    // -----------------------------------------------------------------------
    // Lookup and creation
    // -----------------------------------------------------------------------

    pub fn find_buffer_by_name(&self, name: &str) -> Option<BufferId> {
        self.by_name.get(name).copied()
    }

    /// Existing buffer called `name`, or a new one.
    pub fn get_or_create(&mut self, name: &str) -> BufferId {
        match self.find_buffer_by_name(name) {
            Some(id) => id,
            None => self.insert_new(name),
        }
    }

    /// `base`, or `base<2>`, `base<3>`, … whichever is free.
    pub fn generate_new_buffer_name(&self, base: &str) -> String {
        if !self.by_name.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}<{n}>"))
            .find(|candidate| !self.by_name.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn generate_new_buffer(&mut self, base: &str) -> BufferId {
        let base = if base.is_empty() { "*buffer*" } else { base };
        let name = self.generate_new_buffer_name(base);
        self.insert_new(&name)
    }

    pub fn get(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(&id)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.buffers.get_mut(&id)
    }

    pub fn is_live(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Live buffer ids ordered by name.
    pub fn buffer_list(&self) -> Vec<BufferId> {
        self.by_name.values().copied().collect()
    }

    pub fn buffer_names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    /// Rename; fails when `name` is taken by another buffer.
    pub fn rename(&mut self, id: BufferId, name: &str) -> bool {
        if let Some(existing) = self.find_buffer_by_name(name) {
            return existing == id;
        }
        let Some(buf) = self.buffers.get_mut(&id) else {
            return false;
        };
        self.by_name.remove(&buf.name);
        buf.name = name.to_string();
        self.by_name.insert(name.to_string(), id);
        true
    }

    // -----------------------------------------------------------------------
    // Current buffer (through the selected window)
    // -----------------------------------------------------------------------

    /// Repair the selection so it names a live window showing a live buffer.
    /// Falls back to any remaining window, then to a fresh window showing
    /// `*scratch*`.
    pub fn ensure_selected(&mut self) -> WindowId {
        let win = match self.windows.selected() {
            Some(win) => win,
            None => match self.windows.any() {
                Some(win) => {
                    self.windows.select(win);
                    win
                }
                None => {
                    let scratch = self.get_or_create(SCRATCH_BUFFER_NAME);
                    let win = self.windows.create(scratch);
                    self.windows.select(win);
                    tracing::debug!(window = win.0, "recreated initial window");
                    win
                }
            },
        };
        let shown = self.windows.get(win).map(|w| w.buffer);
        if !shown.is_some_and(|id| self.buffers.contains_key(&id)) {
            let scratch = self.get_or_create(SCRATCH_BUFFER_NAME);
            self.windows.set_buffer(win, scratch);
        }
        win
    }

    pub fn current_id(&mut self) -> BufferId {
        let win = self.ensure_selected();
        self.windows
            .get(win)
            .map(|w| w.buffer)
            .unwrap_or_else(|| self.get_or_create(SCRATCH_BUFFER_NAME))
    }

    /// Current buffer without repairing the selection.
    pub fn current_buffer(&self) -> Option<&Buffer> {
        let win = self.windows.selected()?;
        self.buffers.get(&self.windows.get(win)?.buffer)
    }

    pub fn current_buffer_mut(&mut self) -> &mut Buffer {
        let id = self.current_id();
        // `current_id` only returns live ids.
        self.buffers
            .entry(id)
            .or_insert_with(|| Buffer::new(id, SCRATCH_BUFFER_NAME))
    }

    /// Make `id` current by showing it in the selected window.
    pub fn set_current(&mut self, id: BufferId) -> bool {
        if !self.buffers.contains_key(&id) {
            return false;
        }
        let win = self.ensure_selected();
        self.windows.set_buffer(win, id)
    }

    pub fn switch_to_buffer(&mut self, name: &str) -> BufferId {
        let id = self.get_or_create(name);
        self.set_current(id);
        id
    }

    /// Kill a buffer.  Windows showing it fall back to `*scratch*`; killing
    /// the last buffer recreates the initial window and buffer.
    pub fn kill_buffer(&mut self, id: BufferId) -> bool {
        let Some(buf) = self.buffers.remove(&id) else {
            return false;
        };
        self.by_name.remove(&buf.name);
        tracing::debug!(buffer = %buf.name, "killed buffer");
        if self.buffers.is_empty() {
            for win in self.windows.ids() {
                self.windows.delete(win);
            }
            self.ensure_selected();
            return true;
        }
        let scratch = self.get_or_create(SCRATCH_BUFFER_NAME);
        self.windows.retarget(id, scratch);
        self.ensure_selected();
        true
    }

    /// Put a buffer out of sight: if it is current, show `*scratch*` instead.
    pub fn bury_buffer(&mut self, id: BufferId) {
        if self.current_id() == id {
            let scratch = self.get_or_create(SCRATCH_BUFFER_NAME);
            self.set_current(scratch);
        }
    }

    // -----------------------------------------------------------------------
    // Windows
    // -----------------------------------------------------------------------

    pub fn selected_window(&mut self) -> WindowId {
        self.ensure_selected()
    }

    pub fn select_window(&mut self, win: WindowId) -> bool {
        self.windows.select(win)
    }

    pub fn window_buffer(&self, win: WindowId) -> Option<BufferId> {
        self.windows.get(win).map(|w| w.buffer)
    }

    pub fn set_window_buffer(&mut self, win: WindowId, buf: BufferId) -> bool {
        self.buffers.contains_key(&buf) && self.windows.set_buffer(win, buf)
    }

    pub fn get_buffer_window(&self, buf: BufferId) -> Option<WindowId> {
        if let Some(sel) = self.windows.selected() {
            if self.window_buffer(sel) == Some(buf) {
                return Some(sel);
            }
        }
        self.windows.showing(buf)
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.ids()
    }

    pub fn is_live_window(&self, win: WindowId) -> bool {
        self.windows.is_live(win)
    }

    /// New window showing the same buffer as `win`.
    pub fn split_window(&mut self, win: WindowId) -> Option<WindowId> {
        let buf = self.window_buffer(win)?;
        Some(self.windows.create(buf))
    }

    /// Delete a window; the last window cannot be deleted.
    pub fn delete_window(&mut self, win: WindowId) -> bool {
        if self.windows.len() <= 1 || !self.windows.delete(win) {
            return false;
        }
        self.ensure_selected();
        true
    }

    pub fn delete_other_windows(&mut self, keep: WindowId) {
        if !self.windows.is_live(keep) {
            return;
        }
        for win in self.windows.ids() {
            if win != keep {
                self.windows.delete(win);
            }
        }
        self.windows.select(keep);
    }

    // -----------------------------------------------------------------------
    // Window configurations
    // -----------------------------------------------------------------------

    pub fn capture_configuration(&mut self) -> WindowConfiguration {
        let selected = self.ensure_selected();
        let windows = self
            .windows
            .ids()
            .into_iter()
            .filter_map(|win| {
                let buf = self.window_buffer(win)?;
                Some((win, self.buffers.get(&buf)?.name.clone()))
            })
            .collect();
        WindowConfiguration { selected, windows }
    }

    /// Recreate missing windows, rebind each remembered window to the buffer
    /// of the remembered name (creating it if needed), and reselect.
    pub fn restore_configuration(&mut self, config: &WindowConfiguration) {
        for (win, name) in &config.windows {
            let buf = self.get_or_create(name);
            if self.windows.is_live(*win) {
                self.windows.set_buffer(*win, buf);
            } else {
                self.windows.create_with_id(*win, buf);
            }
        }
        if self.windows.is_live(config.selected) {
            self.windows.select(config.selected);
        }
        self.ensure_selected();
    }
}

impl BufferNames for BufferManager {
    fn buffer_name(&self, id: BufferId) -> Option<String> {
        self.get(id).map(|buf| buf.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn buffer_with(text: &str) -> Buffer {
        let mut buf = Buffer::new(BufferId(1), "t");
        buf.insert(text);
        buf
    }

    #[test]
    fn insert_and_delete_track_point() {
        let mut buf = buffer_with("hello");
        assert_eq!(buf.point(), 5);
        buf.goto_char(2);
        buf.insert_at(0, ">>");
        assert_eq!(buf.point(), 4);
        assert_eq!(buf.delete_region(0, 3), ">>h");
        assert_eq!(buf.point(), 1);
        assert_eq!(buf.buffer_string(), "ello");
        buf.goto_char(3);
        buf.replace_region(1, 2, "LLL");
        assert_eq!(buf.buffer_string(), "eLLLlo");
        assert_eq!(buf.point(), 5);
    }

    #[test]
    fn forward_line_keeps_column_and_reports_shortfall() {
        let mut buf = buffer_with("abcd\nxy\nlonger");
        buf.goto_char(3);
        assert_eq!(buf.forward_line(1), 0);
        assert_eq!(buf.point(), 7);
        assert_eq!(buf.forward_line(1), 0);
        assert_eq!(buf.point(), 10);
        assert_eq!(buf.forward_line(2), 2);
        assert_eq!(buf.point(), buf.len());
        buf.goto_char(6);
        assert_eq!(buf.forward_line(-3), 2);
        assert_eq!(buf.point(), 0);
    }

    #[test]
    fn columns_and_line_bounds() {
        let mut buf = buffer_with("one\ntwo three\n");
        buf.goto_char(6);
        assert_eq!(buf.current_column(), 2);
        assert_eq!(buf.line_beginning(6), 4);
        assert_eq!(buf.line_end(6), 13);
        assert_eq!(buf.move_to_column(40), 9);
        assert_eq!(buf.count_lines(0, buf.len()), 2);
    }

    #[test]
    fn words_and_skips() {
        let mut buf = buffer_with("foo_bar  baz");
        assert_eq!(buf.backward_word(1), 9);
        assert_eq!(buf.backward_word(1), 0);
        assert_eq!(buf.forward_word(1), 7);
        assert_eq!(buf.skip_chars_forward(|c| c == ' ', 100), 2);
        assert_eq!(buf.point(), 9);
    }

    #[test]
    fn delete_blank_lines_around_point() {
        let mut buf = buffer_with("a\n\n\n\nb");
        buf.goto_char(3);
        buf.delete_blank_lines();
        assert_eq!(buf.buffer_string(), "a\n\nb");

        let mut buf = buffer_with("a\n\n\nb");
        buf.goto_char(0);
        buf.delete_blank_lines();
        assert_eq!(buf.buffer_string(), "a\nb");
    }

    #[test]
    fn subst_and_local_hooks() {
        let mut buf = buffer_with("a\tb\tc");
        assert_eq!(buf.subst_char(0, 5, '\t', '-'), 2);
        assert_eq!(buf.buffer_string(), "a-b-c");

        let f = Value::symbol("f");
        buf.add_local_hook("h", f.clone(), false);
        buf.add_local_hook("h", f.clone(), false);
        buf.add_local_hook("h", Value::symbol("g"), true);
        assert_eq!(buf.local_hooks("h").len(), 2);
        buf.remove_local_hook("h", &f);
        assert_eq!(buf.local_hooks("h"), vec![Value::symbol("g")]);
    }

    #[test]
    fn generate_new_buffer_uniquifies() {
        let mut mgr = BufferManager::new();
        let game = mgr.get_or_create("game");
        assert_eq!(mgr.get_or_create("game"), game);
        let second = mgr.generate_new_buffer("game");
        let third = mgr.generate_new_buffer("game");
        assert_eq!(mgr.get(second).unwrap().name, "game<2>");
        assert_eq!(mgr.get(third).unwrap().name, "game<3>");
        assert_eq!(
            mgr.buffer_names(),
            vec!["*scratch*", "game", "game<2>", "game<3>"]
        );
    }

    #[test]
    fn killing_current_buffer_falls_back_to_scratch() {
        let mut mgr = BufferManager::new();
        let work = mgr.switch_to_buffer("work");
        assert_eq!(mgr.current_id(), work);
        assert!(mgr.kill_buffer(work));
        assert_eq!(mgr.current_buffer().unwrap().name, SCRATCH_BUFFER_NAME);
        assert!(!mgr.kill_buffer(work));
    }

    #[test]
    fn killing_the_last_buffer_recreates_the_initial_pair() {
        let mut mgr = BufferManager::new();
        let scratch = mgr.current_id();
        let old_win = mgr.selected_window();
        mgr.kill_buffer(scratch);
        let win = mgr.selected_window();
        assert_ne!(win, old_win);
        assert_eq!(mgr.current_buffer().unwrap().name, SCRATCH_BUFFER_NAME);
        assert_eq!(mgr.window_ids(), vec![win]);
    }

    #[test]
    fn window_configuration_restores_layout_by_name() {
        let mut mgr = BufferManager::new();
        let first = mgr.selected_window();
        let second = mgr.split_window(first).unwrap();
        let a = mgr.get_or_create("a");
        mgr.set_window_buffer(second, a);
        mgr.select_window(second);
        let config = mgr.capture_configuration();

        mgr.delete_window(second);
        mgr.kill_buffer(a);
        assert_eq!(mgr.selected_window(), first);

        mgr.restore_configuration(&config);
        assert_eq!(mgr.selected_window(), second);
        let restored = mgr.window_buffer(second).unwrap();
        assert_eq!(mgr.get(restored).unwrap().name, "a");
        assert_ne!(restored, a);
    }

    proptest! {
        #[test]
        fn point_stays_within_text(
            ops in proptest::collection::vec((0u8..4, 0usize..50, "[a-z\n]{0,6}"), 0..40)
        ) {
            let mut buf = Buffer::new(BufferId(1), "p");
            for (op, pos, text) in ops {
                match op {
                    0 => buf.insert(&text),
                    1 => { buf.delete_region(pos, pos / 2); }
                    2 => { buf.goto_char(pos); }
                    _ => { buf.forward_line(pos as i64 % 5 - 2); }
                }
                prop_assert!(buf.point() <= buf.len());
            }
        }
    }
}
