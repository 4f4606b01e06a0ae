//! Windows and window configurations.
//!
//! Windows live in an id-keyed table and point at buffers by [`BufferId`];
//! a configuration remembers buffer *names* so it survives buffers being
//! killed and recreated.  The table is owned by
//! [`BufferManager`](crate::buffer::BufferManager), which keeps the
//! selected window resolvable.

use std::collections::BTreeMap;

use crate::buffer::BufferId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

#[derive(Clone, Debug)]
pub struct Window {
    pub id: WindowId,
    pub buffer: BufferId,
}

/// Immutable snapshot of the window layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfiguration {
    pub selected: WindowId,
    /// Every window alive at capture time and the name of its buffer.
    pub windows: BTreeMap<WindowId, String>,
}

#[derive(Debug, Default)]
pub struct WindowManager {
    windows: BTreeMap<WindowId, Window>,
    selected: Option<WindowId>,
    next_id: u64,
}

impl WindowManager {
    pub fn new() -> Self {
        Self {
            windows: BTreeMap::new(),
            selected: None,
            next_id: 1,
        }
    }

    /// Create a window showing `buffer`.  Does not change the selection.
    pub fn create(&mut self, buffer: BufferId) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.windows.insert(id, Window { id, buffer });
        id
    }

    /// Create (or recreate) the window with a specific id.
    pub fn create_with_id(&mut self, id: WindowId, buffer: BufferId) {
        self.windows.insert(id, Window { id, buffer });
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn is_live(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    /// Selected id, if it still names a live window.
    pub fn selected(&self) -> Option<WindowId> {
        self.selected.filter(|id| self.windows.contains_key(id))
    }

    /// Select `id`; returns false for a dead window.
    pub fn select(&mut self, id: WindowId) -> bool {
        if self.windows.contains_key(&id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    /// Lowest live window id, used when the selection has gone stale.
    pub fn any(&self) -> Option<WindowId> {
        self.windows.keys().next().copied()
    }

    pub fn set_buffer(&mut self, id: WindowId, buffer: BufferId) -> bool {
        match self.windows.get_mut(&id) {
            Some(win) => {
                win.buffer = buffer;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, id: WindowId) -> bool {
        let removed = self.windows.remove(&id).is_some();
        if self.selected == Some(id) {
            self.selected = None;
        }
        removed
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// First window (lowest id) showing `buffer`.
    pub fn showing(&self, buffer: BufferId) -> Option<WindowId> {
        self.windows
            .values()
            .find(|win| win.buffer == buffer)
            .map(|win| win.id)
    }

    /// Point every window showing `from` at `to`.
    pub fn retarget(&mut self, from: BufferId, to: BufferId) {
        for win in self.windows.values_mut() {
            if win.buffer == from {
                win.buffer = to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_selection_is_not_reported() {
        let mut wm = WindowManager::new();
        let a = wm.create(BufferId(1));
        let b = wm.create(BufferId(1));
        assert!(wm.select(b));
        assert_eq!(wm.selected(), Some(b));
        wm.delete(b);
        assert_eq!(wm.selected(), None);
        assert_eq!(wm.any(), Some(a));
        assert!(!wm.select(b));
    }

    #[test]
    fn recreating_an_id_bumps_the_counter() {
        let mut wm = WindowManager::new();
        wm.create_with_id(WindowId(7), BufferId(1));
        let next = wm.create(BufferId(1));
        assert_eq!(next, WindowId(8));
    }

    #[test]
    fn retarget_moves_every_window_off_a_buffer() {
        let mut wm = WindowManager::new();
        let a = wm.create(BufferId(1));
        let b = wm.create(BufferId(1));
        let c = wm.create(BufferId(2));
        wm.retarget(BufferId(1), BufferId(3));
        assert_eq!(wm.get(a).unwrap().buffer, BufferId(3));
        assert_eq!(wm.get(b).unwrap().buffer, BufferId(3));
        assert_eq!(wm.get(c).unwrap().buffer, BufferId(2));
        assert_eq!(wm.showing(BufferId(3)), Some(a));
    }
}
