use super::handle::Handle;

/// Slot storage owning every node of the tree.
///
/// A slot is `None` while its node has been taken; such slots queue on the
/// free list and their handles are reissued to later allocations. The tree
/// therefore drops every edge to a merged-away node before returning to the
/// caller, so a recycled handle can never be reached through a stale link.
#[derive(Clone, Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    /// Number of live nodes. The tree only consults this in its leak
    /// checks, hence test-only.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        // The free list only ever holds slots that exist.
        self.slots.len() - self.free.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        match self.free.pop() {
            Some(handle) => {
                let slot = &mut self.slots[handle.slot()];
                debug_assert!(slot.is_none(), "free list pointed at a live slot");
                *slot = Some(element);
                handle
            }
            None => {
                // `from_slot` rejects slots past `Handle::MAX_SLOT`, which
                // caps the arena before the push can outgrow the handle.
                let handle = Handle::from_slot(self.slots.len());
                self.slots.push(Some(element));
                handle
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.slot()].as_ref().expect("read through a freed node handle")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.slot()].as_mut().expect("write through a freed node handle")
    }

    /// Removes the node, queueing its slot for reuse.
    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let element =
            self.slots[handle.slot()].take().expect("took an already freed node handle");
        self.free.push(handle);
        element
    }

    pub(crate) fn free(&mut self, handle: Handle) {
        let _ = self.take(handle);
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
