use core::num::NonZero;

// Tests narrow the handle width so the slot-range assert and the arena's
// capacity ceiling are reachable without allocating four billion nodes.
#[cfg(test)]
type RawHandle = u16;
#[cfg(not(test))]
type RawHandle = u32;

/// Name of a node slot in the arena.
///
/// Parent edges and the leaf chain's `prev`/`next` links are all handles;
/// none of them own the node they point at, the arena does. A handle is the
/// slot number plus one, kept in a `NonZero` so the zero bit pattern is free
/// to mean "no link" — `Option<Handle>` costs no more than the handle, and
/// every leaf carries two of them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub(crate) struct Handle(NonZero<RawHandle>);

impl Handle {
    /// Largest addressable slot; the arena refuses to grow past it.
    pub(crate) const MAX_SLOT: usize = RawHandle::MAX as usize - 1;

    #[inline]
    pub(crate) const fn from_slot(slot: usize) -> Self {
        assert!(slot <= Self::MAX_SLOT, "node slot out of handle range");
        #[allow(clippy::cast_possible_truncation)]
        match NonZero::new(slot as RawHandle + 1) {
            Some(raw) => Self(raw),
            None => unreachable!(),
        }
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0.get() as usize - 1
    }
}
