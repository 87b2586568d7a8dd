//! Fixed-size process slots.

/// Identity of a dispatched job, kept alongside its process handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub ordinal: usize,
    pub run_id: String,
    pub composite_ids: Vec<String>,
}

/// One concurrency unit: either free or holding exactly one live run.
#[derive(Debug)]
pub enum Slot<H> {
    Empty,
    Running { handle: H, run: RunIdentity },
}

impl<H> Slot<H> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    /// Take the current contents, leaving the slot empty.
    pub fn clear(&mut self) -> Option<(H, RunIdentity)> {
        match std::mem::replace(self, Slot::Empty) {
            Slot::Empty => None,
            Slot::Running { handle, run } => Some((handle, run)),
        }
    }
}

/// Index of the first empty slot.
pub fn first_empty<H>(slots: &[Slot<H>]) -> Option<usize> {
    slots.iter().position(Slot::is_empty)
}

pub fn any_running<H>(slots: &[Slot<H>]) -> bool {
    slots.iter().any(|slot| !slot.is_empty())
}
