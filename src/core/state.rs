/// Per-job counters shared by the taps and the normalizer.
///
/// Owned by the job's worker and mutated only there. `current_index` only
/// moves forward and is held at `total_items` once the total is known.
#[derive(Debug, Clone)]
pub struct JobState {
    multi_item: bool,
    current_index: u32,
    total_items: Option<u32>,
}

impl JobState {
    pub fn new(multi_item: bool) -> Self {
        Self { multi_item, current_index: 0, total_items: None }
    }

    pub fn is_multi_item(&self) -> bool {
        self.multi_item
    }

    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    pub fn total_items(&self) -> Option<u32> {
        self.total_items
    }

    /// Records the discovered total. Later calls are ignored, as are zero
    /// and a total smaller than the items already begun.
    /// Returns whether the value was stored.
    pub fn set_total_items(&mut self, total: u32) -> bool {
        if self.total_items.is_some() || total == 0 || total < self.current_index {
            return false;
        }
        self.total_items = Some(total);
        true
    }

    /// Marks the start of the next item and returns the new index.
    pub fn begin_item(&mut self) -> u32 {
        let next = self.current_index.saturating_add(1);
        self.current_index = match self.total_items {
            Some(total) => next.min(total),
            None => next,
        };
        self.current_index
    }
}
