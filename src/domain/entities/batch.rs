//! Batch bookkeeping types.

use serde::Serialize;

/// Progress of a batch run.
///
/// `completed_items` only grows, and the batch is terminal once it reaches
/// `total_items`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    /// Number of selected items.
    pub total_items: usize,
    /// Items that finished, successfully or not.
    pub completed_items: usize,
    /// Items that finished successfully.
    pub succeeded_items: usize,
    /// Items that failed.
    pub failed_items: usize,
}

impl BatchProgress {
    /// Creates progress for a batch of `total_items`.
    #[must_use]
    pub const fn new(total_items: usize) -> Self {
        Self {
            total_items,
            completed_items: 0,
            succeeded_items: 0,
            failed_items: 0,
        }
    }

    /// Records one successful item.
    pub fn record_success(&mut self) {
        debug_assert!(self.completed_items < self.total_items);
        self.completed_items += 1;
        self.succeeded_items += 1;
    }

    /// Records one failed item.
    pub fn record_failure(&mut self) {
        debug_assert!(self.completed_items < self.total_items);
        self.completed_items += 1;
        self.failed_items += 1;
    }

    /// Returns true once every item completed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.completed_items >= self.total_items
    }

    /// Completion percentage, rounded down.
    #[must_use]
    pub const fn percent(&self) -> usize {
        if self.total_items == 0 {
            100
        } else {
            self.completed_items * 100 / self.total_items
        }
    }
}

/// An input item and whether the caller selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem<T> {
    /// The item.
    pub item: T,
    /// Unselected items are skipped and not counted.
    pub selected: bool,
}

impl<T> BatchItem<T> {
    /// Wraps a selected item.
    #[must_use]
    pub const fn selected(item: T) -> Self {
        Self {
            item,
            selected: true,
        }
    }

    /// Wraps an unselected item.
    #[must_use]
    pub const fn unselected(item: T) -> Self {
        Self {
            item,
            selected: false,
        }
    }
}

/// Failure of a single batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position of the item in the caller's input list.
    pub index: usize,
    /// Message of the error that failed the item.
    pub message: String,
}

/// Final outcome of a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    /// Final progress.
    pub progress: BatchProgress,
    /// Successful outputs keyed by input position, in input order.
    pub outputs: Vec<(usize, T)>,
    /// Failed items, in input order.
    pub failures: Vec<ItemFailure>,
    /// Whether cancellation was requested during the run.
    pub cancelled: bool,
    /// Selected items never started because of cancellation.
    pub skipped_items: usize,
}

impl<T> BatchReport<T> {
    /// Returns true if at least one item failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
