//! Near-equal splitting of an index range.
use crate::decomposition::types::IntervalSplitter;

impl IntervalSplitter {
    /// Constructor.
    ///
    /// # Arguments
    /// * `nb_items` - Number of items to distribute.
    /// * `nb_intervals` - Number of workers, must be positive.
    pub fn new(nb_items: usize, nb_intervals: usize) -> Self {
        assert!(nb_intervals > 0, "cannot split items over zero workers");
        let step = if nb_items <= nb_intervals {
            1.0
        } else {
            nb_items as f64 / nb_intervals as f64
        };

        Self {
            nb_items,
            nb_intervals,
            step,
        }
    }

    /// Number of items distributed.
    pub fn nb_items(&self) -> usize {
        self.nb_items
    }

    /// Number of workers.
    pub fn nb_intervals(&self) -> usize {
        self.nb_intervals
    }

    fn boundary(&self, worker: usize) -> usize {
        (self.step * worker as f64).floor() as usize
    }

    /// The `(offset, size)` of the range given to a worker. Workers past the last one receive
    /// an empty range positioned at `nb_items`.
    ///
    /// # Arguments
    /// * `worker` - Index of the worker.
    pub fn interval(&self, worker: usize) -> (usize, usize) {
        if worker >= self.nb_intervals {
            return (self.nb_items, 0);
        }

        if self.nb_items <= self.nb_intervals {
            return if worker < self.nb_items {
                (worker, 1)
            } else {
                (self.nb_items, 0)
            };
        }

        let offset = self.boundary(worker);
        let end = if worker == self.nb_intervals - 1 {
            self.nb_items
        } else {
            self.boundary(worker + 1)
        };
        (offset, end - offset)
    }

    /// First item of a worker's range.
    pub fn offset(&self, worker: usize) -> usize {
        self.interval(worker).0
    }

    /// Number of items in a worker's range.
    pub fn size(&self, worker: usize) -> usize {
        self.interval(worker).1
    }

    /// The worker whose range contains `item`.
    ///
    /// # Arguments
    /// * `item` - Index of an item, less than `nb_items`.
    pub fn owner(&self, item: usize) -> usize {
        assert!(
            item < self.nb_items,
            "item {} out of range of {} items",
            item,
            self.nb_items
        );

        if self.nb_items <= self.nb_intervals {
            return item;
        }

        let last = self.nb_intervals - 1;
        let mut owner = ((item as f64 / self.step).floor() as usize).min(last);

        // Rounding of the division can land one worker off in either direction
        if owner != last && self.boundary(owner + 1) <= item {
            owner += 1;
        }
        if owner > 0 && self.boundary(owner) > item {
            owner -= 1;
        }

        let (offset, size) = self.interval(owner);
        assert!(
            offset <= item && item < offset + size,
            "owner {} of item {} inconsistent with its range [{}, {})",
            owner,
            item,
            offset,
            offset + size
        );
        owner
    }
}
