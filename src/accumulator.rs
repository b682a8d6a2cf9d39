/// Append-only collection with a hard capacity.
///
/// `add` reports whether the caller should keep producing items; once the budget
/// is spent further items are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedAccumulator<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BoundedAccumulator<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    /// Store `item` if there is room. Returns `false` once the accumulator is full.
    pub fn add(&mut self, item: T) -> bool {
        if self.items.len() < self.capacity {
            self.items.push(item);
        }
        !self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}
