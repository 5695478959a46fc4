use std::ops::Index;

use crate::utils::MyHash;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    next: usize,
}

/// Hash-consing table: every distinct value is stored exactly once.
///
/// Values are addressed by 1-based indices; index 0 is reserved as the
/// end-of-chain marker. Collisions are chained through `next` and resolved
/// by exact comparison. The bucket array doubles (and all chains are rebuilt)
/// whenever the number of stored values exceeds the number of buckets.
#[derive(Debug)]
pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T> {
    /// Create a new table with `2^bits` initial buckets.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Table bits should be in the range 0..=31");

        let buckets_size = 1 << bits;
        Self {
            data: Vec::new(),
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
        }
    }

    /// Get the number of stored values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of buckets.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index - 1].value
    }

    fn next(&self, index: usize) -> usize {
        self.data[index - 1].next
    }

    fn set_next(&mut self, index: usize, next: usize) {
        self.data[index - 1].next = next;
    }

    /// Iterate over all `(index, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.data.iter().enumerate().map(|(i, e)| (i + 1, &e.value))
    }
}

impl<T> Table<T>
where
    T: MyHash,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Find the index of a value equal to `value`, if it is stored.
    pub fn find(&self, value: &T) -> Option<usize>
    where
        T: Eq,
    {
        let mut index = self.buckets[self.bucket_index(value)];
        while index != 0 {
            if self.value(index) == value {
                return Some(index);
            }
            index = self.next(index);
        }
        None
    }

    /// Put a value into the table and return its index.
    ///
    /// If an equal value is already stored, its index is returned
    /// and `value` is dropped.
    pub fn put(&mut self, value: T) -> usize
    where
        T: Eq,
    {
        if let Some(index) = self.find(&value) {
            return index;
        }

        let bucket_index = self.bucket_index(&value);
        self.data.push(Entry {
            value,
            next: self.buckets[bucket_index],
        });
        let index = self.data.len();
        self.buckets[bucket_index] = index;

        if self.data.len() > self.buckets.len() {
            self.grow();
        }

        index
    }

    fn grow(&mut self) {
        let buckets_size = self.buckets.len() * 2;
        self.buckets = vec![0; buckets_size];
        self.bitmask = (buckets_size - 1) as u64;

        for index in 1..=self.data.len() {
            let bucket_index = self.bucket_index(self.value(index));
            let head = self.buckets[bucket_index];
            self.set_next(index, head);
            self.buckets[bucket_index] = index;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            // Deliberately collides for `x` and `-x`.
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_put_dedup() {
        let mut table = Table::new(2);
        let i1 = table.put(Item(5));
        let i2 = table.put(Item(5));
        assert_eq!(i1, i2);
        assert_eq!(table.len(), 1);
        assert_eq!(table[i1], Item(5));
    }

    #[test]
    fn test_put_collision() {
        let mut table = Table::new(2);
        let i1 = table.put(Item(5));
        let i2 = table.put(Item(-5));
        assert_ne!(i1, i2);
        assert_eq!(table[i1], Item(5));
        assert_eq!(table[i2], Item(-5));
        assert_eq!(table.find(&Item(-5)), Some(i2));
        assert_eq!(table.find(&Item(7)), None);
    }

    #[test]
    fn test_grow_keeps_indices() {
        let mut table = Table::new(1);
        let indices: Vec<usize> = (0..100).map(|i| table.put(Item(i))).collect();
        assert!(table.buckets() >= 100);
        for (i, &index) in indices.iter().enumerate() {
            assert_eq!(table[index], Item(i as i32));
            assert_eq!(table.put(Item(i as i32)), index);
        }
        assert_eq!(table.len(), 100);
    }

    #[test]
    #[should_panic(expected = "Index is 0")]
    fn test_index_zero() {
        let table = Table::<Item>::new(1);
        table.value(0);
    }
}
