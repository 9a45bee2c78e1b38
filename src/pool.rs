use crate::error::Error;

// -------------------------------------------------------------------------------------------------

/// End-of-list sentinel in the link slab.
const LIST_END: i32 = -1;

// -------------------------------------------------------------------------------------------------

/// Position within an [`IndexPool`]'s used list.
///
/// A cursor addresses the link cell *pointing at* the current node, not the
/// node itself. This makes it valid to remove the current node through the
/// cursor and keep iterating from its successor, which the per-block mix loop
/// relies on to retire finished grains while scanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor(usize);

// -------------------------------------------------------------------------------------------------

/// A fixed-capacity index allocator backed by a single slab of link cells.
///
/// Two intrusive singly-linked lists, "used" and "free", share the slab: cell
/// `i < capacity` holds the successor of node `i`, cell `capacity` holds the
/// used-list head and cell `capacity + 1` the free-list head. Every index in
/// `0..capacity` is in exactly one of the two lists at all times. The slab is
/// allocated once at construction and never grows, so all operations are
/// allocation free.
#[derive(Debug)]
pub struct IndexPool {
    links: Box<[i32]>,
    capacity: usize,
}

impl IndexPool {
    /// Create a pool with all `capacity` indices on the free list.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity < i32::MAX as usize, "pool capacity out of range");
        let mut links = vec![LIST_END; capacity + 2];
        for (index, link) in links.iter_mut().enumerate().take(capacity) {
            *link = if index + 1 < capacity {
                (index + 1) as i32
            } else {
                LIST_END
            };
        }
        links[capacity] = LIST_END;
        links[capacity + 1] = if capacity > 0 { 0 } else { LIST_END };
        Self {
            links: links.into_boxed_slice(),
            capacity,
        }
    }

    /// Total number of indices managed by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of indices currently on the used list. O(len).
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if the used list is empty.
    pub fn is_empty(&self) -> bool {
        self.links[self.capacity] == LIST_END
    }

    /// Returns true if the free list is empty.
    pub fn is_full(&self) -> bool {
        self.links[self.capacity + 1] == LIST_END
    }

    /// Cursor positioned before the first used node.
    pub fn head(&self) -> Cursor {
        Cursor(self.capacity)
    }

    /// Index of the node the cursor currently points at, if any.
    pub fn current(&self, cursor: Cursor) -> Option<usize> {
        let target = self.links[cursor.0];
        (target != LIST_END).then_some(target as usize)
    }

    /// Move the cursor past the current node. Stays put at the list end.
    pub fn advance(&self, cursor: Cursor) -> Cursor {
        let target = self.links[cursor.0];
        if target == LIST_END {
            cursor
        } else {
            Cursor(target as usize)
        }
    }

    /// Move one index from the free list to the front of the used list.
    pub fn allocate_at_head(&mut self) -> Result<usize, Error> {
        let index = self.pop_free()?;
        self.links[index] = self.links[self.capacity];
        self.links[self.capacity] = index as i32;
        Ok(index)
    }

    /// Splice a freed index into the used list just before the cursor's
    /// current node. The cursor then points at the new node.
    pub fn allocate_before(&mut self, cursor: Cursor) -> Result<usize, Error> {
        let index = self.pop_free()?;
        self.links[index] = self.links[cursor.0];
        self.links[cursor.0] = index as i32;
        Ok(index)
    }

    /// Splice a freed index before the `n`th used node, or at the list end if
    /// `n` is past it. O(n).
    pub fn allocate_nth(&mut self, n: usize) -> Result<usize, Error> {
        let mut cursor = self.head();
        for _ in 0..n {
            if self.current(cursor).is_none() {
                break;
            }
            cursor = self.advance(cursor);
        }
        self.allocate_before(cursor)
    }

    /// Move one specific index from the free list to the front of the used
    /// list. Fails with `IndexNotFound` if it is already allocated. O(capacity).
    pub fn allocate_by_index(&mut self, index: usize) -> Result<usize, Error> {
        if index >= self.capacity {
            return Err(Error::IndexOutOfRange {
                index,
                max: self.capacity,
            });
        }
        let mut cell = self.capacity + 1;
        loop {
            let target = self.links[cell];
            if target == LIST_END {
                return Err(Error::IndexNotFound(index));
            }
            if target as usize == index {
                self.links[cell] = self.links[index];
                self.links[index] = self.links[self.capacity];
                self.links[self.capacity] = index as i32;
                return Ok(index);
            }
            cell = target as usize;
        }
    }

    /// Remove the front of the used list and return it to the free list.
    pub fn release_head(&mut self) -> Result<usize, Error> {
        self.release_at(self.head())
    }

    /// Remove the cursor's current node and return it to the free list. The
    /// cursor then points at the removed node's successor.
    pub fn release_at(&mut self, cursor: Cursor) -> Result<usize, Error> {
        let target = self.links[cursor.0];
        if target == LIST_END {
            return Err(Error::PoolEmpty);
        }
        let index = target as usize;
        self.links[cursor.0] = self.links[index];
        self.links[index] = self.links[self.capacity + 1];
        self.links[self.capacity + 1] = target;
        Ok(index)
    }

    /// Remove the `n`th used node. O(n).
    pub fn release_nth(&mut self, n: usize) -> Result<usize, Error> {
        let mut cursor = self.head();
        for _ in 0..n {
            if self.current(cursor).is_none() {
                return Err(Error::IndexOutOfRange {
                    index: n,
                    max: self.len(),
                });
            }
            cursor = self.advance(cursor);
        }
        self.release_at(cursor)
    }

    /// Remove one specific index from the used list. Fails with
    /// `IndexNotFound` if it is not allocated. O(capacity).
    pub fn release_by_index(&mut self, index: usize) -> Result<usize, Error> {
        if index >= self.capacity {
            return Err(Error::IndexOutOfRange {
                index,
                max: self.capacity,
            });
        }
        let mut cursor = self.head();
        while let Some(current) = self.current(cursor) {
            if current == index {
                return self.release_at(cursor);
            }
            cursor = self.advance(cursor);
        }
        Err(Error::IndexNotFound(index))
    }

    /// Move every used index back to the free list.
    pub fn release_all(&mut self) {
        while self.release_head().is_ok() {}
    }

    /// Iterate over the used list, front to back.
    ///
    /// The iterator borrows the pool. Loops that mutate the pool while
    /// scanning use explicit [`Cursor`]s instead.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = self.head();
        std::iter::from_fn(move || {
            let index = self.current(cursor)?;
            cursor = self.advance(cursor);
            Some(index)
        })
    }

    fn pop_free(&mut self) -> Result<usize, Error> {
        let first = self.links[self.capacity + 1];
        if first == LIST_END {
            return Err(Error::PoolExhausted);
        }
        let index = first as usize;
        self.links[self.capacity + 1] = self.links[index];
        Ok(index)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Check that the used and free lists partition 0..capacity exactly.
    fn assert_partition(pool: &IndexPool) {
        let mut seen = vec![false; pool.capacity()];
        for index in pool.iter() {
            assert!(!seen[index], "index {index} used twice");
            seen[index] = true;
        }
        let mut cell = pool.capacity() + 1;
        loop {
            let target = pool.links[cell];
            if target == LIST_END {
                break;
            }
            let index = target as usize;
            assert!(!seen[index], "index {index} both used and free");
            seen[index] = true;
            cell = index;
        }
        assert!(seen.iter().all(|s| *s), "index leaked out of both lists");
    }

    fn used(pool: &IndexPool) -> Vec<usize> {
        pool.iter().collect()
    }

    #[test]
    fn partition_invariant() {
        let mut pool = IndexPool::new(5);
        assert_partition(&pool);
        for _ in 0..5 {
            pool.allocate_at_head().unwrap();
            assert_partition(&pool);
        }
        assert!(matches!(
            pool.allocate_at_head(),
            Err(Error::PoolExhausted)
        ));
        assert_partition(&pool);
        for _ in 0..5 {
            pool.release_head().unwrap();
            assert_partition(&pool);
        }
        assert!(matches!(pool.release_head(), Err(Error::PoolEmpty)));
        assert_partition(&pool);
    }

    #[test]
    fn release_then_allocate_restores_order() {
        let mut pool = IndexPool::new(4);
        for _ in 0..3 {
            pool.allocate_at_head().unwrap();
        }
        let before = used(&pool);
        let released = pool.release_head().unwrap();
        let reallocated = pool.allocate_at_head().unwrap();
        assert_eq!(released, reallocated);
        assert_eq!(used(&pool), before);
    }

    #[test]
    fn allocate_by_index_targets_free_nodes_only() {
        let mut pool = IndexPool::new(4);
        assert_eq!(pool.allocate_by_index(2).unwrap(), 2);
        assert_eq!(used(&pool), vec![2]);
        assert!(matches!(
            pool.allocate_by_index(2),
            Err(Error::IndexNotFound(2))
        ));
        assert!(matches!(
            pool.allocate_by_index(7),
            Err(Error::IndexOutOfRange { index: 7, max: 4 })
        ));
        assert_eq!(used(&pool), vec![2]);
        assert_partition(&pool);
    }

    #[test]
    fn release_by_index_is_idempotent_on_failure() {
        let mut pool = IndexPool::new(4);
        pool.allocate_by_index(1).unwrap();
        pool.allocate_by_index(3).unwrap();
        let before = used(&pool);
        assert!(matches!(
            pool.release_by_index(0),
            Err(Error::IndexNotFound(0))
        ));
        assert_eq!(used(&pool), before);
        assert_eq!(pool.release_by_index(1).unwrap(), 1);
        assert_eq!(used(&pool), vec![3]);
        assert_partition(&pool);
    }

    #[test]
    fn splice_before_cursor_and_nth() {
        let mut pool = IndexPool::new(5);
        let a = pool.allocate_at_head().unwrap();
        let b = pool.allocate_at_head().unwrap();
        // Splice in the middle: after one hop the cursor points at `a`.
        let cursor = pool.advance(pool.head());
        let c = pool.allocate_before(cursor).unwrap();
        assert_eq!(used(&pool), vec![b, c, a]);
        // And at the very end.
        let d = pool.allocate_nth(10).unwrap();
        assert_eq!(used(&pool), vec![b, c, a, d]);
        assert_partition(&pool);
    }

    #[test]
    fn remove_current_while_iterating() {
        let mut pool = IndexPool::new(6);
        for _ in 0..5 {
            pool.allocate_at_head().unwrap();
        }
        // Retire every even index mid-scan, as the mixer does with grains.
        let mut cursor = pool.head();
        while let Some(index) = pool.current(cursor) {
            if index % 2 == 0 {
                pool.release_at(cursor).unwrap();
            } else {
                cursor = pool.advance(cursor);
            }
        }
        assert_eq!(used(&pool), vec![3, 1]);
        assert_partition(&pool);
    }
}
