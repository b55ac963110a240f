//! Memory accounting across shared object graphs.

use std::collections::HashSet;

use super::object::ObjectPtr;

/// Sums memory usage, counting every shared allocation once.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    total: usize,
    seen: HashSet<usize>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed number of bytes.
    #[inline]
    pub fn accumulate(&mut self, bytes: usize) {
        self.total += bytes;
    }

    /// Add the usage of an object unless it was already counted.
    pub fn accumulate_object(&mut self, object: &ObjectPtr) {
        if self.seen.insert(object.addr()) {
            object.read().memory_usage(self);
        }
    }

    /// Add `bytes` for the allocation at `addr` unless already counted.
    pub fn accumulate_shared(&mut self, addr: usize, bytes: usize) {
        if self.seen.insert(addr) {
            self.total += bytes;
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntVectorData;
    use crate::objects::CompoundObject;

    #[test]
    fn test_shared_counted_once() {
        let member = ObjectPtr::new(IntVectorData::new(vec![0; 1000]));
        let single = member.memory_usage();
        assert!(single >= 4000);

        let mut one = CompoundObject::new();
        one.insert("a", member.clone());
        let one = ObjectPtr::new(one).memory_usage();

        let mut two = CompoundObject::new();
        two.insert("a", member.clone());
        two.insert("b", member.clone());
        let two = ObjectPtr::new(two).memory_usage();

        assert!(two < one + single);
        assert!(two > one);
    }

    #[test]
    fn test_shared_bytes() {
        let mut acc = MemoryAccumulator::new();
        acc.accumulate_shared(1, 10);
        acc.accumulate_shared(1, 10);
        acc.accumulate(5);
        assert_eq!(acc.total(), 15);
    }
}
