//! Two dimensional grid of objects.

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, OBJECT,
};
use crate::hash::MurmurHash;
use crate::util::{Error, Result};

use super::vector::{copy_slots, hash_slots, load_slots, save_slots, slots_equal, slots_memory};

pub static OBJECT_MATRIX: TypeDescription =
    TypeDescription::new(TypeId::OBJECT_MATRIX, "ObjectMatrix", Some(&OBJECT));

const IO_VERSION: u32 = 0;

/// Row-major `rows x cols` grid of optional objects.
#[derive(Debug, Default)]
pub struct ObjectMatrix {
    rows: usize,
    cols: usize,
    members: Vec<Option<ObjectPtr>>,
}

impl ObjectMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            members: vec![None; rows * cols],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    fn index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.rows {
            return Err(Error::IndexOutOfRange {
                index: row,
                size: self.rows,
            });
        }
        if col >= self.cols {
            return Err(Error::IndexOutOfRange {
                index: col,
                size: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Option<&ObjectPtr>> {
        let i = self.index(row, col)?;
        Ok(self.members[i].as_ref())
    }

    pub fn set(&mut self, row: usize, col: usize, value: Option<ObjectPtr>) -> Result<()> {
        let i = self.index(row, col)?;
        self.members[i] = value;
        Ok(())
    }

    /// Change the shape, keeping every member whose position exists in both.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let mut members = vec![None; rows * cols];
        for r in 0..rows.min(self.rows) {
            for c in 0..cols.min(self.cols) {
                members[r * cols + c] = self.members[r * self.cols + c].take();
            }
        }
        self.rows = rows;
        self.cols = cols;
        self.members = members;
    }

    /// Row-major slots.
    pub fn members(&self) -> &[Option<ObjectPtr>] {
        &self.members
    }
}

impl Object for ObjectMatrix {
    object_accessors!(OBJECT_MATRIX);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&OBJECT_MATRIX, other)?;
        self.members = copy_slots(&other.members, ctx)?;
        self.rows = other.rows;
        self.cols = other.cols;
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other.downcast_ref::<Self>().is_some_and(|o| {
                self.rows == o.rows && self.cols == o.cols && slots_equal(&self.members, &o.members)
            })
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        h.append(&self.rows).append(&self.cols);
        hash_slots(&self.members, h);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        acc.accumulate(2 * std::mem::size_of::<usize>());
        slots_memory(&self.members, acc);
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(OBJECT_MATRIX.name, IO_VERSION)?;
        container.write_value("rows", self.rows as u32)?;
        container.write_value("cols", self.cols as u32)?;
        save_slots(&self.members, ctx, &container)
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(OBJECT_MATRIX.name, &mut version)?;
        self.rows = container.read_u32("rows")? as usize;
        self.cols = container.read_u32("cols")? as usize;
        self.members = load_slots(self.rows * self.cols, ctx, &container)?;
        Ok(())
    }
}

impl ObjectType for ObjectMatrix {
    fn static_description() -> &'static TypeDescription {
        &OBJECT_MATRIX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntData;
    use crate::io::MemoryIndexedIo;

    fn int(v: i32) -> Option<ObjectPtr> {
        Some(ObjectPtr::new(IntData::new(v)))
    }

    fn value(m: &ObjectMatrix, r: usize, c: usize) -> Option<i32> {
        m.get(r, c)
            .unwrap()
            .map(|p| *p.downcast_ref::<IntData>().unwrap().value())
    }

    #[test]
    fn test_resize_preserves_positions() {
        let mut m = ObjectMatrix::new(2, 2);
        m.set(0, 0, int(1)).unwrap();
        m.set(0, 1, int(2)).unwrap();
        m.set(1, 0, int(3)).unwrap();
        m.set(1, 1, int(4)).unwrap();

        m.resize(3, 3);
        assert_eq!((m.rows(), m.cols()), (3, 3));
        assert_eq!(value(&m, 0, 0), Some(1));
        assert_eq!(value(&m, 0, 1), Some(2));
        assert_eq!(value(&m, 1, 0), Some(3));
        assert_eq!(value(&m, 1, 1), Some(4));
        for (r, c) in [(0, 2), (1, 2), (2, 0), (2, 1), (2, 2)] {
            assert_eq!(value(&m, r, c), None);
        }

        m.resize(1, 2);
        assert_eq!(value(&m, 0, 1), Some(2));
        assert!(m.get(1, 0).is_err());
    }

    #[test]
    fn test_out_of_range() {
        let m = ObjectMatrix::new(2, 3);
        assert!(matches!(m.get(2, 0), Err(Error::IndexOutOfRange { index: 2, size: 2 })));
        assert!(matches!(m.get(0, 3), Err(Error::IndexOutOfRange { index: 3, size: 3 })));
    }

    #[test]
    fn test_shape_in_hash_and_round_trip() {
        let a = ObjectPtr::new(ObjectMatrix::new(2, 3));
        let b = ObjectPtr::new(ObjectMatrix::new(3, 2));
        assert_ne!(a.hash(), b.hash());
        assert!(!a.is_equal_to(&b));

        let mut m = ObjectMatrix::new(2, 2);
        m.set(1, 0, int(5)).unwrap();
        let src = ObjectPtr::new(m);
        let io = MemoryIndexedIo::create();
        src.save(&io, "m").unwrap();
        assert!(ObjectPtr::load(&io, "m").unwrap().is_equal_to(&src));
    }
}
