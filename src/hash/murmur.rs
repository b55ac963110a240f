//! Incremental 128-bit structural hash.
//!
//! Every [`MurmurHash::append`] runs a full MurmurHash3 x64_128 pass over the
//! appended bytes, seeded with the current `(h1, h2)` state. Values are fed
//! in a canonical layout so fingerprints match across platforms:
//!
//! - scalars: little-endian bytes, `bool` as one byte, `usize` widened to `u64`
//! - strings: UTF-8 bytes followed by a single NUL byte
//! - interned strings: as their string value
//! - nested hashes: `h1` then `h2` as two `u64`
//! - vectors and quaternions: components in `x, y, z, w` order
//! - matrices: glam column-major element order
//! - boxes: `min` components then `max` components
//! - slices of the above: one append over the whole buffer, bit-identical to
//!   a single append over the concatenated element bytes
//!
//! Appending is order dependent.

use std::fmt;
use std::str::FromStr;

use bytemuck::Pod;
use half::f16;
use smallvec::SmallVec;

use crate::util::{Box3f, DVec3, Error, InternedString, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// 128-bit content fingerprint built by successive appends.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MurmurHash {
    h1: u64,
    h2: u64,
}

impl MurmurHash {
    /// Fresh hash; displays as 32 zeros.
    #[inline]
    pub const fn new() -> Self {
        Self { h1: 0, h2: 0 }
    }

    #[inline]
    pub const fn from_parts(h1: u64, h2: u64) -> Self {
        Self { h1, h2 }
    }

    #[inline]
    pub fn h1(&self) -> u64 {
        self.h1
    }

    #[inline]
    pub fn h2(&self) -> u64 {
        self.h2
    }

    /// Append a value in its canonical byte layout.
    #[inline]
    pub fn append<T: HashAppend + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.append_to(self);
        self
    }

    /// Mix raw bytes into the state.
    ///
    /// `element_size` is the width of the scalar components in `bytes`; on
    /// big-endian hosts each component is byte swapped before mixing.
    pub fn append_raw(&mut self, bytes: &[u8], element_size: usize) -> &mut Self {
        let (h1, h2) = murmur3::hash128_seeded(bytes, Some(element_size), (self.h1, self.h2));
        self.h1 = h1;
        self.h2 = h2;
        self
    }
}

impl fmt::Display for MurmurHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.h1, self.h2)
    }
}

impl fmt::Debug for MurmurHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MurmurHash({})", self)
    }
}

impl FromStr for MurmurHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.is_ascii() {
            return Err(Error::argument(format!("expected 32 hex digits, got {:?}", s)));
        }
        let parse = |part: &str| {
            u64::from_str_radix(part, 16)
                .map_err(|e| Error::argument(format!("invalid hash {:?}: {}", s, e)))
        };
        Ok(Self::from_parts(parse(&s[..16])?, parse(&s[16..])?))
    }
}

/// Values that can be fed to a [`MurmurHash`].
pub trait HashAppend {
    fn append_to(&self, h: &mut MurmurHash);
}

/// Plain-old-data values hashed straight from their memory image.
///
/// `COMPONENT_SIZE` is the width of the scalar components, used for
/// endian normalisation.
pub trait HashPod: Pod {
    const COMPONENT_SIZE: usize;
}

macro_rules! impl_hash_pod {
    ($size:expr => $($t:ty),* $(,)?) => {
        $(impl HashPod for $t {
            const COMPONENT_SIZE: usize = $size;
        })*
    };
}

impl_hash_pod!(1 => u8, i8);
impl_hash_pod!(2 => u16, i16, f16);
impl_hash_pod!(4 => u32, i32, f32, Vec2, Vec3, Vec4, Quat, Mat3, Mat4, Box3f);
impl_hash_pod!(8 => u64, i64, f64, DVec3);

impl<T: HashPod> HashAppend for T {
    #[inline]
    fn append_to(&self, h: &mut MurmurHash) {
        h.append_raw(bytemuck::bytes_of(self), T::COMPONENT_SIZE);
    }
}

impl<T: HashPod> HashAppend for [T] {
    #[inline]
    fn append_to(&self, h: &mut MurmurHash) {
        h.append_raw(bytemuck::cast_slice(self), T::COMPONENT_SIZE);
    }
}

impl HashAppend for bool {
    fn append_to(&self, h: &mut MurmurHash) {
        h.append_raw(&[*self as u8], 1);
    }
}

impl HashAppend for [bool] {
    fn append_to(&self, h: &mut MurmurHash) {
        let bytes: Vec<u8> = self.iter().map(|&b| b as u8).collect();
        h.append_raw(&bytes, 1);
    }
}

impl HashAppend for usize {
    fn append_to(&self, h: &mut MurmurHash) {
        (*self as u64).append_to(h);
    }
}

impl HashAppend for str {
    fn append_to(&self, h: &mut MurmurHash) {
        let mut bytes: SmallVec<[u8; 64]> = SmallVec::with_capacity(self.len() + 1);
        bytes.extend_from_slice(self.as_bytes());
        bytes.push(0);
        h.append_raw(&bytes, 1);
    }
}

impl HashAppend for String {
    fn append_to(&self, h: &mut MurmurHash) {
        self.as_str().append_to(h);
    }
}

impl HashAppend for InternedString {
    fn append_to(&self, h: &mut MurmurHash) {
        self.as_str().append_to(h);
    }
}

impl HashAppend for [String] {
    fn append_to(&self, h: &mut MurmurHash) {
        for s in self {
            s.append_to(h);
        }
    }
}

impl HashAppend for [InternedString] {
    fn append_to(&self, h: &mut MurmurHash) {
        for s in self {
            s.append_to(h);
        }
    }
}

impl HashAppend for MurmurHash {
    fn append_to(&self, h: &mut MurmurHash) {
        [self.h1, self.h2].append_to(h);
    }
}

impl<T> HashAppend for Vec<T>
where
    [T]: HashAppend,
{
    #[inline]
    fn append_to(&self, h: &mut MurmurHash) {
        self.as_slice().append_to(h);
    }
}

impl<T: HashPod, const N: usize> HashAppend for [T; N] {
    #[inline]
    fn append_to(&self, h: &mut MurmurHash) {
        self.as_slice().append_to(h);
    }
}
