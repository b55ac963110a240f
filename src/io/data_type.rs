//! Leaf values stored in a hierarchical container.
//!
//! A leaf is either a scalar or a homogeneous array of one [`ValueKind`].
//! The on-disk payload is little-endian with no padding; strings inside
//! arrays are length-prefixed with a `u32`.

use std::fmt;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;

use crate::util::{Error, InternedString, Result};

/// Element kind of a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueKind {
    UChar = 1,
    Char = 2,
    UShort = 3,
    Short = 4,
    UInt = 5,
    Int = 6,
    UInt64 = 7,
    Int64 = 8,
    Half = 9,
    Float = 10,
    Double = 11,
    String = 12,
    InternedString = 13,
}

impl ValueKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => Self::UChar,
            2 => Self::Char,
            3 => Self::UShort,
            4 => Self::Short,
            5 => Self::UInt,
            6 => Self::Int,
            7 => Self::UInt64,
            8 => Self::Int64,
            9 => Self::Half,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::InternedString,
            _ => return None,
        })
    }

    /// Size in bytes of one element, `None` for strings.
    pub fn element_size(&self) -> Option<usize> {
        match self {
            Self::UChar | Self::Char => Some(1),
            Self::UShort | Self::Short | Self::Half => Some(2),
            Self::UInt | Self::Int | Self::Float => Some(4),
            Self::UInt64 | Self::Int64 | Self::Double => Some(8),
            Self::String | Self::InternedString => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UChar => "UChar",
            Self::Char => "Char",
            Self::UShort => "UShort",
            Self::Short => "Short",
            Self::UInt => "UInt",
            Self::Int => "Int",
            Self::UInt64 => "UInt64",
            Self::Int64 => "Int64",
            Self::Half => "Half",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::InternedString => "InternedString",
        }
    }
}

/// Element kind plus scalar/array shape.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    pub kind: ValueKind,
    pub is_array: bool,
}

impl DataType {
    const ARRAY_BIT: u8 = 0x80;

    #[inline]
    pub const fn scalar(kind: ValueKind) -> Self {
        Self { kind, is_array: false }
    }

    #[inline]
    pub const fn array(kind: ValueKind) -> Self {
        Self { kind, is_array: true }
    }

    /// Single-byte code used in directory indices.
    pub fn code(&self) -> u8 {
        self.kind as u8 | if self.is_array { Self::ARRAY_BIT } else { 0 }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        let kind = ValueKind::from_u8(code & !Self::ARRAY_BIT)
            .ok_or_else(|| Error::invalid(format!("unknown data type code {:#x}", code)))?;
        Ok(Self { kind, is_array: code & Self::ARRAY_BIT != 0 })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}Array", self.kind.name())
        } else {
            f.write_str(self.kind.name())
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! leaf_enum {
    ($( $scalar:ident / $array:ident : $t:ty => $kind:ident ),* $(,)?) => {
        /// A typed value stored at a container leaf.
        #[derive(Clone, Debug, PartialEq)]
        pub enum Leaf {
            $( $scalar($t), )*
            $( $array(Vec<$t>), )*
        }

        impl Leaf {
            pub fn data_type(&self) -> DataType {
                match self {
                    $( Leaf::$scalar(_) => DataType::scalar(ValueKind::$kind), )*
                    $( Leaf::$array(_) => DataType::array(ValueKind::$kind), )*
                }
            }

            /// Element count for arrays, `None` for scalars.
            pub fn array_length(&self) -> Option<usize> {
                match self {
                    $( Leaf::$array(v) => Some(v.len()), )*
                    _ => None,
                }
            }
        }

        $(
            impl LeafValue for $t {
                const DATA_TYPE: DataType = DataType::scalar(ValueKind::$kind);

                fn into_leaf(self) -> Leaf {
                    Leaf::$scalar(self)
                }

                fn from_leaf(leaf: Leaf) -> std::result::Result<Self, Leaf> {
                    match leaf {
                        Leaf::$scalar(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }

            impl LeafValue for Vec<$t> {
                const DATA_TYPE: DataType = DataType::array(ValueKind::$kind);

                fn into_leaf(self) -> Leaf {
                    Leaf::$array(self)
                }

                fn from_leaf(leaf: Leaf) -> std::result::Result<Self, Leaf> {
                    match leaf {
                        Leaf::$array(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

/// Rust types that map one-to-one onto a [`Leaf`] variant.
pub trait LeafValue: Sized {
    const DATA_TYPE: DataType;

    fn into_leaf(self) -> Leaf;

    /// Extract the value, handing the leaf back when the variant differs.
    fn from_leaf(leaf: Leaf) -> std::result::Result<Self, Leaf>;
}

leaf_enum! {
    UChar / UCharArray: u8 => UChar,
    Char / CharArray: i8 => Char,
    UShort / UShortArray: u16 => UShort,
    Short / ShortArray: i16 => Short,
    UInt / UIntArray: u32 => UInt,
    Int / IntArray: i32 => Int,
    UInt64 / UInt64Array: u64 => UInt64,
    Int64 / Int64Array: i64 => Int64,
    Half / HalfArray: f16 => Half,
    Float / FloatArray: f32 => Float,
    Double / DoubleArray: f64 => Double,
    String / StringArray: String => String,
    InternedString / InternedStringArray: InternedString => InternedString,
}

impl Leaf {
    /// Encode to the little-endian payload layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writes into a Vec cannot fail.
        let _ = self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        match self {
            Leaf::UChar(v) => out.write_u8(*v)?,
            Leaf::Char(v) => out.write_i8(*v)?,
            Leaf::UShort(v) => out.write_u16::<LittleEndian>(*v)?,
            Leaf::Short(v) => out.write_i16::<LittleEndian>(*v)?,
            Leaf::UInt(v) => out.write_u32::<LittleEndian>(*v)?,
            Leaf::Int(v) => out.write_i32::<LittleEndian>(*v)?,
            Leaf::UInt64(v) => out.write_u64::<LittleEndian>(*v)?,
            Leaf::Int64(v) => out.write_i64::<LittleEndian>(*v)?,
            Leaf::Half(v) => out.write_u16::<LittleEndian>(v.to_bits())?,
            Leaf::Float(v) => out.write_f32::<LittleEndian>(*v)?,
            Leaf::Double(v) => out.write_f64::<LittleEndian>(*v)?,
            Leaf::String(v) => out.extend_from_slice(v.as_bytes()),
            Leaf::InternedString(v) => out.extend_from_slice(v.as_bytes()),
            Leaf::UCharArray(v) => out.extend_from_slice(v),
            Leaf::CharArray(v) => out.extend(v.iter().map(|&c| c as u8)),
            Leaf::UShortArray(v) => v.iter().try_for_each(|&x| out.write_u16::<LittleEndian>(x))?,
            Leaf::ShortArray(v) => v.iter().try_for_each(|&x| out.write_i16::<LittleEndian>(x))?,
            Leaf::UIntArray(v) => v.iter().try_for_each(|&x| out.write_u32::<LittleEndian>(x))?,
            Leaf::IntArray(v) => v.iter().try_for_each(|&x| out.write_i32::<LittleEndian>(x))?,
            Leaf::UInt64Array(v) => v.iter().try_for_each(|&x| out.write_u64::<LittleEndian>(x))?,
            Leaf::Int64Array(v) => v.iter().try_for_each(|&x| out.write_i64::<LittleEndian>(x))?,
            Leaf::HalfArray(v) => v
                .iter()
                .try_for_each(|x| out.write_u16::<LittleEndian>(x.to_bits()))?,
            Leaf::FloatArray(v) => v.iter().try_for_each(|&x| out.write_f32::<LittleEndian>(x))?,
            Leaf::DoubleArray(v) => v.iter().try_for_each(|&x| out.write_f64::<LittleEndian>(x))?,
            Leaf::StringArray(v) => {
                for s in v {
                    write_prefixed(out, s.as_bytes())?;
                }
            }
            Leaf::InternedStringArray(v) => {
                for s in v {
                    write_prefixed(out, s.as_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Decode a payload written by [`Leaf::encode`].
    pub fn decode(data_type: DataType, bytes: &[u8]) -> Result<Leaf> {
        let mut r = Cursor::new(bytes);
        let len = bytes.len();

        if !data_type.is_array {
            let leaf = match data_type.kind {
                ValueKind::String => return Ok(Leaf::String(String::from_utf8(bytes.to_vec())?)),
                ValueKind::InternedString => {
                    let s = std::str::from_utf8(bytes).map_err(|e| Error::invalid(e.to_string()))?;
                    return Ok(Leaf::InternedString(InternedString::new(s)));
                }
                ValueKind::UChar => Leaf::UChar(r.read_u8()?),
                ValueKind::Char => Leaf::Char(r.read_i8()?),
                ValueKind::UShort => Leaf::UShort(r.read_u16::<LittleEndian>()?),
                ValueKind::Short => Leaf::Short(r.read_i16::<LittleEndian>()?),
                ValueKind::UInt => Leaf::UInt(r.read_u32::<LittleEndian>()?),
                ValueKind::Int => Leaf::Int(r.read_i32::<LittleEndian>()?),
                ValueKind::UInt64 => Leaf::UInt64(r.read_u64::<LittleEndian>()?),
                ValueKind::Int64 => Leaf::Int64(r.read_i64::<LittleEndian>()?),
                ValueKind::Half => Leaf::Half(f16::from_bits(r.read_u16::<LittleEndian>()?)),
                ValueKind::Float => Leaf::Float(r.read_f32::<LittleEndian>()?),
                ValueKind::Double => Leaf::Double(r.read_f64::<LittleEndian>()?),
            };
            if r.position() as usize != len {
                return Err(Error::invalid(format!("{} payload has {} bytes", data_type, len)));
            }
            return Ok(leaf);
        }

        if let Some(size) = data_type.kind.element_size() {
            if len % size != 0 {
                return Err(Error::invalid(format!(
                    "{} payload of {} bytes is not a multiple of {}",
                    data_type, len, size
                )));
            }
        }
        let n = data_type.kind.element_size().map(|s| len / s).unwrap_or(0);

        Ok(match data_type.kind {
            ValueKind::UChar => Leaf::UCharArray(bytes.to_vec()),
            ValueKind::Char => Leaf::CharArray(bytes.iter().map(|&b| b as i8).collect()),
            ValueKind::UShort => Leaf::UShortArray(read_n(n, || r.read_u16::<LittleEndian>())?),
            ValueKind::Short => Leaf::ShortArray(read_n(n, || r.read_i16::<LittleEndian>())?),
            ValueKind::UInt => Leaf::UIntArray(read_n(n, || r.read_u32::<LittleEndian>())?),
            ValueKind::Int => Leaf::IntArray(read_n(n, || r.read_i32::<LittleEndian>())?),
            ValueKind::UInt64 => Leaf::UInt64Array(read_n(n, || r.read_u64::<LittleEndian>())?),
            ValueKind::Int64 => Leaf::Int64Array(read_n(n, || r.read_i64::<LittleEndian>())?),
            ValueKind::Half => Leaf::HalfArray(read_n(n, || {
                r.read_u16::<LittleEndian>().map(f16::from_bits)
            })?),
            ValueKind::Float => Leaf::FloatArray(read_n(n, || r.read_f32::<LittleEndian>())?),
            ValueKind::Double => Leaf::DoubleArray(read_n(n, || r.read_f64::<LittleEndian>())?),
            ValueKind::String => {
                let mut out = Vec::new();
                while (r.position() as usize) < len {
                    out.push(String::from_utf8(read_prefixed(&mut r)?)?);
                }
                Leaf::StringArray(out)
            }
            ValueKind::InternedString => {
                let mut out = Vec::new();
                while (r.position() as usize) < len {
                    let s = String::from_utf8(read_prefixed(&mut r)?)?;
                    out.push(InternedString::new(&s));
                }
                Leaf::InternedStringArray(out)
            }
        })
    }
}

fn read_n<T>(n: usize, mut f: impl FnMut() -> std::io::Result<T>) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(f()?);
    }
    Ok(out)
}

fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(bytes.len() as u32)?;
    out.extend_from_slice(bytes);
    Ok(())
}

fn read_prefixed(r: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    let remaining = r.get_ref().len() - r.position() as usize;
    if n > remaining {
        return Err(Error::UnexpectedEof(r.position() + n as u64));
    }
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for kind in (1..=13).filter_map(ValueKind::from_u8) {
            for is_array in [false, true] {
                let dt = DataType { kind, is_array };
                assert_eq!(DataType::from_code(dt.code()).unwrap(), dt);
            }
        }
        assert!(DataType::from_code(0x7f).is_err());
    }

    #[test]
    fn test_payload_layout_is_little_endian() {
        assert_eq!(Leaf::UInt(0x0102_0304).encode(), vec![4, 3, 2, 1]);
        assert_eq!(Leaf::String("ab".into()).encode(), b"ab".to_vec());
        assert_eq!(
            Leaf::StringArray(vec!["a".into(), "".into()]).encode(),
            vec![1, 0, 0, 0, b'a', 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_decode_mixed() {
        let leaves = [
            Leaf::Half(f16::from_f32(0.5)),
            Leaf::DoubleArray(vec![1.0, -2.5]),
            Leaf::InternedStringArray(vec!["a".into(), "bc".into()]),
            Leaf::StringArray(vec![]),
        ];
        for leaf in leaves {
            let back = Leaf::decode(leaf.data_type(), &leaf.encode()).unwrap();
            assert_eq!(back, leaf);
        }
    }

    #[test]
    fn test_decode_rejects_bad_size() {
        assert!(Leaf::decode(DataType::scalar(ValueKind::UInt), &[1, 2]).is_err());
        assert!(Leaf::decode(DataType::array(ValueKind::Float), &[0; 7]).is_err());
        assert!(Leaf::decode(DataType::array(ValueKind::String), &[9, 0, 0, 0, b'x']).is_err());
    }

    #[test]
    fn test_leaf_value_mismatch_returns_leaf() {
        let leaf = Leaf::Int(3);
        let back = <u32 as LeafValue>::from_leaf(leaf.clone());
        assert_eq!(back, Err(leaf));
        assert_eq!(<i32 as LeafValue>::from_leaf(Leaf::Int(3)), Ok(3));
    }
}
