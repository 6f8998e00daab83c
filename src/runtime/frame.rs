//! Argument/result frames and native struct values.
//!
//! Values are stored in native byte order at the offsets of a
//! [`FrameLayout`]; the buffer is what the native wrapper sees through its
//! packed struct pointer.

use crate::core::ctype::NativeLayout;
use crate::core::layout::{FrameLayout, FrameSlot};

use super::RuntimeError;

/// A scalar that can live in a frame slot or struct field.
pub trait FrameValue: Sized {
    const SIZE: usize;

    fn write_to(&self, out: &mut [u8]);

    fn read_from(bytes: &[u8]) -> Self;
}

macro_rules! impl_frame_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl FrameValue for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_to(&self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }

                fn read_from(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_ne_bytes(buf)
                }
            }
        )*
    };
}

impl_frame_value!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);

impl<T> FrameValue for *const T {
    const SIZE: usize = std::mem::size_of::<usize>();

    fn write_to(&self, out: &mut [u8]) {
        (*self as usize).write_to(out);
    }

    fn read_from(bytes: &[u8]) -> Self {
        usize::read_from(bytes) as *const T
    }
}

impl<T> FrameValue for *mut T {
    const SIZE: usize = std::mem::size_of::<usize>();

    fn write_to(&self, out: &mut [u8]) {
        (*self as usize).write_to(out);
    }

    fn read_from(bytes: &[u8]) -> Self {
        usize::read_from(bytes) as *mut T
    }
}

fn check_width(name: &str, expected: u64, actual: usize) -> Result<(), RuntimeError> {
    if expected != actual as u64 {
        return Err(RuntimeError::SizeMismatch {
            slot: name.to_string(),
            expected,
            actual: actual as u64,
        });
    }
    Ok(())
}

/// An argument/result frame, exclusively owned by one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    layout: FrameLayout,
    bytes: Vec<u8>,
}

impl Frame {
    /// A zeroed frame for `layout`.
    pub fn new(layout: FrameLayout) -> Self {
        let bytes = vec![0; layout.size as usize];
        Frame { layout, bytes }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    fn slot(&self, name: &str) -> Result<&FrameSlot, RuntimeError> {
        self.layout
            .slot(name)
            .ok_or_else(|| RuntimeError::UnknownSlot(name.to_string()))
    }

    fn range(&self, name: &str) -> Result<std::ops::Range<usize>, RuntimeError> {
        let slot = self.slot(name)?;
        let start = slot.offset as usize;
        Ok(start..start + slot.size as usize)
    }

    pub fn put<T: FrameValue>(&mut self, name: &str, value: T) -> Result<(), RuntimeError> {
        check_width(name, self.slot(name)?.size, T::SIZE)?;
        let range = self.range(name)?;
        value.write_to(&mut self.bytes[range]);
        Ok(())
    }

    pub fn get<T: FrameValue>(&self, name: &str) -> Result<T, RuntimeError> {
        check_width(name, self.slot(name)?.size, T::SIZE)?;
        Ok(T::read_from(&self.bytes[self.range(name)?]))
    }

    /// Store an aggregate by value.
    pub fn put_bytes(&mut self, name: &str, value: &[u8]) -> Result<(), RuntimeError> {
        check_width(name, self.slot(name)?.size, value.len())?;
        let range = self.range(name)?;
        self.bytes[range].copy_from_slice(value);
        Ok(())
    }

    pub fn get_bytes(&self, name: &str) -> Result<&[u8], RuntimeError> {
        Ok(&self.bytes[self.range(name)?])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pointer handed to the native wrapper.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }
}

/// A native struct value built field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStruct {
    layout: NativeLayout,
    bytes: Vec<u8>,
}

impl NativeStruct {
    pub fn new(layout: NativeLayout) -> Self {
        let bytes = vec![0; layout.size as usize];
        NativeStruct { layout, bytes }
    }

    pub fn from_bytes(layout: NativeLayout, bytes: &[u8]) -> Result<Self, RuntimeError> {
        check_width("struct", layout.size, bytes.len())?;
        Ok(NativeStruct {
            layout,
            bytes: bytes.to_vec(),
        })
    }

    fn range(&self, field: &str) -> Result<(std::ops::Range<usize>, u64), RuntimeError> {
        let f = self
            .layout
            .fields
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| RuntimeError::UnknownSlot(field.to_string()))?;
        let start = f.offset as usize;
        Ok((start..start + f.size as usize, f.size))
    }

    pub fn set<T: FrameValue>(&mut self, field: &str, value: T) -> Result<(), RuntimeError> {
        let (range, size) = self.range(field)?;
        check_width(field, size, T::SIZE)?;
        value.write_to(&mut self.bytes[range]);
        Ok(())
    }

    pub fn get<T: FrameValue>(&self, field: &str) -> Result<T, RuntimeError> {
        let (range, size) = self.range(field)?;
        check_width(field, size, T::SIZE)?;
        Ok(T::read_from(&self.bytes[range]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ctype::{Aggregate, CType, Field};
    use crate::core::layout::SlotSpec;
    use crate::runtime::strings::{c_string, free, go_string};

    fn int(name: &str, size: u64, signed: bool) -> CType {
        CType::Int {
            name: name.to_string(),
            size,
            signed,
        }
    }

    #[test]
    fn test_i64_roundtrip_is_bit_exact() {
        let layout = FrameLayout::new(&[SlotSpec::new("p0", 8, 8)], &[SlotSpec::new("r", 8, 8)], 8);
        let mut frame = Frame::new(layout);
        for v in [0i64, -1, i64::MIN, i64::MAX, 0x0123_4567_89ab_cdef] {
            frame.put("p0", v).unwrap();
            assert_eq!(frame.get::<i64>("p0").unwrap(), v);
            assert_eq!(&frame.as_bytes()[..8], &v.to_ne_bytes());
        }
    }

    #[test]
    fn test_string_through_frame() {
        let ptr_size = std::mem::size_of::<usize>() as u64;
        let layout = FrameLayout::new(&[SlotSpec::new("p0", ptr_size, ptr_size)], &[], ptr_size);
        let mut frame = Frame::new(layout);

        let p = c_string("héllo, world").unwrap();
        frame.put("p0", p as *const std::os::raw::c_char).unwrap();
        let back: *const std::os::raw::c_char = frame.get("p0").unwrap();
        assert_eq!(back, p as *const _);
        assert_eq!(unsafe { go_string(back) }, "héllo, world");
        unsafe { free(p) };
    }

    #[test]
    fn test_mixed_width_struct_roundtrip() {
        // struct { char c; int i; double d; short s; } on a 64-bit ABI
        let ty = CType::Struct(Aggregate {
            tag: Some("mixed".to_string()),
            size: 24,
            align: 8,
            fields: vec![
                Field {
                    name: "c".to_string(),
                    offset: 0,
                    ty: int("char", 1, true),
                    bit_size: None,
                },
                Field {
                    name: "i".to_string(),
                    offset: 4,
                    ty: int("int", 4, true),
                    bit_size: None,
                },
                Field {
                    name: "d".to_string(),
                    offset: 8,
                    ty: CType::Float {
                        name: "double".to_string(),
                        size: 8,
                    },
                    bit_size: None,
                },
                Field {
                    name: "s".to_string(),
                    offset: 16,
                    ty: int("short", 2, true),
                    bit_size: None,
                },
            ],
            complete: true,
        });
        let mut value = NativeStruct::new(ty.layout());
        value.set("c", -7i8).unwrap();
        value.set("i", 123_456i32).unwrap();
        value.set("d", std::f64::consts::PI).unwrap();
        value.set("s", -2i16).unwrap();

        let layout = FrameLayout::new(
            &[SlotSpec::new("p0", ty.size(), ty.align())],
            &[SlotSpec::new("r", ty.size(), ty.align())],
            8,
        );
        let mut frame = Frame::new(layout);
        frame.put_bytes("p0", value.as_bytes()).unwrap();
        let copied = frame.get_bytes("p0").unwrap().to_vec();
        frame.put_bytes("r", &copied).unwrap();

        let back = NativeStruct::from_bytes(ty.layout(), frame.get_bytes("r").unwrap()).unwrap();
        assert_eq!(back.as_bytes(), value.as_bytes());
        assert_eq!(back.get::<i8>("c").unwrap(), -7);
        assert_eq!(back.get::<i32>("i").unwrap(), 123_456);
        assert_eq!(back.get::<f64>("d").unwrap().to_bits(), std::f64::consts::PI.to_bits());
        assert_eq!(back.get::<i16>("s").unwrap(), -2);
    }

    #[test]
    fn test_width_mismatch() {
        let layout = FrameLayout::new(&[SlotSpec::new("p0", 4, 4)], &[], 8);
        let mut frame = Frame::new(layout);
        assert_eq!(
            frame.put("p0", 1i64),
            Err(RuntimeError::SizeMismatch {
                slot: "p0".to_string(),
                expected: 4,
                actual: 8
            })
        );
        assert_eq!(
            frame.get::<i32>("r"),
            Err(RuntimeError::UnknownSlot("r".to_string()))
        );
    }
}
