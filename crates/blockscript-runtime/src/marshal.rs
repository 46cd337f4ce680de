//! Marshaling between Rust values and flat VM buffers
//!
//! Function inputs and outputs cross the call boundary as little-endian byte
//! buffers laid out exactly like the script sees them: arguments packed in
//! declaration order, each scalar 4 bytes, vectors as consecutive floats.
//!
//! # Examples
//!
//! ```rust
//! use blockscript_runtime::marshal::{ScriptArgs, ScriptValue};
//!
//! let input = (2i32, 3i32).encode_args();
//! assert_eq!(input.len(), 8);
//! assert_eq!(<(i32, i32)>::decode_args(&input), (2, 3));
//! assert_eq!(<(i32, i32)>::type_names(), vec!["int", "int"]);
//! assert_eq!(<[f32; 3]>::BYTE_SIZE, 12);
//! ```

use byteorder::{ByteOrder, LittleEndian};

/// Index into an assembly's string literal table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringHandle(pub u32);

/// A Rust type with a fixed BlockScript counterpart
pub trait ScriptValue: Sized {
    /// BlockScript type name used for signature lookup
    const TYPE_NAME: &'static str;
    /// Size in the flat buffer
    const BYTE_SIZE: usize;

    /// Write into `out[..BYTE_SIZE]`
    fn encode(&self, out: &mut [u8]);

    /// Read from `bytes[..BYTE_SIZE]`
    fn decode(bytes: &[u8]) -> Self;
}

impl ScriptValue for () {
    const TYPE_NAME: &'static str = "void";
    const BYTE_SIZE: usize = 0;

    fn encode(&self, _out: &mut [u8]) {}

    fn decode(_bytes: &[u8]) -> Self {}
}

impl ScriptValue for i32 {
    const TYPE_NAME: &'static str = "int";
    const BYTE_SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_i32(out, *self);
    }

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_i32(bytes)
    }
}

impl ScriptValue for f32 {
    const TYPE_NAME: &'static str = "float";
    const BYTE_SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_f32(out, *self);
    }

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }
}

impl ScriptValue for bool {
    const TYPE_NAME: &'static str = "bool";
    const BYTE_SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_i32(out, *self as i32);
    }

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_i32(bytes) != 0
    }
}

impl ScriptValue for StringHandle {
    const TYPE_NAME: &'static str = "string";
    const BYTE_SIZE: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_u32(out, self.0);
    }

    fn decode(bytes: &[u8]) -> Self {
        StringHandle(LittleEndian::read_u32(bytes))
    }
}

macro_rules! float_vector {
    ($lanes:literal, $name:literal) => {
        impl ScriptValue for [f32; $lanes] {
            const TYPE_NAME: &'static str = $name;
            const BYTE_SIZE: usize = 4 * $lanes;

            fn encode(&self, out: &mut [u8]) {
                LittleEndian::write_f32_into(self, &mut out[..4 * $lanes]);
            }

            fn decode(bytes: &[u8]) -> Self {
                let mut lanes = [0.0f32; $lanes];
                LittleEndian::read_f32_into(&bytes[..4 * $lanes], &mut lanes);
                lanes
            }
        }
    };
}

float_vector!(2, "float2");
float_vector!(3, "float3");
float_vector!(4, "float4");

/// An argument list: `()` or a tuple of up to four [`ScriptValue`]s
pub trait ScriptArgs: Sized {
    fn type_names() -> Vec<&'static str>;

    fn byte_size() -> usize;

    fn encode_args(&self) -> Vec<u8>;

    /// Decode from a buffer of exactly `byte_size()` bytes
    fn decode_args(bytes: &[u8]) -> Self;
}

impl ScriptArgs for () {
    fn type_names() -> Vec<&'static str> {
        Vec::new()
    }

    fn byte_size() -> usize {
        0
    }

    fn encode_args(&self) -> Vec<u8> {
        Vec::new()
    }

    fn decode_args(_bytes: &[u8]) -> Self {}
}

macro_rules! tuple_args {
    ($($name:ident $var:ident $idx:tt),+) => {
        impl<$($name: ScriptValue),+> ScriptArgs for ($($name,)+) {
            fn type_names() -> Vec<&'static str> {
                vec![$($name::TYPE_NAME),+]
            }

            fn byte_size() -> usize {
                0 $(+ $name::BYTE_SIZE)+
            }

            fn encode_args(&self) -> Vec<u8> {
                let mut out = vec![0u8; Self::byte_size()];
                let mut offset = 0;
                $(
                    self.$idx.encode(&mut out[offset..offset + $name::BYTE_SIZE]);
                    offset += $name::BYTE_SIZE;
                )+
                debug_assert_eq!(offset, out.len());
                out
            }

            fn decode_args(bytes: &[u8]) -> Self {
                let mut offset = 0;
                $(
                    let $var = $name::decode(&bytes[offset..offset + $name::BYTE_SIZE]);
                    offset += $name::BYTE_SIZE;
                )+
                debug_assert_eq!(offset, bytes.len());
                ($($var,)+)
            }
        }
    };
}

tuple_args!(A a 0);
tuple_args!(A a 0, B b 1);
tuple_args!(A a 0, B b 1, C c 2);
tuple_args!(A a 0, B b 1, C c 2, D d 3);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_layout_is_little_endian() {
        let mut buf = [0u8; 4];
        0x01020304i32.encode(&mut buf);
        assert_eq!(buf, [4, 3, 2, 1]);
        true.encode(&mut buf);
        assert_eq!(buf, [1, 0, 0, 0]);
    }

    #[test]
    fn test_mixed_tuple_offsets() {
        let args = ([1.0f32, 2.0, 3.0], 7i32, false);
        let bytes = args.encode_args();
        assert_eq!(bytes.len(), 20);
        assert_eq!(f32::decode(&bytes[8..12]), 3.0);
        assert_eq!(i32::decode(&bytes[12..16]), 7);
        assert_eq!(<([f32; 3], i32, bool)>::decode_args(&bytes), args);
        assert_eq!(
            <([f32; 3], i32, bool)>::type_names(),
            vec!["float3", "int", "bool"]
        );
    }

    #[test]
    fn test_unit_args() {
        assert_eq!(<()>::byte_size(), 0);
        assert!(().encode_args().is_empty());
        assert_eq!(<() as ScriptValue>::TYPE_NAME, "void");
    }
}
