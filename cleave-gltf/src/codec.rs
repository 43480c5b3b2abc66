//! Accessor codec - fixed binary record layouts for typed buffer data.
//!
//! Maps an accessor's `type`/`componentType` pair to a per-element byte
//! layout and packs/unpacks sequences of numeric tuples. Values are carried
//! as `f64`, which embeds every supported scalar domain exactly (integers up
//! to u32 and finite f32), so integer and float payloads round-trip
//! bit-exactly. Normalized integer attributes are passed through as raw
//! integers; interpreting them is the caller's concern.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Scalar encoding selected by an accessor's `componentType` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// 5120 - signed 8-bit integer.
    Byte,
    /// 5121 - unsigned 8-bit integer.
    UnsignedByte,
    /// 5122 - signed 16-bit integer.
    Short,
    /// 5123 - unsigned 16-bit integer.
    UnsignedShort,
    /// 5125 - unsigned 32-bit integer.
    UnsignedInt,
    /// 5126 - 32-bit IEEE float.
    Float,
}

impl ComponentType {
    /// Resolve a `componentType` code from the fixed table.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            5120 => Ok(Self::Byte),
            5121 => Ok(Self::UnsignedByte),
            5122 => Ok(Self::Short),
            5123 => Ok(Self::UnsignedShort),
            5125 => Ok(Self::UnsignedInt),
            5126 => Ok(Self::Float),
            _ => Err(Error::UnsupportedComponentType { code }),
        }
    }

    /// The wire code for this component type.
    pub fn code(self) -> u32 {
        match self {
            Self::Byte => 5120,
            Self::UnsignedByte => 5121,
            Self::Short => 5122,
            Self::UnsignedShort => 5123,
            Self::UnsignedInt => 5125,
            Self::Float => 5126,
        }
    }

    /// Bytes per scalar component.
    pub fn byte_size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }

    fn read(self, bytes: &[u8]) -> f64 {
        match self {
            Self::Byte => f64::from(bytes[0] as i8),
            Self::UnsignedByte => f64::from(bytes[0]),
            Self::Short => f64::from(LittleEndian::read_i16(bytes)),
            Self::UnsignedShort => f64::from(LittleEndian::read_u16(bytes)),
            Self::UnsignedInt => f64::from(LittleEndian::read_u32(bytes)),
            Self::Float => f64::from(LittleEndian::read_f32(bytes)),
        }
    }

    fn write(self, value: f64, out: &mut Vec<u8>) {
        match self {
            Self::Byte => out.push((value as i8) as u8),
            Self::UnsignedByte => out.push(value as u8),
            Self::Short => out.extend_from_slice(&(value as i16).to_le_bytes()),
            Self::UnsignedShort => out.extend_from_slice(&(value as u16).to_le_bytes()),
            Self::UnsignedInt => out.extend_from_slice(&(value as u32).to_le_bytes()),
            Self::Float => out.extend_from_slice(&(value as f32).to_le_bytes()),
        }
    }
}

/// Element shape selected by an accessor's `type` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    /// Resolve a `type` string from the fixed table.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "SCALAR" => Ok(Self::Scalar),
            "VEC2" => Ok(Self::Vec2),
            "VEC3" => Ok(Self::Vec3),
            "VEC4" => Ok(Self::Vec4),
            "MAT2" => Ok(Self::Mat2),
            "MAT3" => Ok(Self::Mat3),
            "MAT4" => Ok(Self::Mat4),
            _ => Err(Error::UnsupportedElementType {
                name: name.to_string(),
            }),
        }
    }

    /// Scalar components per element.
    pub fn component_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

/// Fixed per-element record layout for one accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub element: ElementType,
    pub component: ComponentType,
}

impl Layout {
    /// Build a layout from raw accessor fields.
    pub fn new(element_type: &str, component_code: u32) -> Result<Self> {
        Ok(Self {
            element: ElementType::parse(element_type)?,
            component: ComponentType::from_code(component_code)?,
        })
    }

    /// Fixed byte size of one element.
    pub fn element_size(self) -> usize {
        self.element.component_count() * self.component.byte_size()
    }

    /// Decode a byte slice into one numeric tuple per element.
    pub fn unpack(self, bytes: &[u8]) -> Result<Vec<Vec<f64>>> {
        let size = self.element_size();
        let width = self.component.byte_size();
        let mut chunks = bytes.chunks_exact(size);
        let elements = chunks
            .by_ref()
            .map(|element| {
                element
                    .chunks_exact(width)
                    .map(|scalar| self.component.read(scalar))
                    .collect()
            })
            .collect();
        if !chunks.remainder().is_empty() {
            return Err(Error::ByteRangeOutOfBounds {
                entity: "accessor element",
                offset: bytes.len() - chunks.remainder().len(),
                len: size,
                available: bytes.len(),
            });
        }
        Ok(elements)
    }

    /// Append the little-endian encoding of `elements` to `out`.
    pub fn pack(self, elements: &[Vec<f64>], out: &mut Vec<u8>) {
        for element in elements {
            for &value in element {
                self.component.write(value, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_codes() {
        for code in [5120, 5121, 5122, 5123, 5125, 5126] {
            assert_eq!(ComponentType::from_code(code).unwrap().code(), code);
        }
        assert!(matches!(
            ComponentType::from_code(5124),
            Err(Error::UnsupportedComponentType { code: 5124 })
        ));
    }

    #[test]
    fn test_element_sizes() {
        let vec3f = Layout::new("VEC3", 5126).unwrap();
        assert_eq!(vec3f.element_size(), 12);
        let scalar_u16 = Layout::new("SCALAR", 5123).unwrap();
        assert_eq!(scalar_u16.element_size(), 2);
        let mat4f = Layout::new("MAT4", 5126).unwrap();
        assert_eq!(mat4f.element_size(), 64);
        assert!(matches!(
            Layout::new("VEC5", 5126),
            Err(Error::UnsupportedElementType { .. })
        ));
    }

    #[test]
    fn test_unpack_scalar_u16() {
        let layout = Layout::new("SCALAR", 5123).unwrap();
        let bytes = [1u8, 0, 2, 0, 0xFF, 0xFF];
        let values = layout.unpack(&bytes).unwrap();
        assert_eq!(values, vec![vec![1.0], vec![2.0], vec![65535.0]]);
    }

    #[test]
    fn test_unpack_rejects_partial_element() {
        let layout = Layout::new("VEC3", 5126).unwrap();
        assert!(layout.unpack(&[0u8; 13]).is_err());
    }

    #[test]
    fn test_round_trip_all_layouts() {
        let samples = |component: ComponentType| -> Vec<f64> {
            match component {
                ComponentType::Byte => vec![-128.0, -1.0, 0.0, 127.0],
                ComponentType::UnsignedByte => vec![0.0, 1.0, 255.0],
                ComponentType::Short => vec![-32768.0, -7.0, 32767.0],
                ComponentType::UnsignedShort => vec![0.0, 513.0, 65535.0],
                ComponentType::UnsignedInt => vec![0.0, 70000.0, 4294967295.0],
                ComponentType::Float => vec![-1.5, 0.25, 3.14159274101257324],
            }
        };
        for name in ["SCALAR", "VEC2", "VEC3", "VEC4", "MAT2", "MAT3", "MAT4"] {
            for code in [5120, 5121, 5122, 5123, 5125, 5126] {
                let layout = Layout::new(name, code).unwrap();
                let pool = samples(layout.component);
                let elements: Vec<Vec<f64>> = (0..3)
                    .map(|e| {
                        (0..layout.element.component_count())
                            .map(|c| pool[(e + c) % pool.len()])
                            .collect()
                    })
                    .collect();
                let mut bytes = Vec::new();
                layout.pack(&elements, &mut bytes);
                assert_eq!(bytes.len(), 3 * layout.element_size());
                assert_eq!(layout.unpack(&bytes).unwrap(), elements);
            }
        }
    }

    #[test]
    fn test_float_values_are_not_rescaled() {
        // Integer component types used for normalized attributes pass
        // through as raw integers.
        let layout = Layout::new("VEC2", 5121).unwrap();
        let values = layout.unpack(&[0, 255, 128, 64]).unwrap();
        assert_eq!(values, vec![vec![0.0, 255.0], vec![128.0, 64.0]]);
    }
}
