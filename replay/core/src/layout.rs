//! Target memory layout descriptions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataTypeLayout {
    pub size: u64,
    pub alignment: u64,
}

impl DataTypeLayout {
    pub const fn new(size: u64, alignment: u64) -> Self {
        Self { size, alignment }
    }

    const fn natural(size: u64) -> Self {
        Self::new(size, size)
    }
}

/// Size, alignment and byte order of every primitive on a target.
///
/// `pointer`, `integer`, `size` and `char` describe the target's `void*`,
/// `int`, `size_t` and `char`; the fixed width kinds follow their ABI
/// alignment, which is not always their size (`i64` on 32-bit x86).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub endian: Endian,
    pub pointer: DataTypeLayout,
    pub integer: DataTypeLayout,
    pub size: DataTypeLayout,
    pub char: DataTypeLayout,
    pub i8: DataTypeLayout,
    pub i16: DataTypeLayout,
    pub i32: DataTypeLayout,
    pub i64: DataTypeLayout,
    pub f16: DataTypeLayout,
    pub f32: DataTypeLayout,
    pub f64: DataTypeLayout,
}

impl MemoryLayout {
    const fn base32() -> Self {
        Self {
            endian: Endian::Little,
            pointer: DataTypeLayout::natural(4),
            integer: DataTypeLayout::natural(4),
            size: DataTypeLayout::natural(4),
            char: DataTypeLayout::natural(1),
            i8: DataTypeLayout::natural(1),
            i16: DataTypeLayout::natural(2),
            i32: DataTypeLayout::natural(4),
            i64: DataTypeLayout::natural(8),
            f16: DataTypeLayout::natural(2),
            f32: DataTypeLayout::natural(4),
            f64: DataTypeLayout::natural(8),
        }
    }

    const fn base64() -> Self {
        Self {
            pointer: DataTypeLayout::natural(8),
            size: DataTypeLayout::natural(8),
            ..Self::base32()
        }
    }

    /// 32-bit x86 (System V i386).
    pub const fn x86() -> Self {
        Self {
            i64: DataTypeLayout::new(8, 4),
            f64: DataTypeLayout::new(8, 4),
            ..Self::base32()
        }
    }

    pub const fn x86_64() -> Self {
        Self::base64()
    }

    pub const fn armv7a() -> Self {
        Self::base32()
    }

    pub const fn arm64() -> Self {
        Self::base64()
    }

    /// Looks up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "x86" | "i386" => Some(Self::x86()),
            "x86_64" | "x86-64" | "amd64" => Some(Self::x86_64()),
            "armv7a" | "arm" => Some(Self::armv7a()),
            "arm64" | "aarch64" => Some(Self::arm64()),
            _ => None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[inline]
    pub fn is_little_endian(&self) -> bool {
        self.endian == Endian::Little
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::x86_64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_differ_where_abi_does() {
        assert_eq!(MemoryLayout::x86().i64.alignment, 4);
        assert_eq!(MemoryLayout::armv7a().i64.alignment, 8);
        assert_eq!(MemoryLayout::arm64().pointer.size, 8);
        assert_eq!(MemoryLayout::preset("aarch64"), Some(MemoryLayout::arm64()));
        assert_eq!(MemoryLayout::preset("mips"), None);
    }

    #[test]
    fn test_json_config() {
        let text = serde_json::to_string(&MemoryLayout::x86()).unwrap();
        assert!(text.contains("\"little\""));
        assert_eq!(MemoryLayout::from_json(&text).unwrap(), MemoryLayout::x86());
    }
}
