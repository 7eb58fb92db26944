//! Core data types for measurement stacks

use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Element types supported by stack arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Boolean flag, one byte per element
    Bool = 0,
    /// Signed 16-bit integer
    I16 = 1,
    /// Signed 32-bit integer
    I32 = 2,
    /// Signed 64-bit integer
    I64 = 3,
    /// 32-bit floating point
    F32 = 4,
    /// 64-bit floating point
    F64 = 5,
    /// UTF-8 string
    Text = 6,
}

/// Aliases accepted for element types in metadata and user input
static DATA_TYPE_ALIASES: &[(&str, DataType)] = &[
    ("bool", DataType::Bool),
    ("byte", DataType::Bool),
    ("flag", DataType::Bool),
    ("int", DataType::I16),
    ("int16", DataType::I16),
    ("short", DataType::I16),
    ("int32", DataType::I32),
    ("int64", DataType::I64),
    ("long", DataType::I64),
    ("float", DataType::F32),
    ("float32", DataType::F32),
    ("float_", DataType::F64),
    ("float64", DataType::F64),
    ("str", DataType::Text),
    ("string", DataType::Text),
];

impl DataType {
    /// Size in bytes of one element, `None` for variable-width strings
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            DataType::Bool => Some(1),
            DataType::I16 => Some(2),
            DataType::I32 | DataType::F32 => Some(4),
            DataType::I64 | DataType::F64 => Some(8),
            DataType::Text => None,
        }
    }

    /// Look up an element type by one of its aliases
    pub fn from_alias(alias: &str) -> Option<Self> {
        DATA_TYPE_ALIASES
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, dtype)| *dtype)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
            DataType::Text => "string",
        };
        f.write_str(name)
    }
}

/// Scalar attribute value stored at the container root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Interpret the value as a float, parsing text values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Bool(_) => None,
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Interpret the value as an integer, parsing text values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Bool(_) => None,
            AttrValue::Int(v) => Some(*v),
            AttrValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            AttrValue::Float(_) => None,
            AttrValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Borrow the value as text if it is stored as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Spatial bounding box `(x0, y0, x1, y1)` with half-open end coordinates.
///
/// `x` runs along columns (width), `y` along rows (length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl BoundingBox {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box covering a full raster of the given size
    pub fn full(length: usize, width: usize) -> Self {
        Self::new(0, 0, width, length)
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn length(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn rows(&self) -> Range<usize> {
        self.y0..self.y1
    }

    pub fn cols(&self) -> Range<usize> {
        self.x0..self.x1
    }

    /// Validate the box against a raster extent of `length` rows by `width` columns
    pub fn check_within(&self, length: usize, width: usize) -> Result<()> {
        if self.x0 >= self.x1 || self.y0 >= self.y1 {
            return Err(StackError::OutOfBounds(format!(
                "box {} is empty or reversed",
                self
            )));
        }
        if self.x1 > width || self.y1 > length {
            return Err(StackError::OutOfBounds(format!(
                "box {} exceeds raster extent {} x {}",
                self, length, width
            )));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.x0, self.y0, self.x1, self.y1)
    }
}

impl From<(usize, usize, usize, usize)> for BoundingBox {
    fn from((x0, y0, x1, y1): (usize, usize, usize, usize)) -> Self {
        Self::new(x0, y0, x1, y1)
    }
}
