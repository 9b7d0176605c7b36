//! Native parameter types and values.

use std::fmt;

use sb_math::{Mat4, Vec2, Vec3, Vec4};

use super::node::NodeId;

/// Element type of an array parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    Bool,
    Byte,
    Int,
    UInt,
    Float,
    Rgb,
    Rgba,
    Vector,
    Vector2,
    String,
    Matrix,
    Node,
}

/// Declared type of a native parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Bool,
    Byte,
    Int,
    UInt,
    Float,
    Rgb,
    Rgba,
    Vector,
    Vector2,
    String,
    Matrix,
    Node,
    Enum,
    Array(ElemType),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Array(elem) => write!(f, "ARRAY[{:?}]", elem),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Flat storage of an array parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Byte(Vec<u8>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
    Rgb(Vec<Vec3>),
    Rgba(Vec<Vec4>),
    Vector(Vec<Vec3>),
    Vector2(Vec<Vec2>),
    String(Vec<String>),
    Matrix(Vec<Mat4>),
    Node(Vec<Option<NodeId>>),
}

impl ArrayData {
    pub fn elem_type(&self) -> ElemType {
        match self {
            ArrayData::Bool(_) => ElemType::Bool,
            ArrayData::Byte(_) => ElemType::Byte,
            ArrayData::Int(_) => ElemType::Int,
            ArrayData::UInt(_) => ElemType::UInt,
            ArrayData::Float(_) => ElemType::Float,
            ArrayData::Rgb(_) => ElemType::Rgb,
            ArrayData::Rgba(_) => ElemType::Rgba,
            ArrayData::Vector(_) => ElemType::Vector,
            ArrayData::Vector2(_) => ElemType::Vector2,
            ArrayData::String(_) => ElemType::String,
            ArrayData::Matrix(_) => ElemType::Matrix,
            ArrayData::Node(_) => ElemType::Node,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Byte(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::UInt(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Rgb(v) | ArrayData::Vector(v) => v.len(),
            ArrayData::Rgba(v) => v.len(),
            ArrayData::Vector2(v) => v.len(),
            ArrayData::String(v) => v.len(),
            ArrayData::Matrix(v) => v.len(),
            ArrayData::Node(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An array parameter value. `data` holds `keys` motion keys of equal length back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamArray {
    pub data: ArrayData,
    pub keys: usize,
}

impl ParamArray {
    /// A single-key array.
    pub fn new(data: ArrayData) -> Self {
        Self { data, keys: 1 }
    }

    /// A motion array with `keys` keys. `data.len()` must be a multiple of `keys`.
    pub fn with_keys(data: ArrayData, keys: usize) -> Self {
        Self {
            data,
            keys: keys.max(1),
        }
    }

    /// Elements in each key.
    pub fn key_len(&self) -> usize {
        self.data.len() / self.keys
    }

    fn key_range(&self, key: usize) -> Option<std::ops::Range<usize>> {
        let n = self.key_len();
        (key < self.keys).then(|| key * n..(key + 1) * n)
    }

    pub fn bools(&self) -> Option<&[bool]> {
        match &self.data {
            ArrayData::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            ArrayData::Byte(v) => Some(v),
            _ => None,
        }
    }

    pub fn ints(&self) -> Option<&[i32]> {
        match &self.data {
            ArrayData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn uints(&self) -> Option<&[u32]> {
        match &self.data {
            ArrayData::UInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn floats(&self) -> Option<&[f32]> {
        match &self.data {
            ArrayData::Float(v) => Some(v),
            _ => None,
        }
    }

    /// RGB or vector data.
    pub fn vec3s(&self) -> Option<&[Vec3]> {
        match &self.data {
            ArrayData::Rgb(v) | ArrayData::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn vec4s(&self) -> Option<&[Vec4]> {
        match &self.data {
            ArrayData::Rgba(v) => Some(v),
            _ => None,
        }
    }

    pub fn vec2s(&self) -> Option<&[Vec2]> {
        match &self.data {
            ArrayData::Vector2(v) => Some(v),
            _ => None,
        }
    }

    pub fn strings(&self) -> Option<&[String]> {
        match &self.data {
            ArrayData::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn matrices(&self) -> Option<&[Mat4]> {
        match &self.data {
            ArrayData::Matrix(v) => Some(v),
            _ => None,
        }
    }

    pub fn nodes(&self) -> Option<&[Option<NodeId>]> {
        match &self.data {
            ArrayData::Node(v) => Some(v),
            _ => None,
        }
    }

    pub fn floats_at_key(&self, key: usize) -> Option<&[f32]> {
        let range = self.key_range(key)?;
        self.floats().map(|v| &v[range])
    }

    pub fn vec3s_at_key(&self, key: usize) -> Option<&[Vec3]> {
        let range = self.key_range(key)?;
        self.vec3s().map(|v| &v[range])
    }
}

/// A native parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Byte(u8),
    Int(i32),
    UInt(u32),
    Float(f32),
    Rgb(Vec3),
    Rgba(Vec4),
    Vector(Vec3),
    Vector2(Vec2),
    String(String),
    Matrix(Mat4),
    Node(Option<NodeId>),
    Enum(String),
    Array(ParamArray),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Byte(_) => ParamType::Byte,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::UInt(_) => ParamType::UInt,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Rgb(_) => ParamType::Rgb,
            ParamValue::Rgba(_) => ParamType::Rgba,
            ParamValue::Vector(_) => ParamType::Vector,
            ParamValue::Vector2(_) => ParamType::Vector2,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Matrix(_) => ParamType::Matrix,
            ParamValue::Node(_) => ParamType::Node,
            ParamValue::Enum(_) => ParamType::Enum,
            ParamValue::Array(a) => ParamType::Array(a.data.elem_type()),
        }
    }

    pub fn array(data: ArrayData) -> Self {
        ParamValue::Array(ParamArray::new(data))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer-like values widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Byte(v) => Some(*v as i64),
            ParamValue::Int(v) => Some(*v as i64),
            ParamValue::UInt(v) => Some(*v as i64),
            ParamValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f32),
        }
    }

    /// String or enum text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) | ParamValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// RGB or vector value.
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            ParamValue::Rgb(v) | ParamValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            ParamValue::Rgba(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            ParamValue::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    /// A matrix, or the first key of a matrix array.
    pub fn as_matrix(&self) -> Option<Mat4> {
        match self {
            ParamValue::Matrix(m) => Some(*m),
            ParamValue::Array(a) => a.matrices().and_then(|m| m.first().copied()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            ParamValue::Node(id) => *id,
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ParamArray> {
        match self {
            ParamValue::Array(a) => Some(a),
            _ => None,
        }
    }
}
