//! Attribute values and their USDA type names.

use std::fmt;

use sb_math::{Mat4, Mat4Ext, Quat, Vec2, Vec3, Vec4};

/// Storage class of a value, independent of its role (`color3f` and `point3f` are both
/// [`ValueType::Float3`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    UChar,
    Int,
    UInt,
    Int64,
    Float,
    Double,
    String,
    Token,
    Asset,
    Float2,
    Float3,
    Float4,
    Quat,
    Matrix4,
}

/// Scalar USDA type names and the storage they map to. Halves and doubles are stored in
/// `f32`/`f64` slots respectively; vector doubles share the `f32` vector storage.
const TYPE_TABLE: &[(&str, ValueType)] = &[
    ("bool", ValueType::Bool),
    ("uchar", ValueType::UChar),
    ("int", ValueType::Int),
    ("uint", ValueType::UInt),
    ("int64", ValueType::Int64),
    ("half", ValueType::Float),
    ("float", ValueType::Float),
    ("double", ValueType::Double),
    ("timecode", ValueType::Double),
    ("string", ValueType::String),
    ("token", ValueType::Token),
    ("asset", ValueType::Asset),
    ("half2", ValueType::Float2),
    ("float2", ValueType::Float2),
    ("double2", ValueType::Float2),
    ("texCoord2f", ValueType::Float2),
    ("texCoord2h", ValueType::Float2),
    ("texCoord2d", ValueType::Float2),
    ("half3", ValueType::Float3),
    ("float3", ValueType::Float3),
    ("double3", ValueType::Float3),
    ("point3f", ValueType::Float3),
    ("point3d", ValueType::Float3),
    ("point3h", ValueType::Float3),
    ("normal3f", ValueType::Float3),
    ("normal3d", ValueType::Float3),
    ("normal3h", ValueType::Float3),
    ("vector3f", ValueType::Float3),
    ("vector3d", ValueType::Float3),
    ("vector3h", ValueType::Float3),
    ("color3f", ValueType::Float3),
    ("color3d", ValueType::Float3),
    ("color3h", ValueType::Float3),
    ("texCoord3f", ValueType::Float3),
    ("half4", ValueType::Float4),
    ("float4", ValueType::Float4),
    ("double4", ValueType::Float4),
    ("color4f", ValueType::Float4),
    ("color4d", ValueType::Float4),
    ("color4h", ValueType::Float4),
    ("quath", ValueType::Quat),
    ("quatf", ValueType::Quat),
    ("quatd", ValueType::Quat),
    ("matrix4d", ValueType::Matrix4),
];

/// A declared attribute type such as `color3f` or `point3f[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub base: &'static str,
    pub value_type: ValueType,
    pub array: bool,
}

impl TypeName {
    pub const fn scalar(base: &'static str, value_type: ValueType) -> Self {
        Self {
            base,
            value_type,
            array: false,
        }
    }

    pub const fn array(base: &'static str, value_type: ValueType) -> Self {
        Self {
            base,
            value_type,
            array: true,
        }
    }

    /// Parse a USDA type name, with an optional `[]` suffix.
    pub fn parse(text: &str) -> Option<Self> {
        let (base, array) = match text.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (text, false),
        };
        TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == base)
            .map(|&(name, value_type)| Self {
                base: name,
                value_type,
                array,
            })
    }

    pub fn as_array(self) -> Self {
        Self { array: true, ..self }
    }

    pub fn element(self) -> Self {
        Self { array: false, ..self }
    }

    /// True for types whose values interpolate between time samples.
    pub fn is_interpolable(&self) -> bool {
        matches!(
            self.value_type,
            ValueType::Float
                | ValueType::Double
                | ValueType::Float2
                | ValueType::Float3
                | ValueType::Float4
                | ValueType::Quat
                | ValueType::Matrix4
        )
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{}[]", self.base)
        } else {
            f.write_str(self.base)
        }
    }
}

/// Commonly authored type names.
pub mod types {
    use super::{TypeName, ValueType};

    pub const BOOL: TypeName = TypeName::scalar("bool", ValueType::Bool);
    pub const UCHAR: TypeName = TypeName::scalar("uchar", ValueType::UChar);
    pub const INT: TypeName = TypeName::scalar("int", ValueType::Int);
    pub const UINT: TypeName = TypeName::scalar("uint", ValueType::UInt);
    pub const FLOAT: TypeName = TypeName::scalar("float", ValueType::Float);
    pub const DOUBLE: TypeName = TypeName::scalar("double", ValueType::Double);
    pub const STRING: TypeName = TypeName::scalar("string", ValueType::String);
    pub const TOKEN: TypeName = TypeName::scalar("token", ValueType::Token);
    pub const ASSET: TypeName = TypeName::scalar("asset", ValueType::Asset);
    pub const FLOAT2: TypeName = TypeName::scalar("float2", ValueType::Float2);
    pub const FLOAT3: TypeName = TypeName::scalar("float3", ValueType::Float3);
    pub const DOUBLE3: TypeName = TypeName::scalar("double3", ValueType::Float3);
    pub const VECTOR3F: TypeName = TypeName::scalar("vector3f", ValueType::Float3);
    pub const COLOR3F: TypeName = TypeName::scalar("color3f", ValueType::Float3);
    pub const COLOR4F: TypeName = TypeName::scalar("color4f", ValueType::Float4);
    pub const QUATF: TypeName = TypeName::scalar("quatf", ValueType::Quat);
    pub const MATRIX4D: TypeName = TypeName::scalar("matrix4d", ValueType::Matrix4);

    pub const BOOL_ARRAY: TypeName = TypeName::array("bool", ValueType::Bool);
    pub const UCHAR_ARRAY: TypeName = TypeName::array("uchar", ValueType::UChar);
    pub const INT_ARRAY: TypeName = TypeName::array("int", ValueType::Int);
    pub const UINT_ARRAY: TypeName = TypeName::array("uint", ValueType::UInt);
    pub const FLOAT_ARRAY: TypeName = TypeName::array("float", ValueType::Float);
    pub const STRING_ARRAY: TypeName = TypeName::array("string", ValueType::String);
    pub const TOKEN_ARRAY: TypeName = TypeName::array("token", ValueType::Token);
    pub const FLOAT2_ARRAY: TypeName = TypeName::array("float2", ValueType::Float2);
    pub const FLOAT3_ARRAY: TypeName = TypeName::array("float3", ValueType::Float3);
    pub const POINT3F_ARRAY: TypeName = TypeName::array("point3f", ValueType::Float3);
    pub const NORMAL3F_ARRAY: TypeName = TypeName::array("normal3f", ValueType::Float3);
    pub const VECTOR3F_ARRAY: TypeName = TypeName::array("vector3f", ValueType::Float3);
    pub const COLOR3F_ARRAY: TypeName = TypeName::array("color3f", ValueType::Float3);
    pub const COLOR4F_ARRAY: TypeName = TypeName::array("color4f", ValueType::Float4);
    pub const TEXCOORD2F_ARRAY: TypeName = TypeName::array("texCoord2f", ValueType::Float2);
    pub const QUATH_ARRAY: TypeName = TypeName::array("quath", ValueType::Quat);
    pub const MATRIX4D_ARRAY: TypeName = TypeName::array("matrix4d", ValueType::Matrix4);
}

/// A resolved attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    UChar(u8),
    Int(i32),
    UInt(u32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    Token(String),
    Asset(String),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Quat(Quat),
    Matrix4(Mat4),
    BoolArray(Vec<bool>),
    UCharArray(Vec<u8>),
    IntArray(Vec<i32>),
    UIntArray(Vec<u32>),
    Int64Array(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    TokenArray(Vec<String>),
    AssetArray(Vec<String>),
    Float2Array(Vec<Vec2>),
    Float3Array(Vec<Vec3>),
    Float4Array(Vec<Vec4>),
    QuatArray(Vec<Quat>),
    Matrix4Array(Vec<Mat4>),
}

impl Value {
    pub fn token(text: impl Into<String>) -> Self {
        Value::Token(text.into())
    }

    /// Element count for array values, `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        Some(match self {
            Value::BoolArray(v) => v.len(),
            Value::UCharArray(v) => v.len(),
            Value::IntArray(v) => v.len(),
            Value::UIntArray(v) => v.len(),
            Value::Int64Array(v) => v.len(),
            Value::FloatArray(v) => v.len(),
            Value::DoubleArray(v) => v.len(),
            Value::StringArray(v) | Value::TokenArray(v) | Value::AssetArray(v) => v.len(),
            Value::Float2Array(v) => v.len(),
            Value::Float3Array(v) => v.len(),
            Value::Float4Array(v) => v.len(),
            Value::QuatArray(v) => v.len(),
            Value::Matrix4Array(v) => v.len(),
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => self.as_i64().map(|v| v != 0),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::UChar(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::UInt(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    /// Text of a string, token or asset value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Token(s) | Value::Asset(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Value::Float2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Float3(v) => Some(*v),
            Value::Float4(v) => Some(v.truncate()),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Value::Float4(v) => Some(*v),
            Value::Float3(v) => Some(v.extend(1.0)),
            _ => None,
        }
    }

    pub fn as_quat(&self) -> Option<Quat> {
        match self {
            Value::Quat(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            Value::Matrix4(m) => Some(*m),
            _ => None,
        }
    }

    /// Integer arrays of any width, narrowed to `i32`.
    pub fn to_ints(&self) -> Option<Vec<i32>> {
        match self {
            Value::IntArray(v) => Some(v.clone()),
            Value::UIntArray(v) => Some(v.iter().map(|&x| x as i32).collect()),
            Value::Int64Array(v) => Some(v.iter().map(|&x| x as i32).collect()),
            Value::UCharArray(v) => Some(v.iter().map(|&x| x as i32).collect()),
            _ => None,
        }
    }

    /// Float, double or integer arrays as `f32`.
    pub fn to_floats(&self) -> Option<Vec<f32>> {
        match self {
            Value::FloatArray(v) => Some(v.clone()),
            Value::DoubleArray(v) => Some(v.iter().map(|&x| x as f32).collect()),
            _ => self
                .to_ints()
                .map(|v| v.into_iter().map(|x| x as f32).collect()),
        }
    }

    pub fn as_vec2_array(&self) -> Option<&[Vec2]> {
        match self {
            Value::Float2Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec3_array(&self) -> Option<&[Vec3]> {
        match self {
            Value::Float3Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec4_array(&self) -> Option<&[Vec4]> {
        match self {
            Value::Float4Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_quat_array(&self) -> Option<&[Quat]> {
        match self {
            Value::QuatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mat4_array(&self) -> Option<&[Mat4]> {
        match self {
            Value::Matrix4Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_array(&self) -> Option<&[String]> {
        match self {
            Value::StringArray(v) | Value::TokenArray(v) | Value::AssetArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool_array(&self) -> Option<&[bool]> {
        match self {
            Value::BoolArray(v) => Some(v),
            _ => None,
        }
    }

    /// Linear interpolation towards `other` at `t` in `[0, 1]`.
    ///
    /// Returns `None` for non-interpolable values, mismatched variants, or arrays of
    /// different lengths; callers then hold the earlier sample.
    pub fn lerp(&self, other: &Value, t: f64) -> Option<Value> {
        let tf = t as f32;
        let mix = |a: f32, b: f32| a + (b - a) * tf;
        Some(match (self, other) {
            (Value::Float(a), Value::Float(b)) => Value::Float(mix(*a, *b)),
            (Value::Double(a), Value::Double(b)) => Value::Double(a + (b - a) * t),
            (Value::Float2(a), Value::Float2(b)) => Value::Float2(a.lerp(*b, tf)),
            (Value::Float3(a), Value::Float3(b)) => Value::Float3(a.lerp(*b, tf)),
            (Value::Float4(a), Value::Float4(b)) => Value::Float4(a.lerp(*b, tf)),
            (Value::Quat(a), Value::Quat(b)) => Value::Quat(a.slerp(*b, tf)),
            (Value::Matrix4(a), Value::Matrix4(b)) => Value::Matrix4(lerp_mat4(a, b, tf)),
            (Value::FloatArray(a), Value::FloatArray(b)) if a.len() == b.len() => {
                Value::FloatArray(a.iter().zip(b).map(|(x, y)| mix(*x, *y)).collect())
            }
            (Value::DoubleArray(a), Value::DoubleArray(b)) if a.len() == b.len() => {
                Value::DoubleArray(a.iter().zip(b).map(|(x, y)| x + (y - x) * t).collect())
            }
            (Value::Float2Array(a), Value::Float2Array(b)) if a.len() == b.len() => {
                Value::Float2Array(a.iter().zip(b).map(|(x, y)| x.lerp(*y, tf)).collect())
            }
            (Value::Float3Array(a), Value::Float3Array(b)) if a.len() == b.len() => {
                Value::Float3Array(a.iter().zip(b).map(|(x, y)| x.lerp(*y, tf)).collect())
            }
            (Value::Float4Array(a), Value::Float4Array(b)) if a.len() == b.len() => {
                Value::Float4Array(a.iter().zip(b).map(|(x, y)| x.lerp(*y, tf)).collect())
            }
            (Value::QuatArray(a), Value::QuatArray(b)) if a.len() == b.len() => {
                Value::QuatArray(a.iter().zip(b).map(|(x, y)| x.slerp(*y, tf)).collect())
            }
            (Value::Matrix4Array(a), Value::Matrix4Array(b)) if a.len() == b.len() => {
                Value::Matrix4Array(a.iter().zip(b).map(|(x, y)| lerp_mat4(x, y, tf)).collect())
            }
            _ => return None,
        })
    }

    /// USDA literal text for this value.
    pub fn to_usda(&self) -> String {
        let mut out = String::new();
        self.write_usda(&mut out);
        out
    }

    fn write_usda(&self, out: &mut String) {
        fn list<T>(out: &mut String, items: &[T], mut each: impl FnMut(&mut String, &T)) {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                each(out, item);
            }
            out.push(']');
        }

        match self {
            Value::Bool(b) => out.push_str(if *b { "1" } else { "0" }),
            Value::UChar(v) => out.push_str(&v.to_string()),
            Value::Int(v) => out.push_str(&v.to_string()),
            Value::UInt(v) => out.push_str(&v.to_string()),
            Value::Int64(v) => out.push_str(&v.to_string()),
            Value::Float(v) => push_f32(out, *v),
            Value::Double(v) => push_f64(out, *v),
            Value::String(s) | Value::Token(s) => push_quoted(out, s),
            Value::Asset(s) => {
                out.push('@');
                out.push_str(s);
                out.push('@');
            }
            Value::Float2(v) => push_tuple(out, &v.to_array()),
            Value::Float3(v) => push_tuple(out, &v.to_array()),
            Value::Float4(v) => push_tuple(out, &v.to_array()),
            Value::Quat(q) => push_tuple(out, &[q.w, q.x, q.y, q.z]),
            Value::Matrix4(m) => push_matrix(out, m),
            Value::BoolArray(v) => list(out, v, |o, b| o.push_str(if *b { "1" } else { "0" })),
            Value::UCharArray(v) => list(out, v, |o, x| o.push_str(&x.to_string())),
            Value::IntArray(v) => list(out, v, |o, x| o.push_str(&x.to_string())),
            Value::UIntArray(v) => list(out, v, |o, x| o.push_str(&x.to_string())),
            Value::Int64Array(v) => list(out, v, |o, x| o.push_str(&x.to_string())),
            Value::FloatArray(v) => list(out, v, |o, x| push_f32(o, *x)),
            Value::DoubleArray(v) => list(out, v, |o, x| push_f64(o, *x)),
            Value::StringArray(v) | Value::TokenArray(v) => list(out, v, |o, s| push_quoted(o, s)),
            Value::AssetArray(v) => list(out, v, |o, s| {
                o.push('@');
                o.push_str(s);
                o.push('@');
            }),
            Value::Float2Array(v) => list(out, v, |o, x| push_tuple(o, &x.to_array())),
            Value::Float3Array(v) => list(out, v, |o, x| push_tuple(o, &x.to_array())),
            Value::Float4Array(v) => list(out, v, |o, x| push_tuple(o, &x.to_array())),
            Value::QuatArray(v) => list(out, v, |o, q| push_tuple(o, &[q.w, q.x, q.y, q.z])),
            Value::Matrix4Array(v) => list(out, v, push_matrix),
        }
    }
}

fn lerp_mat4(a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
    let (a, b) = (a.to_cols_array(), b.to_cols_array());
    Mat4::from_cols_array(&std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t))
}

fn push_f32(out: &mut String, v: f32) {
    if v.is_nan() {
        out.push_str("nan");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "inf" } else { "-inf" });
    } else {
        out.push_str(&v.to_string());
    }
}

fn push_f64(out: &mut String, v: f64) {
    if v.is_nan() {
        out.push_str("nan");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "inf" } else { "-inf" });
    } else {
        out.push_str(&v.to_string());
    }
}

fn push_tuple(out: &mut String, values: &[f32]) {
    out.push('(');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        push_f32(out, *v);
    }
    out.push(')');
}

fn push_matrix(out: &mut String, m: &Mat4) {
    let rows = m.to_row_major();
    out.push_str("( ");
    for (r, row) in rows.chunks(4).enumerate() {
        if r > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for (i, v) in row.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            push_f64(out, *v);
        }
        out.push(')');
    }
    out.push_str(" )");
}

/// Quote and escape a string literal.
pub(crate) fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_parse() {
        let ty = TypeName::parse("point3f[]").unwrap();
        assert_eq!(ty.value_type, ValueType::Float3);
        assert!(ty.array);
        assert_eq!(ty.to_string(), "point3f[]");

        assert_eq!(TypeName::parse("half").unwrap().value_type, ValueType::Float);
        assert!(TypeName::parse("dictionary").is_none());
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Double(2.5).as_f32(), Some(2.5));
        assert_eq!(Value::Int(0).as_bool(), Some(false));
        assert_eq!(Value::UIntArray(vec![1, 2]).to_ints(), Some(vec![1, 2]));
        assert_eq!(Value::DoubleArray(vec![0.5]).to_floats(), Some(vec![0.5]));
        assert!(Value::Token("a".into()).as_f64().is_none());
    }

    #[test]
    fn test_lerp() {
        let a = Value::Float3(Vec3::ZERO);
        let b = Value::Float3(Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.lerp(&b, 0.5), Some(Value::Float3(Vec3::new(1.0, 2.0, 3.0))));

        // Mismatched array lengths do not interpolate.
        let a = Value::FloatArray(vec![0.0, 1.0]);
        let b = Value::FloatArray(vec![1.0]);
        assert!(a.lerp(&b, 0.5).is_none());

        assert!(Value::Int(1).lerp(&Value::Int(3), 0.5).is_none());
    }

    #[test]
    fn test_to_usda_literals() {
        assert_eq!(Value::Float(1.0).to_usda(), "1");
        assert_eq!(Value::Float3(Vec3::new(0.5, 1.0, -2.0)).to_usda(), "(0.5, 1, -2)");
        assert_eq!(Value::IntArray(vec![4, 4]).to_usda(), "[4, 4]");
        assert_eq!(Value::Token("catmullClark".into()).to_usda(), "\"catmullClark\"");
        assert_eq!(Value::Asset("tex.exr".into()).to_usda(), "@tex.exr@");
        assert_eq!(Value::String("a\"b".into()).to_usda(), "\"a\\\"b\"");
        assert_eq!(Value::Quat(Quat::IDENTITY).to_usda(), "(1, 0, 0, 0)");
        assert_eq!(Value::Float(f32::INFINITY).to_usda(), "inf");
    }

    #[test]
    fn test_matrix_literal_is_row_major() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            Value::Matrix4(m).to_usda(),
            "( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (1, 2, 3, 1) )"
        );
    }
}
