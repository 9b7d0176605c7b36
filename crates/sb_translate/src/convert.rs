//! Conversions between stage values and native parameter values.

use sb_core::native::{ArrayData, ElemType, ParamArray, ParamType, ParamValue};
use sb_core::usd::{types, TypeName, Value, ValueType};
use sb_math::Vec3;

/// Coerce a stage value to a native parameter of type `ty`.
///
/// Scalars are accepted for array parameters as one-element arrays. Node parameters are
/// never converted from values; they come from relationships.
pub fn to_param(value: &Value, ty: ParamType) -> Option<ParamValue> {
    Some(match ty {
        ParamType::Bool => ParamValue::Bool(value.as_bool()?),
        ParamType::Byte => ParamValue::Byte(value.as_i64()?.clamp(0, 255) as u8),
        ParamType::Int => ParamValue::Int(value.as_i64()? as i32),
        ParamType::UInt => ParamValue::UInt(value.as_i64()?.max(0) as u32),
        ParamType::Float => ParamValue::Float(value.as_f32()?),
        ParamType::Rgb => ParamValue::Rgb(value.as_vec3()?),
        ParamType::Rgba => ParamValue::Rgba(value.as_vec4()?),
        ParamType::Vector => ParamValue::Vector(value.as_vec3()?),
        ParamType::Vector2 => ParamValue::Vector2(value.as_vec2()?),
        ParamType::String => ParamValue::String(value.as_str()?.to_string()),
        ParamType::Enum => ParamValue::Enum(value.as_str()?.to_string()),
        ParamType::Matrix => ParamValue::Matrix(value.as_mat4()?),
        ParamType::Node => return None,
        ParamType::Array(elem) => ParamValue::array(to_array_data(value, elem)?),
    })
}

/// Flatten an array (or scalar) value into native array storage.
pub fn to_array_data(value: &Value, elem: ElemType) -> Option<ArrayData> {
    Some(match elem {
        ElemType::Bool => match value.as_bool_array() {
            Some(v) => ArrayData::Bool(v.to_vec()),
            None => ArrayData::Bool(vec![value.as_bool()?]),
        },
        ElemType::Byte => ArrayData::Byte(
            ints_of(value)?
                .into_iter()
                .map(|v| v.clamp(0, 255) as u8)
                .collect(),
        ),
        ElemType::Int => ArrayData::Int(ints_of(value)?),
        ElemType::UInt => ArrayData::UInt(
            ints_of(value)?
                .into_iter()
                .map(|v| v.max(0) as u32)
                .collect(),
        ),
        ElemType::Float => match value.to_floats() {
            Some(v) => ArrayData::Float(v),
            None => ArrayData::Float(vec![value.as_f32()?]),
        },
        ElemType::Rgb => ArrayData::Rgb(vec3s_of(value)?),
        ElemType::Vector => ArrayData::Vector(vec3s_of(value)?),
        ElemType::Rgba => match (value.as_vec4_array(), value.as_vec3_array()) {
            (Some(v), _) => ArrayData::Rgba(v.to_vec()),
            (None, Some(v)) => ArrayData::Rgba(v.iter().map(|c| c.extend(1.0)).collect()),
            (None, None) => ArrayData::Rgba(vec![value.as_vec4()?]),
        },
        ElemType::Vector2 => match value.as_vec2_array() {
            Some(v) => ArrayData::Vector2(v.to_vec()),
            None => ArrayData::Vector2(vec![value.as_vec2()?]),
        },
        ElemType::String => match value.as_str_array() {
            Some(v) => ArrayData::String(v.to_vec()),
            None => ArrayData::String(vec![value.as_str()?.to_string()]),
        },
        ElemType::Matrix => match value.as_mat4_array() {
            Some(v) => ArrayData::Matrix(v.to_vec()),
            None => ArrayData::Matrix(vec![value.as_mat4()?]),
        },
        ElemType::Node => return None,
    })
}

fn ints_of(value: &Value) -> Option<Vec<i32>> {
    match value.to_ints() {
        Some(v) => Some(v),
        None => Some(vec![value.as_i64()? as i32]),
    }
}

fn vec3s_of(value: &Value) -> Option<Vec<Vec3>> {
    match (value.as_vec3_array(), value.as_vec4_array()) {
        (Some(v), _) => Some(v.to_vec()),
        (None, Some(v)) => Some(v.iter().map(|c| c.truncate()).collect()),
        (None, None) => Some(vec![value.as_vec3()?]),
    }
}

/// Build a motion array from one value per key. Keys whose length differs from the first
/// are dropped, leaving a single key.
pub fn to_motion_array(values: &[Value], elem: ElemType) -> Option<ParamArray> {
    let first = to_array_data(values.first()?, elem)?;
    let key_len = first.len();
    let mut keys = vec![first];
    for value in &values[1..] {
        match to_array_data(value, elem) {
            Some(data) if data.len() == key_len => keys.push(data),
            _ => {
                log::debug!("Motion key length mismatch, keeping the first key only");
                keys.truncate(1);
                break;
            }
        }
    }
    let count = keys.len();
    let mut iter = keys.into_iter();
    let mut data = iter.next()?;
    for key in iter {
        append(&mut data, key);
    }
    Some(ParamArray::with_keys(data, count))
}

fn append(into: &mut ArrayData, from: ArrayData) {
    match (into, from) {
        (ArrayData::Bool(a), ArrayData::Bool(b)) => a.extend(b),
        (ArrayData::Byte(a), ArrayData::Byte(b)) => a.extend(b),
        (ArrayData::Int(a), ArrayData::Int(b)) => a.extend(b),
        (ArrayData::UInt(a), ArrayData::UInt(b)) => a.extend(b),
        (ArrayData::Float(a), ArrayData::Float(b)) => a.extend(b),
        (ArrayData::Rgb(a), ArrayData::Rgb(b)) | (ArrayData::Vector(a), ArrayData::Vector(b)) => {
            a.extend(b)
        }
        (ArrayData::Rgba(a), ArrayData::Rgba(b)) => a.extend(b),
        (ArrayData::Vector2(a), ArrayData::Vector2(b)) => a.extend(b),
        (ArrayData::String(a), ArrayData::String(b)) => a.extend(b),
        (ArrayData::Matrix(a), ArrayData::Matrix(b)) => a.extend(b),
        (ArrayData::Node(a), ArrayData::Node(b)) => a.extend(b),
        _ => {}
    }
}

/// Natural parameter type for an arbitrary stage value; colors keep their role.
pub fn user_param_of(value: &Value, type_name: TypeName) -> Option<ParamValue> {
    let color = type_name.base.starts_with("color");
    let elem = match type_name.value_type {
        ValueType::Bool => ElemType::Bool,
        ValueType::UChar => ElemType::Byte,
        ValueType::Int | ValueType::Int64 => ElemType::Int,
        ValueType::UInt => ElemType::UInt,
        ValueType::Float | ValueType::Double => ElemType::Float,
        ValueType::String | ValueType::Token | ValueType::Asset => ElemType::String,
        ValueType::Float2 => ElemType::Vector2,
        ValueType::Float3 if color => ElemType::Rgb,
        ValueType::Float3 => ElemType::Vector,
        ValueType::Float4 => ElemType::Rgba,
        ValueType::Matrix4 => ElemType::Matrix,
        ValueType::Quat => return None,
    };
    if type_name.array {
        return to_param(value, ParamType::Array(elem));
    }
    let ty = match elem {
        ElemType::Bool => ParamType::Bool,
        ElemType::Byte => ParamType::Byte,
        ElemType::Int => ParamType::Int,
        ElemType::UInt => ParamType::UInt,
        ElemType::Float => ParamType::Float,
        ElemType::String => ParamType::String,
        ElemType::Vector2 => ParamType::Vector2,
        ElemType::Rgb => ParamType::Rgb,
        ElemType::Vector => ParamType::Vector,
        ElemType::Rgba => ParamType::Rgba,
        ElemType::Matrix => ParamType::Matrix,
        ElemType::Node => return None,
    };
    to_param(value, ty)
}

/// Stage type and per-key values of a parameter. `None` for node parameters.
pub fn to_values(param: &ParamValue) -> Option<(TypeName, Vec<Value>)> {
    let scalar = |type_name: TypeName, value: Value| Some((type_name, vec![value]));
    match param {
        ParamValue::Bool(v) => scalar(types::BOOL, Value::Bool(*v)),
        ParamValue::Byte(v) => scalar(types::UCHAR, Value::UChar(*v)),
        ParamValue::Int(v) => scalar(types::INT, Value::Int(*v)),
        ParamValue::UInt(v) => scalar(types::UINT, Value::UInt(*v)),
        ParamValue::Float(v) => scalar(types::FLOAT, Value::Float(*v)),
        ParamValue::Rgb(v) => scalar(types::COLOR3F, Value::Float3(*v)),
        ParamValue::Rgba(v) => scalar(types::COLOR4F, Value::Float4(*v)),
        ParamValue::Vector(v) => scalar(types::VECTOR3F, Value::Float3(*v)),
        ParamValue::Vector2(v) => scalar(types::FLOAT2, Value::Float2(*v)),
        ParamValue::String(v) => scalar(types::STRING, Value::String(v.clone())),
        ParamValue::Enum(v) => scalar(types::TOKEN, Value::Token(v.clone())),
        ParamValue::Matrix(v) => scalar(types::MATRIX4D, Value::Matrix4(*v)),
        ParamValue::Node(_) => None,
        ParamValue::Array(array) => array_values(array),
    }
}

fn array_values(array: &ParamArray) -> Option<(TypeName, Vec<Value>)> {
    let n = array.key_len();
    let keys = array.keys;
    fn split<T: Clone>(v: &[T], n: usize, keys: usize) -> Vec<Vec<T>> {
        if n == 0 {
            return vec![Vec::new(); keys];
        }
        v.chunks(n).map(|c| c.to_vec()).collect()
    }
    let (type_name, values): (TypeName, Vec<Value>) = match &array.data {
        ArrayData::Bool(v) => (
            types::BOOL_ARRAY,
            split(v, n, keys).into_iter().map(Value::BoolArray).collect(),
        ),
        ArrayData::Byte(v) => (
            types::UCHAR_ARRAY,
            split(v, n, keys).into_iter().map(Value::UCharArray).collect(),
        ),
        ArrayData::Int(v) => (
            types::INT_ARRAY,
            split(v, n, keys).into_iter().map(Value::IntArray).collect(),
        ),
        ArrayData::UInt(v) => (
            types::UINT_ARRAY,
            split(v, n, keys).into_iter().map(Value::UIntArray).collect(),
        ),
        ArrayData::Float(v) => (
            types::FLOAT_ARRAY,
            split(v, n, keys).into_iter().map(Value::FloatArray).collect(),
        ),
        ArrayData::Rgb(v) => (
            types::COLOR3F_ARRAY,
            split(v, n, keys).into_iter().map(Value::Float3Array).collect(),
        ),
        ArrayData::Vector(v) => (
            types::VECTOR3F_ARRAY,
            split(v, n, keys).into_iter().map(Value::Float3Array).collect(),
        ),
        ArrayData::Rgba(v) => (
            types::COLOR4F_ARRAY,
            split(v, n, keys).into_iter().map(Value::Float4Array).collect(),
        ),
        ArrayData::Vector2(v) => (
            types::FLOAT2_ARRAY,
            split(v, n, keys).into_iter().map(Value::Float2Array).collect(),
        ),
        ArrayData::String(v) => (
            types::STRING_ARRAY,
            split(v, n, keys).into_iter().map(Value::StringArray).collect(),
        ),
        ArrayData::Matrix(v) => (
            types::MATRIX4D_ARRAY,
            split(v, n, keys).into_iter().map(Value::Matrix4Array).collect(),
        ),
        ArrayData::Node(_) => return None,
    };
    Some((type_name, values))
}
