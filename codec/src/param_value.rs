use crate::error::CodecError;
use crate::param_type::ParamType;

/// A coerced positional argument, ready to hand to a registered method.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

fn wrong_variant(target: ParamType, found: &ParamValue) -> CodecError {
    CodecError::Coercion {
        target,
        value: format!("{found:?}"),
        reason: "value was not coerced to this type".to_owned(),
    }
}

impl TryFrom<ParamValue> for String {
    type Error = CodecError;

    fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
        match v {
            ParamValue::String(s) => Ok(s),
            other => Err(wrong_variant(ParamType::String, &other)),
        }
    }
}

impl TryFrom<ParamValue> for bool {
    type Error = CodecError;

    fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
        match v {
            ParamValue::Bool(b) => Ok(b),
            other => Err(wrong_variant(ParamType::Bool, &other)),
        }
    }
}

impl TryFrom<ParamValue> for f64 {
    type Error = CodecError;

    fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
        match v {
            ParamValue::Float(f) => Ok(f),
            ParamValue::Int(i) => Ok(i as f64),
            other => Err(wrong_variant(ParamType::Float(crate::FloatWidth::W64), &other)),
        }
    }
}

impl TryFrom<ParamValue> for f32 {
    type Error = CodecError;

    fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
        f64::try_from(v).map(|f| f as f32)
    }
}

impl TryFrom<ParamValue> for i64 {
    type Error = CodecError;

    fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
        match v {
            ParamValue::Int(i) => Ok(i),
            other => Err(wrong_variant(ParamType::Int(crate::IntWidth::W64), &other)),
        }
    }
}

macro_rules! narrow_int {
    ($t:ty, $width:expr) => {
        impl TryFrom<ParamValue> for $t {
            type Error = CodecError;

            fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
                let i = i64::try_from(v)?;
                <$t>::try_from(i).map_err(|_| CodecError::Coercion {
                    target: ParamType::Int($width),
                    value: i.to_string(),
                    reason: "out of range".to_owned(),
                })
            }
        }
    };
}

narrow_int!(i32, crate::IntWidth::W32);
narrow_int!(i16, crate::IntWidth::W16);
narrow_int!(i8, crate::IntWidth::W8);

impl TryFrom<ParamValue> for serde_json::Value {
    type Error = CodecError;

    fn try_from(v: ParamValue) -> Result<Self, Self::Error> {
        match v {
            ParamValue::Json(j) => Ok(j),
            ParamValue::String(s) => Ok(serde_json::Value::String(s)),
            ParamValue::Bool(b) => Ok(serde_json::Value::Bool(b)),
            ParamValue::Int(i) => Ok(serde_json::Value::from(i)),
            ParamValue::Float(f) => Ok(serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)),
            ParamValue::Null => Ok(serde_json::Value::Null),
        }
    }
}
