use crate::error::CodecError;
use crate::param_type::{IntWidth, ParamType, ParameterDescriptor};
use crate::param_value::ParamValue;

fn coercion_err(descriptor: &ParameterDescriptor, raw: &str, reason: impl Into<String>) -> CodecError {
    CodecError::Coercion {
        target: descriptor.kind.clone(),
        value: raw.to_owned(),
        reason: reason.into(),
    }
}

fn check_int_range(width: IntWidth, v: i64) -> Result<(), String> {
    let (min, max) = match width {
        IntWidth::W8 => (i64::from(i8::MIN), i64::from(i8::MAX)),
        IntWidth::W16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
        IntWidth::W32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
        IntWidth::W64 => (i64::MIN, i64::MAX),
    };
    if v < min || v > max {
        Err(format!("{v} out of range for {width:?}"))
    } else {
        Ok(())
    }
}

/// Coerces one positional argument string into a typed [`ParamValue`] per
/// its [`ParameterDescriptor`]. `raw` is the string carrier produced by
/// [`crate::unmarshal_params`].
pub fn coerce(raw: &str, descriptor: &ParameterDescriptor) -> Result<ParamValue, CodecError> {
    if descriptor.nullable && raw == "null" {
        return Ok(ParamValue::Null);
    }

    match &descriptor.kind {
        ParamType::String => Ok(ParamValue::String(raw.to_owned())),
        ParamType::Bool => raw
            .parse::<bool>()
            .map(ParamValue::Bool)
            .map_err(|e| coercion_err(descriptor, raw, e.to_string())),
        ParamType::Int(width) => {
            let v: i64 = raw
                .parse()
                .map_err(|e: std::num::ParseIntError| coercion_err(descriptor, raw, e.to_string()))?;
            check_int_range(*width, v).map_err(|reason| coercion_err(descriptor, raw, reason))?;
            Ok(ParamValue::Int(v))
        }
        ParamType::Float(_width) => raw
            .parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|e| coercion_err(descriptor, raw, e.to_string())),
        ParamType::Object => {
            let v: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| coercion_err(descriptor, raw, e.to_string()))?;
            if v.is_object() {
                Ok(ParamValue::Json(v))
            } else {
                Err(coercion_err(descriptor, raw, "expected a JSON object"))
            }
        }
        ParamType::Array => {
            let v: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| coercion_err(descriptor, raw, e.to_string()))?;
            if v.is_array() {
                Ok(ParamValue::Json(v))
            } else {
                Err(coercion_err(descriptor, raw, "expected a JSON array"))
            }
        }
        ParamType::Json => {
            let v: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| coercion_err(descriptor, raw, e.to_string()))?;
            Ok(ParamValue::Json(v))
        }
    }
}

/// Coerces a already-typed [`ParamValue`] into `Option<T>`, mapping
/// [`ParamValue::Null`] to `None`. Kept as a free function rather than a
/// blanket `TryFrom<ParamValue> for Option<T>` impl: both `Option` and
/// `TryFrom` are foreign to this crate, so a blanket impl over them isn't
/// ours to add.
pub fn coerce_or_null<T>(v: ParamValue) -> Result<Option<T>, CodecError>
where
    T: TryFrom<ParamValue, Error = CodecError>,
{
    match v {
        ParamValue::Null => Ok(None),
        other => T::try_from(other).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_type::FloatWidth;

    #[test]
    fn nullable_short_circuits_on_literal_null() {
        let d = ParameterDescriptor::nullable(ParamType::Int(IntWidth::W32));
        assert_eq!(coerce("null", &d).unwrap(), ParamValue::Null);
    }

    #[test]
    fn non_nullable_rejects_null() {
        let d = ParameterDescriptor::new(ParamType::Int(IntWidth::W32));
        assert!(coerce("null", &d).is_err());
    }

    #[test]
    fn int_out_of_range_for_width_is_rejected() {
        let d = ParameterDescriptor::new(ParamType::Int(IntWidth::W8));
        assert!(coerce("200", &d).is_err());
        assert!(coerce("120", &d).is_ok());
    }

    #[test]
    fn object_and_array_validate_shape() {
        let obj = ParameterDescriptor::new(ParamType::Object);
        assert!(coerce(r#"{"a":1}"#, &obj).is_ok());
        assert!(coerce("[1,2]", &obj).is_err());

        let arr = ParameterDescriptor::new(ParamType::Array);
        assert!(coerce("[1,2]", &arr).is_ok());
        assert!(coerce(r#"{"a":1}"#, &arr).is_err());
    }

    #[test]
    fn reencode_coerce_roundtrips_for_float() {
        let d = ParameterDescriptor::new(ParamType::Float(FloatWidth::W64));
        let first = coerce("3.5", &d).unwrap();
        let ParamValue::Float(f) = first else {
            panic!("expected float");
        };
        let reencoded = f.to_string();
        let second = coerce(&reencoded, &d).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn coerce_or_null_maps_null_to_none() {
        let v: Option<String> = coerce_or_null(ParamValue::Null).unwrap();
        assert_eq!(v, None);
        let v: Option<String> = coerce_or_null(ParamValue::String("hi".into())).unwrap();
        assert_eq!(v, Some("hi".to_owned()));
    }
}
