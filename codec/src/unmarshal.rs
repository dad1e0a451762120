use crate::error::CodecError;

/// Turns a client payload object into its positional argument strings, in
/// the object's insertion order. Relies on `serde_json`'s `preserve_order`
/// feature: a `Map` here iterates in the order keys were written on the
/// wire, not sorted or hashed.
pub fn unmarshal_params(payload: &serde_json::Value) -> Result<Vec<String>, CodecError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| CodecError::MalformedPayload("expected a JSON object".to_owned()))?;

    Ok(obj.values().map(value_to_param_string).collect())
}

fn value_to_param_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}
