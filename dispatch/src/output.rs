use serde_json::Value;

/// The dispatcher's success shape, implementing §4.A's "Result shape" rule:
/// a method's last return value is always the error slot; whatever
/// remains on success collapses to one of these three forms.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutput {
    /// Only the error slot was produced.
    Empty,
    /// One data value plus the error slot.
    Single(Value),
    /// More than one data value plus the error slot.
    Many(Vec<Value>),
}

impl MethodOutput {
    /// Collapses to the wire payload shape (§6: `payload: <any|null>`).
    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::Single(v) => Some(v),
            Self::Many(vs) => Some(Value::Array(vs)),
        }
    }
}
