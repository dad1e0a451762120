/// Splits a database channel name of the form `"Type.Method"` on its first
/// dot, returning `None` for channels that are not dispatchable as a local
/// event (per spec: "names without a dot are logged as invalid and
/// dropped").
#[must_use]
pub fn split_type_method(channel: &str) -> Option<(&str, &str)> {
    let idx = channel.find('.')?;
    let (type_name, rest) = channel.split_at(idx);
    let method_name = &rest[1..];
    if type_name.is_empty() || method_name.is_empty() {
        return None;
    }
    Some((type_name, method_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_dot_only() {
        assert_eq!(split_type_method("Ping.Run"), Some(("Ping", "Run")));
        assert_eq!(split_type_method("Feed.Update.V2"), Some(("Feed", "Update.V2")));
    }

    #[test]
    fn rejects_missing_or_empty_sides() {
        assert_eq!(split_type_method("NoDotHere"), None);
        assert_eq!(split_type_method(".Run"), None);
        assert_eq!(split_type_method("Ping."), None);
    }
}
