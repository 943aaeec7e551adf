use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// CMS ids show up both as JSON numbers and as strings, depending on the
/// endpoint and on how the user wrote the config file.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Str(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Num(n) => n.to_string(),
            RawId::Str(s) => s,
        }
    }
}

pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

/// Like `deserialize_id`, but `null` (or a missing field, with `#[serde(default)]`) is `None`.
pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawId> = Option::deserialize(deserializer)?;
    Ok(raw.map(String::from).filter(|s| !s.is_empty()))
}

/// Read an id-like value out of an already parsed response body.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Inverse of `id_from_value`: numeric ids go back out as JSON numbers.
pub fn id_to_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
        #[serde(default, deserialize_with = "deserialize_opt_id")]
        folder: Option<String>,
    }

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let h: Holder = serde_json::from_value(json!({"id": 42, "folder": "7"})).unwrap();
        assert_eq!(h.id, "42");
        assert_eq!(h.folder.as_deref(), Some("7"));

        let h: Holder = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert_eq!(h.id, "abc");
        assert!(h.folder.is_none());

        let h: Holder = serde_json::from_value(json!({"id": 1, "folder": null})).unwrap();
        assert!(h.folder.is_none());
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(id_from_value(&json!(12)), Some("12".to_string()));
        assert_eq!(id_from_value(&json!("x1")), Some("x1".to_string()));
        assert_eq!(id_from_value(&json!("")), None);
        assert_eq!(id_from_value(&json!(null)), None);
        assert_eq!(id_to_value("42"), json!(42));
        assert_eq!(id_to_value("A-1"), json!("A-1"));
    }
}
