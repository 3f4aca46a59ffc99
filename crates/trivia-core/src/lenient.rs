//! Serde helpers for fields the server sends as either a string or a number.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

/// Deserialize an optional string or number into an `Option<String>`.
pub(crate) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

/// Serialize a score as a decimal string.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn serialize_score<S>(score: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&score.to_string())
}

/// Deserialize a score sent as a string or number.
pub(crate) fn deserialize_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid score: {s:?}"))),
        StringOrNumber::Int(n) => {
            u32::try_from(n).map_err(|_| D::Error::custom(format!("score out of range: {n}")))
        }
        StringOrNumber::Float(f) => Err(D::Error::custom(format!("invalid score: {f}"))),
    }
}
