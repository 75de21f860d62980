use serde_json::Value;

use super::FeedError;

pub type RecordId = String;

/// The body of a feed record, validated.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RecordBody {
    pub name: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl RecordBody {
    pub fn from_value(value: &Value) -> Result<Self, FeedError> {
        let Some(fields) = value.as_object() else {
            return Err(FeedError::malformed(format!(
                "expected an object, got {}",
                kind(value)
            )));
        };

        let string = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| FeedError::malformed(format!("`{key}` must be a string")))
        };

        let created_at = fields
            .get("createdAt")
            .and_then(as_timestamp)
            .ok_or_else(|| FeedError::malformed("`createdAt` must be an integer"))?;

        Ok(Self {
            name: string("name")?,
            text: string("text")?,
            created_at,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "text": self.text,
            "createdAt": self.created_at,
        })
    }

    /// Validates a raw record, logging and discarding it when malformed.
    pub(crate) fn quarantine(id: &str, value: &Value) -> Option<Self> {
        match Self::from_value(value) {
            Ok(body) => Some(body),
            Err(err) => {
                tracing::warn!(id, %err, "quarantined malformed record");
                None
            }
        }
    }
}

// the hosted feed may hand integers back as `100.0`
fn as_timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRecord {
    pub id: RecordId,
    pub body: RecordBody,
}

/// Result of a bulk fetch, in feed enumeration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<(RecordId, RecordBody)>,
    pub quarantined: Vec<RecordId>,
}

impl Snapshot {
    pub fn from_value(root: Value) -> Result<Self, FeedError> {
        match root {
            // an empty location reads back as null
            Value::Null => Ok(Self::default()),
            Value::Object(children) => Ok(children.into_iter().collect()),
            other => Err(FeedError::malformed(format!(
                "snapshot root must be an object, got {}",
                kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(RecordId, Value)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (RecordId, Value)>>(iter: T) -> Self {
        let mut this = Self::default();
        for (id, value) in iter {
            match RecordBody::quarantine(&id, &value) {
                Some(body) => this.records.push((id, body)),
                None => this.quarantined.push(id),
            }
        }
        this
    }
}
