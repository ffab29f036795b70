use crate::domain::constants::{STATE_NOT_OK, STATE_OK};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// Decoded tool output, tagged with the shape it was decoded as.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Object(Map<String, Value>),
    Array(Vec<Value>),
    Scalar(Value),
    Empty,
}

impl Payload {
    pub fn to_value(&self) -> Value {
        match self {
            Payload::Object(m) => Value::Object(m.clone()),
            Payload::Array(a) => Value::Array(a.clone()),
            Payload::Scalar(v) => v.clone(),
            Payload::Empty => Value::Null,
        }
    }

    /// Element count for arrays/objects; 0 for empty payloads.
    pub fn len(&self) -> usize {
        match self {
            Payload::Object(m) => m.len(),
            Payload::Array(a) => a.len(),
            Payload::Scalar(Value::Null) | Payload::Empty => 0,
            Payload::Scalar(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, path: &FieldPath) -> Result<Value, ExtractError> {
        match self {
            Payload::Empty => Err(ExtractError::Empty),
            Payload::Object(m) => {
                let mut segments = path.0.iter();
                let Some(first) = segments.next() else {
                    return Ok(Value::Object(m.clone()));
                };
                let start = match first {
                    Segment::Key(k) => m.get(k),
                    Segment::Index(_) => None,
                }
                .ok_or_else(|| ExtractError::Missing {
                    path: path.to_string(),
                })?;
                walk(start, segments, path).cloned()
            }
            Payload::Array(a) => {
                let mut segments = path.0.iter();
                let Some(first) = segments.next() else {
                    return Ok(Value::Array(a.clone()));
                };
                let start = match first {
                    Segment::Index(i) => a.get(*i),
                    Segment::Key(_) => None,
                }
                .ok_or_else(|| ExtractError::Missing {
                    path: path.to_string(),
                })?;
                walk(start, segments, path).cloned()
            }
            Payload::Scalar(v) => {
                if path.0.is_empty() {
                    Ok(v.clone())
                } else {
                    Err(ExtractError::Missing {
                        path: path.to_string(),
                    })
                }
            }
        }
    }

    /// Deserialize the whole payload into a typed response struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ExtractError> {
        serde_json::from_value(self.to_value()).map_err(|e| ExtractError::Decode(e.to_string()))
    }
}

fn walk<'a, 'p>(
    mut current: &'a Value,
    segments: impl Iterator<Item = &'p Segment>,
    path: &FieldPath,
) -> Result<&'a Value, ExtractError> {
    for seg in segments {
        let next = match seg {
            Segment::Key(k) => current.get(k.as_str()),
            Segment::Index(i) => current.get(*i),
        };
        current = next.ok_or_else(|| ExtractError::Missing {
            path: path.to_string(),
        })?;
    }
    Ok(current)
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Dotted path into a payload; all-digit segments index arrays (`0.image_status`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) => Segment::Key(s.to_string()),
            })
            .collect();
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|s| match s {
                Segment::Key(k) => k.clone(),
                Segment::Index(i) => i.to_string(),
            })
            .collect();
        f.write_str(&parts.join("."))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("field `{path}` missing from response")]
    Missing { path: String },
    #[error("response was empty")]
    Empty,
    #[error("unexpected response layout: {0}")]
    Decode(String),
}

/// How a check reads its actual state out of a successful payload.
pub enum Extract {
    /// Value at a field path.
    Field(FieldPath),
    /// `"ok"` whenever the call succeeded.
    Succeeded,
    /// `"ok"` for a non-empty payload, `"notok"` otherwise.
    NonEmpty,
    /// The payload element count.
    Count,
    Custom(Box<dyn Fn(&Payload) -> Result<Value, ExtractError> + Send + Sync>),
}

impl Extract {
    pub fn field(path: &str) -> Self {
        Extract::Field(FieldPath::parse(path))
    }

    pub fn custom(f: impl Fn(&Payload) -> Result<Value, ExtractError> + Send + Sync + 'static) -> Self {
        Extract::Custom(Box::new(f))
    }

    pub fn apply(&self, payload: &Payload) -> Result<Value, ExtractError> {
        match self {
            Extract::Field(path) => payload.lookup(path),
            Extract::Succeeded => Ok(Value::from(STATE_OK)),
            Extract::NonEmpty => Ok(Value::from(if payload.is_empty() {
                STATE_NOT_OK
            } else {
                STATE_OK
            })),
            Extract::Count => Ok(Value::from(payload.len())),
            Extract::Custom(f) => f(payload),
        }
    }
}

impl fmt::Debug for Extract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extract::Field(p) => write!(f, "Field({})", p),
            Extract::Succeeded => f.write_str("Succeeded"),
            Extract::NonEmpty => f.write_str("NonEmpty"),
            Extract::Count => f.write_str("Count"),
            Extract::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Human form of a state value: strings unquoted, everything else as JSON.
pub fn display_state(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
