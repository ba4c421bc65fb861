use mongodb::bson::{self, Bson, Document};

/// Dotted path into a nested document, used in error messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Path<'a>(pub &'a [&'a str]);

impl<'a> std::fmt::Display for Path<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.0.len();
        for (idx, key) in self.0.iter().enumerate() {
            write!(f, "{}", key)?;
            if idx + 1 < len {
                write!(f, ".")?;
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("invalid type: expected {expected_type}, found {value:?}")]
pub struct InvalidTypeError {
    pub expected_type: &'static str,
    pub value: Bson,
}

pub trait BsonValue {
    fn get_str(&self) -> Result<&str, InvalidTypeError>;
    fn get_i64(&self) -> Result<i64, InvalidTypeError>;
    fn get_bool(&self) -> Result<bool, InvalidTypeError>;
    fn get_document(&self) -> Result<&Document, InvalidTypeError>;
}

impl BsonValue for Bson {
    fn get_str(&self) -> Result<&str, InvalidTypeError> {
        self.as_str().ok_or_else(|| InvalidTypeError {
            expected_type: "string",
            value: self.clone(),
        })
    }

    /// Counters are reported as any of the numeric BSON types depending on
    /// the server version; doubles are truncated and booleans count as 1 or 0.
    fn get_i64(&self) -> Result<i64, InvalidTypeError> {
        match self {
            Bson::Boolean(v) => Ok(i64::from(*v)),
            Bson::Int64(v) => Ok(*v),
            Bson::Int32(v) => Ok((*v).into()),
            Bson::Double(v) if v.is_finite() => Ok(*v as i64),
            _ => Err(InvalidTypeError {
                expected_type: "integer",
                value: self.clone(),
            }),
        }
    }

    fn get_bool(&self) -> Result<bool, InvalidTypeError> {
        self.as_bool().ok_or_else(|| InvalidTypeError {
            expected_type: "boolean",
            value: self.clone(),
        })
    }

    fn get_document(&self) -> Result<&Document, InvalidTypeError> {
        self.as_document().ok_or_else(|| InvalidTypeError {
            expected_type: "document",
            value: self.clone(),
        })
    }
}

/// Follows `path` through nested documents.
///
/// Returns `None` as soon as a key is missing or an intermediate value is
/// not a document.
pub fn get_path<'a>(document: &'a Document, path: &[&str]) -> Option<&'a Bson> {
    let (first, rest) = path.split_first()?;
    let mut value = document.get(first)?;
    for key in rest {
        value = value.as_document()?.get(key)?;
    }
    Some(value)
}

/// Replaces documents and arrays nested deeper than `depth` with a marker.
pub fn omit_values(mut value: Bson, depth: usize) -> Bson {
    omit_values_visitor(&mut value, depth);
    value
}

fn omit_values_visitor(value: &mut Bson, depth: usize) {
    match value {
        Bson::Document(value) => {
            if depth == 0 {
                *value = bson::doc! {"omitted": true};
            } else {
                for (_, v) in value.iter_mut() {
                    omit_values_visitor(v, depth - 1);
                }
            }
        }
        Bson::Array(value) => {
            if depth == 0 {
                *value = bson::Array::from_iter([Bson::String("omitted".to_string())]);
            } else {
                for v in value.iter_mut() {
                    omit_values_visitor(v, depth - 1);
                }
            }
        }
        _ => {
            // keep
        }
    };
}
