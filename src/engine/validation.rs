//! Parameter value validation.
//!
//! Pure checks of a submitted value map against a template's parameter
//! schema, run before any collaborator is touched. Parameters are checked in
//! declaration order so the same input always yields the same first-reported
//! error; the HTTP layer surfaces only the first entry.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::template::models::{ParameterType, TemplateParameter};

lazy_static! {
    /// local@domain with at least one dot in the domain.
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// A single failed check against the parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{label}' is required and cannot be empty")]
    MissingRequired { name: String, label: String },
    #[error("'{name}' is not a valid {expected}")]
    InvalidFormat { name: String, expected: String },
}

impl ValidationError {
    /// Name of the offending parameter.
    pub fn parameter(&self) -> &str {
        match self {
            ValidationError::MissingRequired { name, .. } => name,
            ValidationError::InvalidFormat { name, .. } => name,
        }
    }
}

/// Ordered collection of validation failures.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn first(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// First failure in declaration order, consuming the collection.
    pub fn into_first(self) -> Option<ValidationError> {
        self.errors.into_iter().next()
    }

    /// Ok if no checks failed, Err carrying every failure otherwise.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Check `values` against `parameters`, in declaration order.
///
/// Required parameters must be present and non-empty after trimming. Values
/// for `email` and `number` parameters must additionally match their format
/// when present. `date`, `text` and `textarea` carry no format check beyond
/// required-ness. Unknown keys in `values` are ignored.
pub fn validate(
    parameters: &[TemplateParameter],
    values: &HashMap<String, String>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    for parameter in parameters {
        let value = values.get(&parameter.name).map(String::as_str);

        if parameter.required && value.map_or(true, |v| v.trim().is_empty()) {
            errors.add(ValidationError::MissingRequired {
                name: parameter.name.clone(),
                label: parameter.label.clone(),
            });
            continue;
        }

        let value = match value {
            Some(v) if !v.trim().is_empty() => v.trim(),
            _ => continue,
        };

        match parameter.param_type {
            ParameterType::Email => {
                if !EMAIL.is_match(value) {
                    errors.add(ValidationError::InvalidFormat {
                        name: parameter.name.clone(),
                        expected: "email".to_string(),
                    });
                }
            }
            ParameterType::Number => {
                let parsed = value.parse::<f64>();
                if !parsed.map_or(false, |n| n.is_finite()) {
                    errors.add(ValidationError::InvalidFormat {
                        name: parameter.name.clone(),
                        expected: "number".to_string(),
                    });
                }
            }
            ParameterType::Text | ParameterType::Textarea | ParameterType::Date => {}
        }
    }

    errors.into_result()
}
