//! Action model
//!
//! An [`Action`] names a forward function and, optionally, its inverse
//! together with their JSON argument lists. The field names are the
//! persisted wire format.

use crate::error::ArgumentError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of change and its optional inverse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Registered name of the forward function
    #[serde(rename = "do")]
    pub do_name: String,

    /// Arguments passed to the forward function
    pub do_arguments: Vec<Value>,

    /// Registered name of the inverse function
    #[serde(rename = "undo", default, skip_serializing_if = "Option::is_none")]
    pub undo_name: Option<String>,

    /// Arguments passed to the inverse function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_arguments: Option<Vec<Value>>,
}

impl Action {
    /// Create an action that can be undone
    #[must_use]
    pub fn reversible(
        do_name: impl Into<String>,
        do_arguments: Vec<Value>,
        undo_name: impl Into<String>,
        undo_arguments: Vec<Value>,
    ) -> Self {
        Self {
            do_name: do_name.into(),
            do_arguments,
            undo_name: Some(undo_name.into()),
            undo_arguments: Some(undo_arguments),
        }
    }

    /// Create an action without an inverse
    #[must_use]
    pub fn irreversible(do_name: impl Into<String>, do_arguments: Vec<Value>) -> Self {
        Self {
            do_name: do_name.into(),
            do_arguments,
            undo_name: None,
            undo_arguments: None,
        }
    }

    /// Whether both the inverse name and its arguments are present
    #[inline]
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.undo_name.is_some() && self.undo_arguments.is_some()
    }

    /// Inverse name and arguments, if the action is reversible
    #[must_use]
    pub fn inverse(&self) -> Option<(&str, &[Value])> {
        match (&self.undo_name, &self.undo_arguments) {
            (Some(name), Some(args)) => Some((name.as_str(), args.as_slice())),
            _ => None,
        }
    }
}

/// Positional arguments handed to an action function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    /// Wrap an argument list
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Decode a required argument
    ///
    /// # Errors
    /// `Missing` when the position is out of range, `Invalid` when the value
    /// does not decode into `T`.
    pub fn get<T: DeserializeOwned>(&self, position: usize) -> Result<T, ArgumentError> {
        let value = self.0.get(position).ok_or(ArgumentError::Missing(position))?;
        serde_json::from_value(value.clone())
            .map_err(|source| ArgumentError::Invalid { position, source })
    }

    /// Decode an argument that may be absent or `null`
    ///
    /// # Errors
    /// `Invalid` when a present value does not decode into `T`.
    pub fn optional<T: DeserializeOwned>(&self, position: usize) -> Result<Option<T>, ArgumentError> {
        match self.0.get(position) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| ArgumentError::Invalid { position, source }),
        }
    }

    /// Number of arguments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no arguments were passed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw argument values
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<&[Value]> for Args {
    fn from(values: &[Value]) -> Self {
        Self(values.to_vec())
    }
}
