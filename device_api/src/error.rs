use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// The inventory document could not be loaded. Fatal: callers cannot proceed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InventoryError {
    #[error("Failed to read inventory file '{path}'")]
    ReadFile { path: String },
    #[error("Inventory file is not a mapping at its top level")]
    MalformedTopLevel,
    #[error("Inventory record '{name}' is malformed")]
    MalformedRecord { name: String },
}

/// A Device Session could not be established, or was lost mid-conversation.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionError {
    #[error("Authentication failed for device '{device}'")]
    AuthenticationFailed { device: String },
    #[error("Network unreachable for device '{device}'")]
    Unreachable { device: String },
    #[error("Timed out waiting for a prompt on device '{device}'")]
    PromptTimeout { device: String },
    #[error("Timed out waiting for the XML closing tag on device '{device}'")]
    XmlSentinelTimeout { device: String },
    #[error("Session to device '{device}' was used after it was closed")]
    SessionClosed { device: String },
}

/// A command produced an `ERROR:`/`error:` marker in its output.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CommandError {
    #[error("Command '{command}' on device '{device}' failed: {marker}")]
    MarkerObserved {
        device: String,
        command: String,
        marker: String,
    },
}

/// A store operation failed; never fatal on its own, the caller decides whether to abort.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum StoreError {
    #[error("Failed to open store at '{path}'")]
    Open { path: String },
    #[error("Store is unavailable")]
    Unavailable,
    #[error("Failed to upsert interface record for ({device}, {interface})")]
    UpsertInterface { device: String, interface: String },
    #[error("Failed to upsert bridge-domain row '{name}'")]
    UpsertBridgeDomain { name: String },
    #[error("Failed to read or write the bridge-domain discovery blob for '{name}'")]
    DiscoveryBlob { name: String },
}

/// An uncategorized error occurred, or a programmer invariant was violated.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("An uncategorized error occurred: {0}")]
    Todo(&'static str),
}

/// Each variant of `ErrorKind` corresponds to one of the five error kinds distinguished by the
/// core's error handling design: inventory, session, command, parse, and store errors, plus a
/// catch-all for programmer errors. Parse errors never escape as `CoreError` — they are recorded
/// per-record as warnings — so there is no `ErrorKind::Parse` variant here.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct CoreErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

/// The core's single structured error type. Narrow `thiserror` enums classify what went wrong;
/// `CoreError` wraps one of them plus an optional source and a stack of context messages
/// attached as the error propagates up through orchestration layers.
pub struct CoreError(Box<CoreErrorInner>);

impl CoreError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        CoreError(Box::new(CoreErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        CoreError(Box::new(CoreErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    /// Returns a reference to the inner `ErrorKind`.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }

    pub fn unstructured(self, context: impl Into<Cow<'static, str>>) -> anyhow::Error {
        match self.0.source {
            Some(source) => source.context(self.0.kind).context(context.into()),
            None => anyhow::Error::from(self.0.kind).context(context.into()),
        }
    }
}

/// Converts an `Option`/`Result` into a `CoreError` carrying a caller-supplied classification.
/// Mirrors the "low-level components raise narrow exceptions that orchestrators convert into
/// structured results" propagation policy.
pub trait ReportError<T, K> {
    fn structured(self, kind: K) -> Result<T, CoreError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, CoreError> {
        match self {
            Some(t) => Ok(t),
            None => Err(CoreError(Box::new(CoreErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, CoreError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(CoreError(Box::new(CoreErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait CoreResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, CoreError>;

    /// Convert the error into an unstructured error, losing its classification.
    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error>;
}

impl<T> CoreResultExt<T> for Result<T, CoreError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, CoreError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }

    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error> {
        self.map_err(|e| e.unstructured(context))
    }
}

impl Serialize for CoreError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("core-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Inventory(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Session(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Command(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Store(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use serde_yaml::Value;

    use super::*;

    #[test]
    fn test_error_serialize() {
        let e = CoreError(Box::new(CoreErrorInner {
            kind: ErrorKind::Inventory(InventoryError::ReadFile {
                path: "/non-existent-file".into(),
            }),
            location: Location::caller(),
            source: Some(
                std::fs::read("/non-existent-file")
                    .context("failed to read file")
                    .unwrap_err(),
            ),
            context: Vec::new(),
        }));
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m.len(), 5);
                assert_eq!(m["category"], Value::String("inventory".into()));
                assert!(matches!(m["cause"], Value::String(_)));
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_error_debug_includes_context_and_source() {
        let error = Err::<(), _>(anyhow::anyhow!("z"))
            .context("x\ny")
            .structured(InternalError::Internal("w"))
            .unwrap_err();
        assert_eq!(
            format!("{:?}", error),
            format!(
                "Internal error: w at {}:{}\n\nCaused by:\n    0: x\n       y\n    1: z\n",
                error.0.location.file(),
                error.0.location.line(),
            ),
        );
    }

    #[test]
    fn test_message_appends_context() {
        let result: Result<(), CoreError> = Err(CoreError::new(InternalError::Todo("x")))
            .message("while doing a thing")
            .message("while doing a bigger thing");
        let err = result.unwrap_err();
        assert_eq!(err.0.context.len(), 2);
    }
}
