//! The atomic value carried on an edge.
//!
//! A `Datum` is either a value wrapping an opaque, shared payload, or one of a
//! small set of control markers. Payloads are reference counted so broadcast
//! fan-out hands every consumer the same allocation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared, immutable payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Discriminant of a [`Datum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatumKind {
    /// Carries a payload.
    Value,
    /// Nothing to process this step (e.g. an unconnected optional input).
    Empty,
    /// End-of-stream; no further values follow on this edge.
    Complete,
    /// A per-datum failure forwarded from upstream.
    Error,
    /// A datum that could not be interpreted.
    Invalid,
}

#[derive(Clone)]
pub enum Datum {
    Value {
        payload: Payload,
        type_name: &'static str,
    },
    Empty,
    Complete,
    Error(Arc<str>),
    Invalid,
}

impl Datum {
    /// Wrap a payload. Never fails.
    pub fn make_value<T: Any + Send + Sync>(value: T) -> Self {
        Datum::Value {
            payload: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wrap an already shared payload without reallocating.
    pub fn from_shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Datum::Value {
            payload: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn make_complete() -> Self {
        Datum::Complete
    }

    #[inline]
    pub fn make_empty() -> Self {
        Datum::Empty
    }

    pub fn make_error(info: impl AsRef<str>) -> Self {
        Datum::Error(Arc::from(info.as_ref()))
    }

    #[inline]
    pub fn make_invalid() -> Self {
        Datum::Invalid
    }

    pub fn kind(&self) -> DatumKind {
        match self {
            Datum::Value { .. } => DatumKind::Value,
            Datum::Empty => DatumKind::Empty,
            Datum::Complete => DatumKind::Complete,
            Datum::Error(_) => DatumKind::Error,
            Datum::Invalid => DatumKind::Invalid,
        }
    }

    /// True for every kind except `Value`.
    #[inline]
    pub fn is_control(&self) -> bool {
        !matches!(self, Datum::Value { .. })
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, Datum::Complete)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Datum::Empty)
    }

    /// Borrow the payload as `T`, if this is a value of that type.
    pub fn value_as<T: Any>(&self) -> Option<&T> {
        match self {
            Datum::Value { payload, .. } => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take a shared handle to the payload as `T`.
    pub fn value_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Datum::Value { payload, .. } => payload.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Error message, for `Error` datums.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Datum::Error(msg) => Some(msg.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Value { type_name, .. } => write!(f, "Value<{}>", type_name),
            Datum::Empty => write!(f, "Empty"),
            Datum::Complete => write!(f, "Complete"),
            Datum::Error(msg) => write!(f, "Error({:?})", msg),
            Datum::Invalid => write!(f, "Invalid"),
        }
    }
}
