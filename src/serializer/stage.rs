//! Custom serializers attached to wrapped nodes.

use std::fmt;
use std::sync::Arc;

use crate::error::StageError;
use crate::value::Value;

use super::DumpMode;

pub type PlainSerializeFn =
    Arc<dyn Fn(Value, &SerializeInfo<'_>) -> Result<Value, StageError> + Send + Sync>;

pub type WrapSerializeFn = Arc<
    dyn Fn(Value, &mut SerializeNext<'_>, &SerializeInfo<'_>) -> Result<Value, StageError>
        + Send
        + Sync,
>;

/// Read-only information handed to serializer functions.
#[derive(Debug, Clone, Copy)]
pub struct SerializeInfo<'a> {
    pub mode: DumpMode,
    pub by_alias: bool,
    pub context: Option<&'a Value>,
    pub field_name: Option<&'a str>,
}

/// The continuation handed to a `Wrap` serializer: dumps a value with the
/// wrapped node's own serialization.
pub struct SerializeNext<'a> {
    inner: &'a mut dyn FnMut(Value) -> Result<Value, StageError>,
}

impl<'a> SerializeNext<'a> {
    pub(crate) fn new(inner: &'a mut dyn FnMut(Value) -> Result<Value, StageError>) -> Self {
        Self { inner }
    }

    pub fn call(&mut self, value: Value) -> Result<Value, StageError> {
        (self.inner)(value)
    }
}

/// A custom serializer.
#[derive(Clone)]
pub enum SerializerStage {
    /// Replaces the dump of the inner node.
    Plain(PlainSerializeFn),
    /// Surrounds the dump of the inner node.
    Wrap(WrapSerializeFn),
}

impl SerializerStage {
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(Value, &SerializeInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        SerializerStage::Plain(Arc::new(f))
    }

    pub fn wrap<F>(f: F) -> Self
    where
        F: Fn(Value, &mut SerializeNext<'_>, &SerializeInfo<'_>) -> Result<Value, StageError>
            + Send
            + Sync
            + 'static,
    {
        SerializerStage::Wrap(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SerializerStage::Plain(_) => "plain",
            SerializerStage::Wrap(_) => "wrap",
        }
    }

    pub(crate) fn run(
        &self,
        value: Value,
        info: &SerializeInfo<'_>,
        inner: &mut dyn FnMut(Value) -> Result<Value, StageError>,
    ) -> Result<Value, StageError> {
        match self {
            SerializerStage::Plain(f) => f(value, info),
            SerializerStage::Wrap(f) => {
                let mut next = SerializeNext::new(inner);
                f(value, &mut next, info)
            }
        }
    }
}

impl fmt::Debug for SerializerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializerStage::{}", self.name())
    }
}
