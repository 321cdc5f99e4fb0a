//! Ordered validation stages around a node's core check.
//!
//! Stages are declared left to right. The last declared stage is the
//! outermost wrapper and the core check is the innermost call, so pre-phases
//! run right-to-left and post-phases run left-to-right:
//!
//! ```text
//! [Before(b1), After(a1), Wrap(w1), Before(b2), After(a2), Wrap(w2)]
//!
//! w2-pre, b2, w1-pre, b1, core, a1, w1-post, a2, w2-post
//! ```
//!
//! A `Plain` stage never calls inward: every stage declared to its left and
//! the core check are skipped.

use std::fmt;
use std::sync::Arc;

use crate::error::StageError;
use crate::path::Location;
use crate::value::Value;

/// Signature of `Before`, `After` and `Plain` stage functions.
pub type StageFn =
    Arc<dyn Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync>;

/// Signature of `Wrap` stage functions.
pub type WrapFn =
    Arc<dyn Fn(Value, &mut Next<'_>, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync>;

/// Read-only information handed to every stage call.
#[derive(Debug, Clone, Copy)]
pub struct StageInfo<'a> {
    /// Location of the value being validated.
    pub path: &'a Location,
    /// The per-call context, if the caller supplied one.
    pub context: Option<&'a Value>,
    /// Name of the model field being validated, if any.
    pub field_name: Option<&'a str>,
}

/// The continuation handed to a `Wrap` stage.
///
/// Calling it runs every stage declared to the wrapper's left and the core
/// check. A wrapper may call it zero, one, or several times, and may recover
/// from the `StageError::Invalid` it returns.
pub struct Next<'a> {
    inner: &'a mut dyn FnMut(Value) -> Result<Value, StageError>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(inner: &'a mut dyn FnMut(Value) -> Result<Value, StageError>) -> Self {
        Self { inner }
    }

    /// Validates `value` with the inner part of the chain.
    pub fn call(&mut self, value: Value) -> Result<Value, StageError> {
        (self.inner)(value)
    }
}

/// One validation stage.
#[derive(Clone)]
pub enum ValidatorStage {
    /// Transforms the input before the inner stages run.
    Before(StageFn),
    /// Transforms the output after the inner stages return.
    After(StageFn),
    /// Surrounds the inner stages with its own pre- and post-code.
    Wrap(WrapFn),
    /// Replaces the inner stages and the core check entirely.
    Plain(StageFn),
}

impl ValidatorStage {
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        ValidatorStage::Before(Arc::new(f))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        ValidatorStage::After(Arc::new(f))
    }

    pub fn wrap<F>(f: F) -> Self
    where
        F: Fn(Value, &mut Next<'_>, &StageInfo<'_>) -> Result<Value, StageError>
            + Send
            + Sync
            + 'static,
    {
        ValidatorStage::Wrap(Arc::new(f))
    }

    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        ValidatorStage::Plain(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValidatorStage::Before(_) => "before",
            ValidatorStage::After(_) => "after",
            ValidatorStage::Wrap(_) => "wrap",
            ValidatorStage::Plain(_) => "plain",
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, ValidatorStage::Plain(_))
    }
}

impl fmt::Debug for ValidatorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorStage::{}", self.name())
    }
}

/// The ordered stages attached to one node.
#[derive(Clone, Debug, Default)]
pub struct ValidatorChain {
    stages: Vec<ValidatorStage>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a chain from stages in declaration order.
    pub fn from_stages(stages: impl IntoIterator<Item = ValidatorStage>) -> Self {
        let mut chain = Self::new();
        for stage in stages {
            chain.push(stage);
        }
        chain
    }

    /// Appends a stage as the new outermost wrapper.
    pub fn push(&mut self, stage: ValidatorStage) {
        if stage.is_plain() && !self.stages.is_empty() {
            tracing::warn!(
                shadowed = self.stages.len(),
                "plain stage makes every stage declared before it unreachable"
            );
        }
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[ValidatorStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when a `Plain` stage makes the core check unreachable.
    pub fn has_plain(&self) -> bool {
        self.stages.iter().any(ValidatorStage::is_plain)
    }

    /// Indexes of stages that can never run because a `Plain` stage is
    /// declared to their right.
    pub fn unreachable(&self) -> Vec<usize> {
        match self.stages.iter().rposition(ValidatorStage::is_plain) {
            Some(last_plain) => (0..last_plain).collect(),
            None => Vec::new(),
        }
    }

    /// Runs the chain around `core`.
    ///
    /// User-raised stage failures are located at `info.path` with the value
    /// the failing stage received as input.
    pub fn run(
        &self,
        value: Value,
        info: &StageInfo<'_>,
        core: &mut dyn FnMut(Value) -> Result<Value, StageError>,
    ) -> Result<Value, StageError> {
        run_stages(&self.stages, value, info, core)
    }
}

fn run_stages(
    stages: &[ValidatorStage],
    value: Value,
    info: &StageInfo<'_>,
    core: &mut dyn FnMut(Value) -> Result<Value, StageError>,
) -> Result<Value, StageError> {
    let Some((outer, inner)) = stages.split_last() else {
        return core(value);
    };

    match outer {
        ValidatorStage::Before(f) => {
            let input = value.clone();
            let value = f(value, info).map_err(|e| e.locate(info.path, &input))?;
            run_stages(inner, value, info, core)
        }
        ValidatorStage::After(f) => {
            let value = run_stages(inner, value, info, core)?;
            let input = value.clone();
            f(value, info).map_err(|e| e.locate(info.path, &input))
        }
        ValidatorStage::Wrap(f) => {
            let input = value.clone();
            let mut continuation = |v: Value| run_stages(inner, v, info, core);
            let mut next = Next::new(&mut continuation);
            f(value, &mut next, info).map_err(|e| e.locate(info.path, &input))
        }
        ValidatorStage::Plain(f) => {
            let input = value.clone();
            f(value, info).map_err(|e| e.locate(info.path, &input))
        }
    }
}
