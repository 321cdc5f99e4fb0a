//! Union member selection.
//!
//! Untagged unions try their members against the same input, each with its
//! own [`ValidationState`] fork, and either take the first success
//! (left-to-right) or the best one (smart). Tagged unions read the tag and
//! validate only the member it maps to.

use crate::error::{ErrorAccumulator, ErrorKind, ErrorRecord, StageError, ValidationErrors};
use crate::path::Location;
use crate::schema::{Discriminator, Tag, UnionMode, UnionSchema};
use crate::validator::{Exactness, ValidationRunner, ValidationState};
use crate::value::Value;

/// Picks and validates the matching member of a union.
pub struct UnionResolver<'r, 'a> {
    runner: &'r ValidationRunner<'a>,
}

/// A successful member and how well it matched.
struct Candidate {
    index: usize,
    value: Value,
    fields_set_count: Option<usize>,
    exactness: Exactness,
}

impl Candidate {
    fn rank(&self) -> (Option<usize>, Exactness) {
        (self.fields_set_count, self.exactness)
    }
}

impl<'r, 'a> UnionResolver<'r, 'a> {
    pub fn new(runner: &'r ValidationRunner<'a>) -> Self {
        Self { runner }
    }

    pub(crate) fn resolve(
        &self,
        union: &UnionSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        if let Some(discriminator) = &union.discriminator {
            return self.discriminated(union, discriminator, input, path, state);
        }
        match union.mode {
            UnionMode::Smart => self.smart(union, input, path, state),
            UnionMode::LeftToRight => self.left_to_right(union, input, path, state),
        }
    }

    /// Validates every member and keeps the best success.
    ///
    /// Members rank by `(fields_set_count, exactness)`; a strictly better
    /// rank replaces the current best, so ties keep the left-most member.
    /// A member without a field count that matches exactly wins at once.
    fn smart(
        &self,
        union: &UnionSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        let mut best: Option<Candidate> = None;
        let mut failures = ErrorAccumulator::new();

        for (index, member) in union.members.iter().enumerate() {
            let member_path = path.push(member.label());
            let mut member_state = state.fork();
            match self
                .runner
                .validate_node(&member.schema, input, &member_path, &mut member_state)
            {
                Ok(value) => {
                    let candidate = Candidate {
                        index,
                        value,
                        fields_set_count: member_state.fields_set_count,
                        exactness: member_state.exactness,
                    };
                    if candidate.fields_set_count.is_none() && candidate.exactness == Exactness::Exact {
                        tracing::trace!(member = index, "exact union member short-circuits");
                        return Ok(self.accept(candidate, state));
                    }
                    let better = best
                        .as_ref()
                        .map_or(true, |current| candidate.rank() > current.rank());
                    if better {
                        best = Some(candidate);
                    }
                }
                Err(StageError::Invalid(errors)) => failures.extend(errors),
                Err(other) => return Err(other),
            }
        }

        match best {
            Some(candidate) => {
                tracing::trace!(
                    member = candidate.index,
                    exactness = ?candidate.exactness,
                    fields_set = ?candidate.fields_set_count,
                    "smart union selected member"
                );
                Ok(self.accept(candidate, state))
            }
            None => Err(union_failure(failures, path, input)),
        }
    }

    /// Returns the first member that validates.
    fn left_to_right(
        &self,
        union: &UnionSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        let mut failures = ErrorAccumulator::new();

        for (index, member) in union.members.iter().enumerate() {
            let member_path = path.push(member.label());
            let mut member_state = state.fork();
            match self
                .runner
                .validate_node(&member.schema, input, &member_path, &mut member_state)
            {
                Ok(value) => {
                    tracing::trace!(member = index, "left-to-right union selected member");
                    let candidate = Candidate {
                        index,
                        value,
                        fields_set_count: member_state.fields_set_count,
                        exactness: member_state.exactness,
                    };
                    return Ok(self.accept(candidate, state));
                }
                Err(StageError::Invalid(errors)) => failures.extend(errors),
                Err(other) => return Err(other),
            }
        }

        Err(union_failure(failures, path, input))
    }

    /// Validates only the member mapped to the input's tag.
    fn discriminated(
        &self,
        union: &UnionSchema,
        discriminator: &Discriminator,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        if matches!(discriminator, Discriminator::Field(_))
            && !matches!(input, Value::Dict(_) | Value::Model(_))
        {
            return Err(single(
                ErrorRecord::new(ErrorKind::ModelAttributesType, path.clone()).with_input(input.clone()),
            ));
        }

        let Some(raw_tag) = discriminator.extract(input) else {
            return Err(single(
                ErrorRecord::new(ErrorKind::UnionTagNotFound, path.clone())
                    .with_context("discriminator", discriminator.describe())
                    .with_input(input.clone()),
            ));
        };

        let matched = Tag::from_value(&raw_tag)
            .and_then(|tag| union.member_for(&tag).map(|index| (tag, index)));
        let Some((tag, index)) = matched else {
            let expected: Vec<String> = union.expected_tags().iter().map(|t| t.repr()).collect();
            return Err(single(
                ErrorRecord::new(ErrorKind::UnionTagInvalid, path.clone())
                    .with_context("discriminator", discriminator.describe())
                    .with_context("tag", raw_tag.to_string())
                    .with_context("expected_tags", expected.join(", "))
                    .with_input(input.clone()),
            ));
        };

        tracing::trace!(%tag, member = index, "discriminated union selected member");
        let member = &union.members[index];
        self.runner
            .validate_node(&member.schema, input, &path.push(tag.to_string()), state)
    }

    fn accept(&self, candidate: Candidate, state: &mut ValidationState<'_>) -> Value {
        state.floor_exactness(candidate.exactness);
        if let Some(count) = candidate.fields_set_count {
            state.add_fields_set(count);
        }
        candidate.value
    }
}

fn single(record: ErrorRecord) -> StageError {
    StageError::Invalid(ValidationErrors::single(record))
}

/// Every member's failures, or a plain type error for a memberless union.
fn union_failure(failures: ErrorAccumulator, path: &Location, input: &Value) -> StageError {
    match failures.into_errors() {
        Some(errors) => StageError::Invalid(errors),
        None => single(
            ErrorRecord::new(ErrorKind::Custom("union_empty".into()), path.clone())
                .with_context("error", "union has no members")
                .with_input(input.clone()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::CompiledSchema;
    use crate::schema::{Discriminator, Schema, UnionMember};
    use crate::value::Value;
    use serde_json::json;
    use stillwater::Validation;

    fn validate(schema: &CompiledSchema, input: serde_json::Value) -> Validation<Value, crate::ValidationErrors> {
        schema.validate(&Value::from(input)).unwrap()
    }

    #[test]
    fn test_smart_prefers_exact_member_regardless_of_order() {
        for union in [
            Schema::union([Schema::float(), Schema::int()]),
            Schema::union([Schema::int(), Schema::float()]),
        ] {
            let schema = CompiledSchema::new(union).unwrap();
            assert_eq!(validate(&schema, json!(1)).into_result().unwrap(), Value::Int(1));
            assert_eq!(validate(&schema, json!(1.5)).into_result().unwrap(), Value::Float(1.5));
        }
    }

    #[test]
    fn test_smart_falls_back_to_first_lax_match() {
        let schema = CompiledSchema::new(Schema::union([Schema::int(), Schema::float()])).unwrap();
        assert_eq!(validate(&schema, json!("3")).into_result().unwrap(), Value::Int(3));
    }

    #[test]
    fn test_left_to_right_takes_first_success() {
        let schema =
            CompiledSchema::new(Schema::union([Schema::float(), Schema::int()]).left_to_right()).unwrap();
        assert_eq!(validate(&schema, json!(1)).into_result().unwrap(), Value::Float(1.0));
    }

    #[test]
    fn test_failures_are_labelled_per_member() {
        let schema = CompiledSchema::new(Schema::union([
            UnionMember::from(Schema::int()),
            UnionMember::from(Schema::list(Schema::str())),
        ]))
        .unwrap();
        let errors = match validate(&schema, json!({"a": 1})) {
            Validation::Failure(errors) => errors,
            Validation::Success(v) => panic!("unexpected success: {v}"),
        };
        let paths: Vec<String> = errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["int", "list[str]"]);
    }

    #[test]
    fn test_tag_not_dict_is_model_attributes_type() {
        let union = Schema::tagged_union(
            Discriminator::field("kind"),
            [Schema::model("A").field("kind", Schema::literal(["a"]))],
        );
        let schema = CompiledSchema::new(union).unwrap();
        let errors = match validate(&schema, json!("a")) {
            Validation::Failure(errors) => errors,
            Validation::Success(v) => panic!("unexpected success: {v}"),
        };
        assert_eq!(errors.first().kind, "model_attributes_type");
    }
}
