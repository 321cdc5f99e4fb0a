//! External field names for reads and writes.
//!
//! A field is read (validated) through one or more lookup paths and written
//! (serialized) under one key. Both are derived from the field's explicit
//! aliases, the owning model's [`AliasGenerator`], and the field's
//! [`AliasPriority`]. Resolution happens once, when the model is built.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::path::LocItem;
use crate::schema::FieldDescriptor;
use crate::value::Value;

/// A lookup path into nested input, e.g. `["names", 0]`.
///
/// # Example
///
/// ```rust
/// use schemata::{AliasPath, Value};
/// use serde_json::json;
///
/// let input = Value::from(json!({"names": ["Ada", "Lovelace"]}));
/// let path = AliasPath::new("names").index(1);
/// assert_eq!(path.lookup(&input), Some(&Value::from("Lovelace")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasPath {
    items: Vec<LocItem>,
}

impl AliasPath {
    /// Starts a path at a top-level key.
    pub fn new(first: impl Into<String>) -> Self {
        Self {
            items: vec![LocItem::Key(first.into())],
        }
    }

    /// Descends into a mapping key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.items.push(LocItem::Key(key.into()));
        self
    }

    /// Descends into a sequence element; negative indexes count from the end.
    pub fn index(mut self, index: i64) -> Self {
        self.items.push(LocItem::Index(index));
        self
    }

    pub fn items(&self) -> &[LocItem] {
        &self.items
    }

    /// The top-level key this path consumes from the input.
    pub fn first_key(&self) -> Option<&str> {
        self.items.first().and_then(LocItem::as_key)
    }

    /// Follows the path through dicts, model instances and lists.
    ///
    /// Strings are never indexed into, so `["x", 0]` does not read the first
    /// character of a string `x`.
    pub fn lookup<'v>(&self, input: &'v Value) -> Option<&'v Value> {
        let mut current = input;
        for item in &self.items {
            current = match (item, current) {
                (_, Value::Str(_)) => return None,
                (LocItem::Key(key), value) => value.get(key)?,
                (LocItem::Index(index), Value::List(items)) => {
                    let len = items.len() as i64;
                    let idx = if *index < 0 { len + index } else { *index };
                    if idx < 0 || idx >= len {
                        return None;
                    }
                    &items[idx as usize]
                }
                (LocItem::Index(_), _) => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for AliasPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

/// How a field is looked up during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationAlias {
    /// A single top-level key.
    Name(String),
    /// A single nested path.
    Path(AliasPath),
    /// Alternatives tried in order; the first present one wins.
    Choices(Vec<AliasPath>),
}

impl ValidationAlias {
    /// Alternatives from plain names and paths.
    pub fn choices(choices: impl IntoIterator<Item = impl Into<AliasPath>>) -> Self {
        ValidationAlias::Choices(choices.into_iter().map(Into::into).collect())
    }

    fn paths(&self) -> Vec<AliasPath> {
        match self {
            ValidationAlias::Name(name) => vec![AliasPath::new(name.clone())],
            ValidationAlias::Path(path) => vec![path.clone()],
            ValidationAlias::Choices(paths) => paths.clone(),
        }
    }
}

impl From<&str> for AliasPath {
    fn from(name: &str) -> Self {
        AliasPath::new(name)
    }
}

impl From<&str> for ValidationAlias {
    fn from(name: &str) -> Self {
        ValidationAlias::Name(name.to_string())
    }
}

impl From<String> for ValidationAlias {
    fn from(name: String) -> Self {
        ValidationAlias::Name(name)
    }
}

impl From<AliasPath> for ValidationAlias {
    fn from(path: AliasPath) -> Self {
        ValidationAlias::Path(path)
    }
}

/// Precedence of a field's explicit aliases over a model's generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AliasPriority {
    /// The generator replaces the field's aliases.
    Generated = 1,
    /// The field's explicit aliases win; the generator only fills gaps.
    Explicit = 2,
}

pub type AliasFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type ValidationAliasFn = Arc<dyn Fn(&str) -> ValidationAlias + Send + Sync>;

/// Model-level alias synthesis, bound into the model's config.
#[derive(Clone, Default)]
pub struct AliasGenerator {
    alias: Option<AliasFn>,
    validation_alias: Option<ValidationAliasFn>,
    serialization_alias: Option<AliasFn>,
}

impl AliasGenerator {
    /// A generator producing the shared alias.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            alias: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    /// Adds a generator for validation aliases.
    pub fn validation<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> ValidationAlias + Send + Sync + 'static,
    {
        self.validation_alias = Some(Arc::new(f));
        self
    }

    /// Adds a generator for serialization aliases.
    pub fn serialization<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.serialization_alias = Some(Arc::new(f));
        self
    }

    pub fn camel() -> Self {
        Self::new(to_camel)
    }

    pub fn pascal() -> Self {
        Self::new(to_pascal)
    }

    pub fn snake() -> Self {
        Self::new(to_snake)
    }

    fn generate(&self, name: &str) -> (Option<String>, Option<ValidationAlias>, Option<String>) {
        (
            self.alias.as_ref().map(|f| f(name)),
            self.validation_alias.as_ref().map(|f| f(name)),
            self.serialization_alias.as_ref().map(|f| f(name)),
        )
    }
}

impl fmt::Debug for AliasGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasGenerator")
            .field("alias", &self.alias.is_some())
            .field("validation_alias", &self.validation_alias.is_some())
            .field("serialization_alias", &self.serialization_alias.is_some())
            .finish()
    }
}

/// A field's effective external names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAliases {
    /// Lookup paths in the order they are tried.
    pub validation: Vec<AliasPath>,
    /// The key written when dumping by alias.
    pub serialization: String,
}

/// Computes [`ResolvedAliases`] for fields.
pub struct AliasResolver;

impl AliasResolver {
    /// Resolves one field against an optional model-level generator.
    pub fn resolve(field: &FieldDescriptor, generator: Option<&AliasGenerator>) -> ResolvedAliases {
        let mut alias = field.alias.clone();
        let mut validation = field.validation_alias.clone();
        let mut serialization = field.serialization_alias.clone();

        if let Some(generator) = generator {
            let replace = field
                .alias_priority
                .map_or(true, |p| p == AliasPriority::Generated);
            if replace || alias.is_none() || validation.is_none() || serialization.is_none() {
                let (g_alias, g_validation, g_serialization) = generator.generate(&field.name);
                if replace {
                    if g_alias.is_some() {
                        alias = g_alias.clone();
                    }
                    if let Some(v) = g_validation.clone().or_else(|| g_alias.clone().map(ValidationAlias::Name)) {
                        validation = Some(v);
                    }
                    if let Some(s) = g_serialization.clone().or_else(|| g_alias.clone()) {
                        serialization = Some(s);
                    }
                }
                if alias.is_none() {
                    alias = g_alias.clone();
                }
                if validation.is_none() {
                    validation = g_validation.or_else(|| g_alias.clone().map(ValidationAlias::Name));
                }
                if serialization.is_none() {
                    serialization = g_serialization.or(g_alias);
                }
            }
        }

        let validation = validation
            .map(|v| v.paths())
            .or_else(|| alias.clone().map(|a| vec![AliasPath::new(a)]))
            .unwrap_or_else(|| vec![AliasPath::new(field.name.clone())]);
        let serialization = serialization
            .or(alias)
            .unwrap_or_else(|| field.name.clone());

        ResolvedAliases {
            validation,
            serialization,
        }
    }

    /// Finds the first lookup path present in `input`.
    ///
    /// With `populate_by_name`, the canonical name is tried after the aliases.
    pub fn read<'v>(
        resolved: &ResolvedAliases,
        name: &str,
        populate_by_name: bool,
        input: &'v Value,
    ) -> Option<(AliasPath, &'v Value)> {
        for path in &resolved.validation {
            if let Some(value) = path.lookup(input) {
                return Some((path.clone(), value));
            }
        }
        if populate_by_name {
            let by_name = AliasPath::new(name);
            if let Some(value) = by_name.lookup(input) {
                return Some((by_name, value));
            }
        }
        None
    }
}

fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_cased = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(c);
            prev_cased = false;
        }
    }
    out
}

/// Converts `snake_case` to `PascalCase`.
pub fn to_pascal(snake: &str) -> String {
    let titled: Vec<char> = title_case(snake).chars().collect();
    let mut out = String::with_capacity(titled.len());
    for (i, c) in titled.iter().enumerate() {
        let joins = *c == '_'
            && i > 0
            && titled[i - 1].is_ascii_alphanumeric()
            && titled
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_digit() || n.is_ascii_uppercase());
        if !joins {
            out.push(*c);
        }
    }
    out
}

fn already_camel() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]+[A-Za-z0-9]*$").expect("pattern is valid"))
}

fn digit_then_lower() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[a-z]").expect("pattern is valid"))
}

/// Converts `snake_case` to `camelCase`; strings already in camelCase are
/// returned unchanged.
pub fn to_camel(snake: &str) -> String {
    if already_camel().is_match(snake) && !digit_then_lower().is_match(snake) {
        return snake.to_string();
    }
    let pascal = to_pascal(snake);
    let leading = pascal.chars().take_while(|c| *c == '_').count();
    let mut out = String::with_capacity(pascal.len());
    for (i, c) in pascal.chars().enumerate() {
        if i == leading && c.is_ascii_uppercase() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn snake_rules() -> &'static [(Regex, &'static str); 4] {
    static RULES: OnceLock<[(Regex, &'static str); 4]> = OnceLock::new();
    RULES.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("pattern is valid");
        [
            (compile(r"([A-Z]+)([A-Z][a-z])"), "${1}_${2}"),
            (compile(r"([a-z])([A-Z])"), "${1}_${2}"),
            (compile(r"([0-9])([A-Z])"), "${1}_${2}"),
            (compile(r"([a-z])([0-9])"), "${1}_${2}"),
        ]
    })
}

/// Converts `PascalCase`, `camelCase` or `kebab-case` to `snake_case`.
pub fn to_snake(camel: &str) -> String {
    let mut snake = camel.to_string();
    for (re, replacement) in snake_rules() {
        snake = re.replace_all(&snake, *replacement).into_owned();
    }
    snake.replace('-', "_").to_lowercase()
}
