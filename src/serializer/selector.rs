//! Nested include/exclude selectors.

use indexmap::IndexMap;

use crate::path::LocItem;

/// Key that applies its entry to every element.
pub const ALL: &str = "__all__";

/// Which parts of a value a dump includes or excludes.
///
/// `All` selects a whole value. `Nested` selects per key or index, each entry
/// again a selector; the `__all__` key applies to every element and is merged
/// with specific entries. Negative indexes count from the end.
///
/// # Example
///
/// ```rust
/// use schemata::Selector;
/// use serde_json::json;
///
/// // {"user": {"password"}, "items": {"__all__": {"id"}}}
/// let exclude = Selector::new()
///     .key("user", Selector::keys(["password"]))
///     .key("items", Selector::new().key("__all__", Selector::keys(["id"])));
///
/// assert_eq!(Selector::from_json(&json!({
///     "user": ["password"],
///     "items": {"__all__": ["id"]}
/// })), Some(exclude));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    All,
    Nested(IndexMap<LocItem, Selector>),
}

impl Default for Selector {
    fn default() -> Self {
        Selector::new()
    }
}

impl Selector {
    /// An empty nested selector.
    pub fn new() -> Self {
        Selector::Nested(IndexMap::new())
    }

    /// Selects whole values under each of `keys`.
    pub fn keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<LocItem>,
    {
        Selector::Nested(keys.into_iter().map(|k| (k.into(), Selector::All)).collect())
    }

    /// Adds an entry for a mapping key or field name.
    pub fn key(self, key: impl Into<String>, entry: Selector) -> Self {
        self.entry(LocItem::Key(key.into()), entry)
    }

    /// Adds an entry for a sequence index.
    pub fn index(self, index: i64, entry: Selector) -> Self {
        self.entry(LocItem::Index(index), entry)
    }

    fn entry(self, item: LocItem, entry: Selector) -> Self {
        match self {
            Selector::All => Selector::All,
            Selector::Nested(mut map) => {
                let merged = match map.shift_remove(&item) {
                    Some(existing) => merge(Some(&existing), Some(&entry)),
                    None => Some(entry),
                };
                if let Some(merged) = merged {
                    map.insert(item, merged);
                }
                Selector::Nested(map)
            }
        }
    }

    /// Parses the set/dict notation: an array selects whole entries, an
    /// object maps keys to `true` or to a nested selector. Keys that parse
    /// as integers select sequence indexes.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(true) => Some(Selector::All),
            serde_json::Value::Array(items) => {
                let mut map = IndexMap::new();
                for item in items {
                    map.insert(parse_item(item)?, Selector::All);
                }
                Some(Selector::Nested(map))
            }
            serde_json::Value::Object(entries) => {
                let mut map = IndexMap::new();
                for (key, entry) in entries {
                    let item = match key.parse::<i64>() {
                        Ok(index) => LocItem::Index(index),
                        Err(_) => LocItem::Key(key.clone()),
                    };
                    map.insert(item, Selector::from_json(entry)?);
                }
                Some(Selector::Nested(map))
            }
            _ => None,
        }
    }

    /// The merged entry for a mapping key or field name.
    pub(crate) fn for_key(&self, key: &str) -> Option<Selector> {
        match self {
            Selector::All => Some(Selector::All),
            Selector::Nested(map) => merge(
                map.get(&LocItem::Key(key.to_string())),
                map.get(&LocItem::Key(ALL.to_string())),
            ),
        }
    }

    /// The merged entry for element `index` of a sequence of `len` items.
    pub(crate) fn for_index(&self, index: usize, len: usize) -> Option<Selector> {
        match self {
            Selector::All => Some(Selector::All),
            Selector::Nested(map) => {
                let positive = map.get(&LocItem::Index(index as i64));
                let negative = map.get(&LocItem::Index(index as i64 - len as i64));
                let specific = merge(positive, negative);
                merge(specific.as_ref(), map.get(&LocItem::Key(ALL.to_string())))
            }
        }
    }
}

fn parse_item(item: &serde_json::Value) -> Option<LocItem> {
    match item {
        serde_json::Value::String(s) => Some(LocItem::Key(s.clone())),
        serde_json::Value::Number(n) => n.as_i64().map(LocItem::Index),
        _ => None,
    }
}

/// Combines two entries; `All` absorbs anything it is merged with.
fn merge(a: Option<&Selector>, b: Option<&Selector>) -> Option<Selector> {
    match (a, b) {
        (None, None) => None,
        (Some(one), None) | (None, Some(one)) => Some(one.clone()),
        (Some(Selector::All), _) | (_, Some(Selector::All)) => Some(Selector::All),
        (Some(Selector::Nested(left)), Some(Selector::Nested(right))) => {
            let mut merged = left.clone();
            for (key, entry) in right {
                let combined = merge(merged.get(key), Some(entry));
                if let Some(combined) = combined {
                    merged.insert(key.clone(), combined);
                }
            }
            Some(Selector::Nested(merged))
        }
    }
}

/// The include and exclude selectors in effect at one level of a dump.
#[derive(Debug, Clone, Default)]
pub(crate) struct Filters {
    include: Option<Selector>,
    exclude: Option<Selector>,
}

impl Filters {
    pub(crate) fn new(include: Option<Selector>, exclude: Option<Selector>) -> Self {
        let include = include.filter(|s| *s != Selector::All);
        Self { include, exclude }
    }

    /// Filters for a child, or `None` when the child is not emitted.
    pub(crate) fn child<F>(&self, lookup: F) -> Option<Filters>
    where
        F: Fn(&Selector) -> Option<Selector>,
    {
        let exclude = match &self.exclude {
            None => None,
            Some(selector) => match lookup(selector) {
                Some(Selector::All) => return None,
                other => other,
            },
        };
        let include = match &self.include {
            None => None,
            Some(selector) => match lookup(selector) {
                None => return None,
                Some(Selector::All) => None,
                nested => nested,
            },
        };
        Some(Filters { include, exclude })
    }

    pub(crate) fn for_key(&self, key: &str) -> Option<Filters> {
        self.child(|s| s.for_key(key))
    }

    pub(crate) fn for_index(&self, index: usize, len: usize) -> Option<Filters> {
        self.child(|s| s.for_index(index, len))
    }
}
