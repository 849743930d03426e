use super::value::Type;
use std::hash::{Hash, Hasher};

/// One column of a schema: a type plus an optional name.
#[derive(Debug, Clone)]
pub struct TdItem {
    pub field_type: Type,
    pub name: Option<String>,
}

/// Ordered description of the columns of a relation.
///
/// Two descriptors are equal iff their type sequences match elementwise;
/// names never participate in equality or hashing.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Build a descriptor from parallel type and name sequences.
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Self {
        debug_assert_eq!(types.len(), names.len());
        let items = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| TdItem { field_type, name })
            .collect();
        Self { items }
    }

    /// Build an anonymous descriptor from types alone.
    pub fn from_types(types: Vec<Type>) -> Self {
        let names = vec![None; types.len()];
        Self::new(types, names)
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.items.get(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i).and_then(|item| item.name.as_deref())
    }

    /// Index of the first field with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name.as_deref() == Some(name))
    }

    /// Serialized size of one tuple with this schema, in bytes.
    pub fn tuple_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.size()).sum()
    }

    /// Concatenate two descriptors, left columns first.
    pub fn combine(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut items = left.items.clone();
        items.extend(right.items.iter().cloned());
        TupleDesc { items }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl Hash for TupleDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for item in &self.items {
            item.field_type.hash(state);
        }
    }
}
