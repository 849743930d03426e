use super::error::{StorageError, StorageResult};
use super::heap_page::HeapPageId;
use super::schema::TupleDesc;
use super::value::Field;
use std::fmt;
use std::sync::Arc;

/// Physical location of a tuple: the page it lives on plus its slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: HeapPageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: HeapPageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row: a schema, one field per column, and (once it lives on a page) the
/// location it was read from.
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

/// Tuples compare by schema and values; where a copy happens to live on
/// disk does not make it a different row.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl Tuple {
    /// Create a tuple, validating the fields against the schema.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> StorageResult<Self> {
        if fields.len() != desc.num_fields() {
            return Err(StorageError::SchemaMismatch(format!(
                "expected {} fields, got {}",
                desc.num_fields(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = desc.field_type(i).unwrap();
            if field.type_of() != expected {
                return Err(StorageError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: field.type_of().to_string(),
                });
            }
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Replace the field at index `i`. The new value must keep the schema.
    pub fn set_field(&mut self, i: usize, value: Field) -> StorageResult<()> {
        let expected = self
            .desc
            .field_type(i)
            .ok_or(StorageError::InvalidSlot(i))?;
        if value.type_of() != expected {
            return Err(StorageError::TypeMismatch {
                expected: expected.to_string(),
                actual: value.type_of().to_string(),
            });
        }
        self.fields[i] = value;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Append the fixed-width encoding of every field to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            field.serialize(out);
        }
    }

    /// Decode one tuple from the front of `data` according to `desc`.
    pub fn deserialize(desc: Arc<TupleDesc>, data: &[u8]) -> StorageResult<Tuple> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for item in desc.items() {
            let field = Field::deserialize(item.field_type, &data[offset..])?;
            offset += item.field_type.size();
            fields.push(field);
        }
        Ok(Tuple {
            desc,
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.fields {
            if !first {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Type;

    fn int_pair_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::from_types(vec![Type::Int, Type::Int]))
    }

    #[test]
    fn test_new_validates_arity() {
        let desc = int_pair_desc();
        let result = Tuple::new(desc, vec![Field::Int(1)]);
        assert!(matches!(result, Err(StorageError::SchemaMismatch(_))));
    }

    #[test]
    fn test_new_validates_types() {
        let desc = int_pair_desc();
        let result = Tuple::new(desc, vec![Field::Int(1), Field::Str("x".to_string())]);
        assert!(matches!(result, Err(StorageError::TypeMismatch { .. })));
    }

    #[test]
    fn test_set_field() {
        let desc = int_pair_desc();
        let mut t = Tuple::new(desc, vec![Field::Int(1), Field::Int(2)]).unwrap();
        t.set_field(1, Field::Int(7)).unwrap();
        assert_eq!(t.field(1), Some(&Field::Int(7)));
        assert!(t.set_field(0, Field::Str("no".to_string())).is_err());
        assert!(t.set_field(5, Field::Int(0)).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let desc = Arc::new(TupleDesc::from_types(vec![Type::Int, Type::String]));
        let t = Tuple::new(
            desc.clone(),
            vec![Field::Int(-3), Field::Str("abc".to_string())],
        )
        .unwrap();
        let mut buf = Vec::new();
        t.serialize(&mut buf);
        assert_eq!(buf.len(), desc.tuple_size());
        let back = Tuple::deserialize(desc, &buf).unwrap();
        assert_eq!(back.fields(), t.fields());
    }
}
