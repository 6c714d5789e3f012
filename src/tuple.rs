use std::fmt;
use std::sync::Arc;

use crate::error::SmallError;
use crate::field::Field;
use crate::page_id::RecordId;
use crate::row::Schema;

/// A vector of fields conforming to a [`Schema`], plus an optional record
/// identity. Created by a schema; mutable field-by-field. A tuple read
/// from disk always carries a record identity; tuples produced by
/// operators above storage may carry none.
#[derive(Clone, Debug)]
pub struct Tuple {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// A tuple of default (zero/empty) values for each field of `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|f| match f.field_type {
                crate::field::Type::Int => Field::Int(0),
                crate::field::Type::Str => Field::Str(String::new()),
            })
            .collect();
        Self {
            schema,
            fields,
            rid: None,
        }
    }

    pub fn from_fields(schema: Arc<Schema>, fields: Vec<Field>) -> Self {
        debug_assert_eq!(schema.num_fields(), fields.len());
        Self {
            schema,
            fields,
            rid: None,
        }
    }

    /// Decode a tuple from its fixed-width on-disk byte layout.
    pub fn decode(schema: Arc<Schema>, bytes: &[u8]) -> Self {
        let mut fields = Vec::with_capacity(schema.num_fields());
        let mut offset = 0;
        for item in schema.fields() {
            let width = item.field_type.width();
            fields.push(item.field_type.parse_field(&bytes[offset..offset + width]));
            offset += width;
        }
        Self {
            schema,
            fields,
            rid: None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.schema.byte_size());
        for field in &self.fields {
            bytes.extend(field.to_bytes());
        }
        bytes
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn get_field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn set_field(&mut self, i: usize, value: Field) -> Result<(), SmallError> {
        if value.field_type() != self.schema.field_type(i) {
            return Err(SmallError::db_exception(format!(
                "field {} type mismatch: expected {:?}, got {:?}",
                i,
                self.schema.field_type(i),
                value.field_type()
            )));
        }
        self.fields[i] = value;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }

    pub fn merge(left: &Tuple, right: &Tuple) -> Tuple {
        let schema = Arc::new(Schema::merge(&left.schema, &right.schema));
        let mut fields = Vec::with_capacity(left.fields.len() + right.fields.len());
        fields.extend(left.fields.iter().cloned());
        fields.extend(right.fields.iter().cloned());
        Tuple {
            schema,
            fields,
            rid: None,
        }
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|c| c.to_string()).collect();
        // field count, not byte size, is the correct measure here.
        write!(f, "{{{}}} ({} fields)", parts.join(", "), self.fields.len())
    }
}
