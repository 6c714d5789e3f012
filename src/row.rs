use std::fmt;

use crate::field::Type;

/// One column of a [`Schema`]: its type, and an informational name used
/// only for display/aliasing — schema equality ignores it.
#[derive(Clone, Debug)]
pub struct FieldItem {
    pub field_type: Type,
    pub field_name: String,
}

impl FieldItem {
    pub fn new(field_name: &str, field_type: Type) -> Self {
        Self {
            field_type,
            field_name: field_name.to_string(),
        }
    }
}

impl PartialEq for FieldItem {
    fn eq(&self, other: &Self) -> bool {
        self.field_type == other.field_type
    }
}

/// A tuple descriptor: an ordered sequence of (type, optional name) pairs.
/// All tuples of a table share exactly one schema. Equality compares only
/// the type sequence; field count is always >= 1 for a usable schema.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: Vec<FieldItem>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Schema {
    pub fn new(fields: Vec<FieldItem>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldItem] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> Type {
        self.fields[i].field_type
    }

    pub fn field_name(&self, i: usize) -> &str {
        &self.fields[i].field_name
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.field_name == name)
    }

    /// Sum of per-type fixed widths; the byte size of one tuple of this
    /// schema as laid out on a page.
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.width()).sum()
    }

    /// Concatenate two schemas into a joined schema; field count of the
    /// result is the sum of both operands' field counts.
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let mut fields = Vec::with_capacity(left.fields.len() + right.fields.len());
        fields.extend(left.fields.iter().cloned());
        fields.extend(right.fields.iter().cloned());
        Schema { fields }
    }

    /// A copy of this schema with every field renamed to `alias.fieldName`,
    /// used by sequential scan to disambiguate self-joins.
    pub fn with_alias(&self, alias: &str) -> Schema {
        let fields = self
            .fields
            .iter()
            .map(|f| FieldItem::new(&format!("{}.{}", alias, f.field_name), f.field_type))
            .collect();
        Schema { fields }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{}({:?})", field.field_name, field.field_type))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Build a schema of `number` INT columns named `{name_prefix}{i}`, the way
/// test fixtures across this crate construct ad hoc tables.
pub fn simple_int_schema(number: usize, name_prefix: &str) -> Schema {
    let fields = (0..number)
        .map(|i| FieldItem::new(&format!("{}{}", name_prefix, i), Type::Int))
        .collect();
    Schema::new(fields)
}
