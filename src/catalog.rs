use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::SmallError;
use crate::field::Type;
use crate::heap_file::HeapFile;
use crate::row::{FieldItem, Schema};

/// One registered table: its schema, optional primary-key field index,
/// and the heap file backing it.
pub struct TableMeta {
    pub name: String,
    pub schema: Arc<Schema>,
    pub pk_field: Option<usize>,
    pub file: Arc<HeapFile>,
}

/// Effectively immutable after startup: concurrent reads are unguarded by
/// the catalog itself (the caller takes a read lock on the whole thing via
/// `Database::catalog()`); registering a new table takes the write lock.
pub struct Catalog {
    tables: HashMap<i32, TableMeta>,
    name_to_id: HashMap<String, i32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            name_to_id: HashMap::new(),
        }
    }

    pub fn add_table(
        &mut self,
        name: &str,
        schema: Schema,
        path: &Path,
        pk_field: Option<usize>,
    ) -> Result<i32, SmallError> {
        let file = HeapFile::open(path, schema)?;
        let table_id = file.table_id();
        let meta = TableMeta {
            name: name.to_string(),
            schema: file.schema().clone(),
            pk_field,
            file: Arc::new(file),
        };
        self.name_to_id.insert(name.to_string(), table_id);
        self.tables.insert(table_id, meta);
        Ok(table_id)
    }

    pub fn get_table(&self, table_id: i32) -> Option<&TableMeta> {
        self.tables.get(&table_id)
    }

    pub fn get_table_id(&self, name: &str) -> Option<i32> {
        self.name_to_id.get(name).copied()
    }

    pub fn get_heap_file(&self, table_id: i32) -> Option<Arc<HeapFile>> {
        self.tables.get(&table_id).map(|t| t.file.clone())
    }

    pub fn get_schema(&self, table_id: i32) -> Option<Arc<Schema>> {
        self.tables.get(&table_id).map(|t| t.schema.clone())
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.name_to_id.clear();
    }
}

/// Parse `name (field1 type1 [pk], field2 type2, …)` lines and register a
/// heap file named `<name>.dat` next to the catalog file for each. Type is
/// `int`/`string`, case-insensitive; `pk` marks the primary key field.
pub fn load_catalog(catalog: &mut Catalog, catalog_path: &Path) -> Result<(), SmallError> {
    let dir = catalog_path.parent().unwrap_or_else(|| Path::new("."));
    let text = fs::read_to_string(catalog_path)?;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        parse_table_line(catalog, dir, line)?;
    }
    Ok(())
}

fn parse_table_line(catalog: &mut Catalog, dir: &Path, line: &str) -> Result<(), SmallError> {
    let open = line
        .find('(')
        .ok_or_else(|| SmallError::db_exception(format!("malformed catalog line: {}", line)))?;
    let close = line
        .rfind(')')
        .ok_or_else(|| SmallError::db_exception(format!("malformed catalog line: {}", line)))?;

    let name = line[..open].trim().to_string();
    let body = &line[open + 1..close];

    let mut fields = Vec::new();
    let mut pk_field = None;
    for (i, part) in body.split(',').enumerate() {
        let mut tokens = part.split_whitespace();
        let field_name = tokens
            .next()
            .ok_or_else(|| SmallError::db_exception(format!("missing field name in: {}", line)))?;
        let type_token = tokens
            .next()
            .ok_or_else(|| SmallError::db_exception(format!("missing field type in: {}", line)))?;
        let field_type = Type::parse(type_token)?;
        if tokens.any(|t| t.eq_ignore_ascii_case("pk")) {
            pk_field = Some(i);
        }
        fields.push(FieldItem::new(field_name, field_type));
    }

    let schema = Schema::new(fields);
    let path = dir.join(format!("{}.dat", name));
    catalog.add_table(&name, schema, &path, pk_field)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_grammar() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.txt");
        fs::write(
            &catalog_path,
            "students (id int pk, name string, age int)\n",
        )
        .unwrap();

        let mut catalog = Catalog::new();
        load_catalog(&mut catalog, &catalog_path).unwrap();

        let id = catalog.get_table_id("students").unwrap();
        let table = catalog.get_table(id).unwrap();
        assert_eq!(table.schema.num_fields(), 3);
        assert_eq!(table.pk_field, Some(0));
        assert_eq!(table.schema.field_type(1), Type::Str);
    }
}
