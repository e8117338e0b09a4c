//! Database schema definitions
//!
//! The schema is an ordinary value built once and handed to the `Store`
//! and every `Session`. Nothing registers itself globally.

use crate::{Error, Result};

/// Column storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: SqlType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    fn new(name: &'static str, ty: SqlType) -> Self {
        Self {
            name,
            ty,
            primary_key: false,
            not_null: false,
            unique: false,
            references: None,
        }
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, SqlType::Integer)
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, SqlType::Text)
    }

    /// Integer primary keys alias the rowid, so SQLite generates them
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, table: &'static str, column: &'static str) -> Self {
        self.references = Some(ForeignKey { table, column });
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.ty.as_str());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(fk) = &self.references {
            // Checked at COMMIT so a unit-of-work can insert in any order
            sql.push_str(&format!(
                " REFERENCES {}({}) DEFERRABLE INITIALLY DEFERRED",
                fk.table, fk.column
            ));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: &'static str) -> Self {
        Self { name, columns: Vec::new() }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Tables this one points at, excluding itself
    pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|fk| fk.table))
            .filter(move |t| *t != self.name)
    }

    /// SQL to create this table
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| format!("    {}", c.to_sql())).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            columns.join(",\n")
        )
    }
}

/// The set of tables a store holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }

    /// People and the websites they visit.
    ///
    /// `person` is declared before `websites`; `creation_order` sorts that out.
    pub fn visitors() -> Self {
        Self::new()
            .table(
                TableDef::new("person")
                    .column(ColumnDef::integer("id").primary_key())
                    .column(ColumnDef::text("name").not_null().unique())
                    .column(ColumnDef::integer("website_id").references("websites", "id")),
            )
            .table(
                TableDef::new("websites")
                    .column(ColumnDef::integer("id").primary_key())
                    .column(ColumnDef::text("url").not_null()),
            )
    }

    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Tables ordered so every referenced table comes before the tables
    /// that reference it. Declaration order is kept otherwise.
    pub fn creation_order(&self) -> Result<Vec<&TableDef>> {
        for table in &self.tables {
            if let Some(missing) = table.dependencies().find(|dep| !self.contains(dep)) {
                return Err(Error::UnknownTable(missing.to_string()));
            }
        }

        let mut ordered: Vec<&TableDef> = Vec::with_capacity(self.tables.len());
        let mut remaining: Vec<&TableDef> = self.tables.iter().collect();

        while !remaining.is_empty() {
            let before = remaining.len();
            let mut i = 0;
            while i < remaining.len() {
                let ready = remaining[i]
                    .dependencies()
                    .all(|dep| ordered.iter().any(|t| t.name == dep));
                if ready {
                    ordered.push(remaining.remove(i));
                } else {
                    i += 1;
                }
            }
            if remaining.len() == before {
                let cycle: Vec<&str> = remaining.iter().map(|t| t.name).collect();
                return Err(Error::SchemaCycle(cycle.join(", ")));
            }
        }

        Ok(ordered)
    }

    /// All schema creation statements, in creation order
    pub fn all_schema_statements(&self) -> Result<Vec<String>> {
        Ok(self.creation_order()?.into_iter().map(TableDef::create_sql).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_table_created_first() {
        let schema = Schema::visitors();
        let order: Vec<_> = schema.creation_order().unwrap().iter().map(|t| t.name).collect();
        assert_eq!(order, vec!["websites", "person"]);
    }

    #[test]
    fn test_person_ddl() {
        let schema = Schema::visitors();
        let sql = schema.get("person").unwrap().create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS person ("));
        assert!(sql.contains("id INTEGER PRIMARY KEY"));
        assert!(sql.contains("name TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("website_id INTEGER REFERENCES websites(id) DEFERRABLE INITIALLY DEFERRED"));
    }

    #[test]
    fn test_undeclared_reference_rejected() {
        let schema = Schema::new().table(
            TableDef::new("person").column(ColumnDef::integer("website_id").references("websites", "id")),
        );
        assert!(matches!(schema.creation_order(), Err(Error::UnknownTable(t)) if t == "websites"));
    }

    #[test]
    fn test_cycle_rejected() {
        let schema = Schema::new()
            .table(TableDef::new("a").column(ColumnDef::integer("b_id").references("b", "id")))
            .table(TableDef::new("b").column(ColumnDef::integer("a_id").references("a", "id")));
        let err = schema.creation_order().unwrap_err();
        assert!(matches!(&err, Error::SchemaCycle(t) if t == "a, b"), "{:?}", err);
        assert_eq!(err.to_string(), "Circular table references: a, b");
    }

    #[test]
    fn test_self_reference_allowed() {
        let schema = Schema::new().table(
            TableDef::new("node")
                .column(ColumnDef::integer("id").primary_key())
                .column(ColumnDef::integer("parent_id").references("node", "id")),
        );
        assert_eq!(schema.all_schema_statements().unwrap().len(), 1);
    }
}
