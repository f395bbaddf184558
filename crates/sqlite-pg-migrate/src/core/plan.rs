//! Per-table column planning.
//!
//! A [`TablePlan`] is the intersection of destination and source columns,
//! ordered by the destination. It carries everything the writer needs to
//! build the INSERT and everything the orchestrator needs to report what was
//! dropped.

use serde::{Deserialize, Serialize};

use super::schema::TargetColumn;
use super::value::{coerce_bool, BooleanColumns, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// One column written by the INSERT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedColumn {
    /// Column name, identical on both sides.
    pub name: String,

    /// Position of the column in the source row.
    pub source_index: usize,

    /// Cast applied to the text parameter (`"pg_catalog"."int4"`).
    pub cast_type: String,

    /// Apply 0/1 to boolean coercion on write.
    pub coerce_bool: bool,
}

impl PlannedColumn {
    /// Convert a raw source value for this column.
    ///
    /// Boolean columns map NULL to NULL and anything else to its truthiness;
    /// every other column passes the value through.
    pub fn convert_value(&self, value: SqlValue) -> SqlValue {
        if self.coerce_bool {
            coerce_bool(value)
        } else {
            value
        }
    }
}

/// Column plan for a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlan {
    pub table: String,

    /// Common columns, in destination order.
    pub columns: Vec<PlannedColumn>,

    /// Source columns with no destination counterpart (dropped).
    pub source_only: Vec<String>,

    /// Destination columns with no source counterpart (left to default/NULL).
    pub destination_only: Vec<String>,

    /// Source columns matching a generated destination column (never written).
    pub skipped_generated: Vec<String>,

    /// Destination-only columns that are NOT NULL without a default.
    pub missing_required: Vec<String>,

    /// An inserted column is `GENERATED ALWAYS AS IDENTITY`.
    pub overriding_system_value: bool,
}

impl TablePlan {
    /// Plan the column mapping for `table`.
    pub fn build(
        table: &str,
        target_columns: &[TargetColumn],
        source_columns: &[String],
        booleans: &BooleanColumns,
    ) -> Result<Self> {
        let mut columns = Vec::new();
        let mut destination_only = Vec::new();
        let mut skipped_generated = Vec::new();
        let mut missing_required = Vec::new();
        let mut overriding_system_value = false;

        for col in target_columns {
            let source_index = source_columns.iter().position(|s| s == &col.name);

            match source_index {
                Some(_) if col.is_generated => skipped_generated.push(col.name.clone()),
                Some(source_index) => {
                    overriding_system_value |= col.identity_always;
                    columns.push(PlannedColumn {
                        name: col.name.clone(),
                        source_index,
                        cast_type: col.cast_type()?,
                        coerce_bool: booleans.contains(&col.name),
                    });
                }
                None => {
                    if col.is_required() {
                        missing_required.push(col.name.clone());
                    }
                    destination_only.push(col.name.clone());
                }
            }
        }

        let source_only = source_columns
            .iter()
            .filter(|s| !target_columns.iter().any(|c| &c.name == *s))
            .cloned()
            .collect();

        Ok(Self {
            table: table.to_string(),
            columns,
            source_only,
            destination_only,
            skipped_generated,
            missing_required,
            overriding_system_value,
        })
    }

    /// Fail if the INSERT would leave a required column without a value.
    pub fn ensure_required_columns(&self) -> Result<()> {
        match self.missing_required.first() {
            Some(column) => Err(MigrateError::RequiredColumnMissing {
                table: self.table.clone(),
                column: column.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Names of the inserted columns, in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Project a source row onto the planned columns, converting booleans.
    pub fn project(&self, mut row: Row) -> Row {
        self.columns
            .iter()
            .map(|col| {
                let value = row
                    .get_mut(col.source_index)
                    .map(|v| std::mem::replace(v, SqlValue::Null))
                    .unwrap_or(SqlValue::Null);
                col.convert_value(value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn comments_target() -> Vec<TargetColumn> {
        vec![
            TargetColumn::new("Id", "int4").identity(),
            TargetColumn::new("PostId", "int4").not_null(),
            TargetColumn::new("Content", "text").not_null(),
            TargetColumn::new("IsApproved", "bool"),
            TargetColumn::new("CreatedAt", "timestamptz")
                .not_null()
                .with_default(),
        ]
    }

    #[test]
    fn test_common_columns_follow_destination_order() {
        let source = names(&["Content", "Id", "IsApproved", "PostId"]);
        let plan = TablePlan::build(
            "Comments",
            &comments_target(),
            &source,
            &BooleanColumns::new(["IsApproved"]),
        )
        .unwrap();

        assert_eq!(
            plan.column_names(),
            vec!["Id", "PostId", "Content", "IsApproved"]
        );
        assert_eq!(plan.columns[0].source_index, 1);
        assert_eq!(plan.columns[2].source_index, 0);
        assert!(plan.columns[3].coerce_bool);
        assert!(!plan.columns[0].coerce_bool);
        assert_eq!(plan.destination_only, names(&["CreatedAt"]));
        assert!(plan.missing_required.is_empty());
        assert!(plan.ensure_required_columns().is_ok());
    }

    #[test]
    fn test_source_only_columns_are_reported() {
        let source = names(&["Id", "PostId", "Content", "LegacyFlag", "OldScore"]);
        let plan = TablePlan::build(
            "Comments",
            &comments_target(),
            &source,
            &BooleanColumns::default(),
        )
        .unwrap();

        assert_eq!(plan.source_only, names(&["LegacyFlag", "OldScore"]));
        assert_eq!(plan.column_names(), vec!["Id", "PostId", "Content"]);
    }

    #[test]
    fn test_destination_only_nullable_column_is_not_required() {
        let target = vec![
            TargetColumn::new("Id", "int4").identity(),
            TargetColumn::new("Name", "text").not_null(),
            TargetColumn::new("legacy_note", "text"),
        ];
        let plan = TablePlan::build(
            "Categories",
            &target,
            &names(&["Id", "Name"]),
            &BooleanColumns::default(),
        )
        .unwrap();

        assert_eq!(plan.destination_only, names(&["legacy_note"]));
        assert!(plan.source_only.is_empty());
        assert!(plan.ensure_required_columns().is_ok());
    }

    #[test]
    fn test_required_destination_only_column_fails() {
        let target = vec![
            TargetColumn::new("Id", "int4").identity(),
            TargetColumn::new("Slug", "varchar").not_null(),
        ];
        let plan = TablePlan::build(
            "Posts",
            &target,
            &names(&["Id"]),
            &BooleanColumns::default(),
        )
        .unwrap();

        assert_eq!(plan.missing_required, names(&["Slug"]));
        match plan.ensure_required_columns() {
            Err(MigrateError::RequiredColumnMissing { table, column }) => {
                assert_eq!(table, "Posts");
                assert_eq!(column, "Slug");
            }
            other => panic!("expected RequiredColumnMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_generated_columns_are_never_written() {
        let mut search = TargetColumn::new("SearchVector", "tsvector");
        search.is_generated = true;
        let target = vec![TargetColumn::new("Id", "int4").identity(), search];
        let plan = TablePlan::build(
            "Posts",
            &target,
            &names(&["Id", "SearchVector"]),
            &BooleanColumns::default(),
        )
        .unwrap();

        assert_eq!(plan.column_names(), vec!["Id"]);
        assert_eq!(plan.skipped_generated, names(&["SearchVector"]));
        assert!(plan.source_only.is_empty());
        assert!(plan.missing_required.is_empty());
    }

    #[test]
    fn test_identity_always_requests_override() {
        let mut id = TargetColumn::new("Id", "int8").identity();
        id.identity_always = true;
        let plan = TablePlan::build(
            "Users",
            &[id.clone()],
            &names(&["Id"]),
            &BooleanColumns::default(),
        )
        .unwrap();
        assert!(plan.overriding_system_value);

        let plan = TablePlan::build("Users", &[id], &names(&[]), &BooleanColumns::default())
            .unwrap();
        assert!(!plan.overriding_system_value);
    }

    #[test]
    fn test_project_reorders_and_converts() {
        let source = names(&["IsApproved", "Content", "Id", "PostId", "Extra"]);
        let plan = TablePlan::build(
            "Comments",
            &comments_target(),
            &source,
            &BooleanColumns::new(["IsApproved"]),
        )
        .unwrap();

        let row = vec![
            SqlValue::Integer(1),
            SqlValue::Text("hi".into()),
            SqlValue::Integer(7),
            SqlValue::Integer(3),
            SqlValue::Text("dropped".into()),
        ];
        assert_eq!(
            plan.project(row),
            vec![
                SqlValue::Integer(7),
                SqlValue::Integer(3),
                SqlValue::Text("hi".into()),
                SqlValue::Bool(true),
            ]
        );
    }

    #[test]
    fn test_convert_value_only_touches_boolean_columns() {
        let plan = TablePlan::build(
            "Comments",
            &comments_target(),
            &names(&["Id", "IsApproved"]),
            &BooleanColumns::new(["IsApproved"]),
        )
        .unwrap();
        let (id, approved) = (&plan.columns[0], &plan.columns[1]);

        assert_eq!(id.convert_value(SqlValue::Integer(0)), SqlValue::Integer(0));
        assert_eq!(approved.convert_value(SqlValue::Integer(0)), SqlValue::Bool(false));
        assert_eq!(approved.convert_value(SqlValue::Integer(1)), SqlValue::Bool(true));
        assert_eq!(approved.convert_value(SqlValue::Null), SqlValue::Null);
    }

    #[test]
    fn test_cast_type_is_quoted() {
        let plan = TablePlan::build(
            "T",
            &[TargetColumn::new("At", "timestamptz")],
            &names(&["At"]),
            &BooleanColumns::default(),
        )
        .unwrap();
        assert_eq!(plan.columns[0].cast_type, "\"pg_catalog\".\"timestamptz\"");
    }
}
