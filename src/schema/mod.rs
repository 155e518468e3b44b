//! Canonical definitions of the two destination tables.
//!
//! These constants are the single source of truth for column names, order,
//! and minimum widths. DDL, CSV header validation, and bulk inserts are all
//! derived from them.

pub mod reconcile;

/// SQL Server column type, carrying the width the reconciler enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Int,
    NVarChar(u16),
    NVarCharMax,
    Decimal(u8, u8),
    DateTime2,
}

impl SqlType {
    /// DDL fragment for this type, e.g. `NVARCHAR(400)`.
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Int => "INT".to_string(),
            SqlType::NVarChar(len) => format!("NVARCHAR({len})"),
            SqlType::NVarCharMax => "NVARCHAR(MAX)".to_string(),
            SqlType::Decimal(precision, scale) => format!("DECIMAL({precision},{scale})"),
            SqlType::DateTime2 => "DATETIME2".to_string(),
        }
    }
}

/// One column of a destination table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: SqlType,
}

/// A destination table: schema-qualified name plus ordered columns. Column
/// order here is the declared order in CREATE TABLE and the order values
/// are pushed during bulk insert.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub schema: &'static str,
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    /// Bracket-quoted name for use in statements, e.g. `[dbo].[BrandDetail]`.
    pub fn qualified(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }

    /// Ordered column names.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }

    /// CREATE TABLE statement guarded by a schema-qualified existence check,
    /// safe to run on every invocation.
    pub fn create_if_absent_ddl(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("    [{}] {} NULL", column.name, column.ty.ddl()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "IF NOT EXISTS (SELECT 1 FROM sys.tables WHERE name = '{name}' AND schema_id = SCHEMA_ID('{schema}'))\n\
             BEGIN\n\
             CREATE TABLE {qualified} (\n{columns}\n);\n\
             END;",
            name = self.name,
            schema = self.schema,
            qualified = self.qualified(),
        )
    }
}

/// `dbo.BrandDetail`: one row per brand.
pub const BRAND_DETAIL: TableDef = TableDef {
    schema: "dbo",
    name: "BrandDetail",
    columns: &[
        ColumnDef { name: "BRAND_ID", ty: SqlType::Int },
        ColumnDef { name: "BRAND_NAME", ty: SqlType::NVarChar(400) },
        ColumnDef { name: "BRAND_TYPE", ty: SqlType::NVarChar(100) },
        ColumnDef { name: "BRAND_URL_ADDR", ty: SqlType::NVarCharMax },
        ColumnDef { name: "INDUSTRY_NAME", ty: SqlType::NVarChar(200) },
        ColumnDef { name: "SUBINDUSTRY_ID", ty: SqlType::Int },
        ColumnDef { name: "SUBINDUSTRY_NAME", ty: SqlType::NVarChar(200) },
    ],
};

/// `dbo.ConsumerSpendDaily`: one row per brand, state, and day.
pub const CONSUMER_SPEND_DAILY: TableDef = TableDef {
    schema: "dbo",
    name: "ConsumerSpendDaily",
    columns: &[
        ColumnDef { name: "BRAND_ID", ty: SqlType::Int },
        ColumnDef { name: "BRAND_NAME", ty: SqlType::NVarChar(400) },
        ColumnDef { name: "SPEND_AMOUNT", ty: SqlType::Decimal(18, 4) },
        ColumnDef { name: "STATE_ABBR", ty: SqlType::NVarChar(50) },
        ColumnDef { name: "TRANS_COUNT", ty: SqlType::Decimal(18, 4) },
        ColumnDef { name: "TRANS_DATE", ty: SqlType::DateTime2 },
        ColumnDef { name: "VERSION", ty: SqlType::DateTime2 },
    ],
};
