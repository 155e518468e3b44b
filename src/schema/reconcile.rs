//! Create-if-absent plus widen-in-place reconciliation.
//!
//! Widening is one-way: a column narrower than the canonical minimum is
//! altered up to it, a column already at or past the minimum is left alone.

use tracing::{debug, info};

use super::{SqlType, TableDef};
use crate::connect::{rollback_quietly, SqlClient};
use crate::error::{PipelineError, Result};

/// Reconcile every table in order. Each table runs in its own transaction.
pub async fn ensure_tables(client: &mut SqlClient, tables: &[TableDef]) -> Result<()> {
    for table in tables {
        ensure_table(client, table).await?;
    }
    Ok(())
}

/// Bring one table up to the canonical definition: create it when absent,
/// widen any narrower NVARCHAR column in place. Both steps run inside one
/// explicit transaction so a rejected statement leaves nothing half-applied.
pub async fn ensure_table(client: &mut SqlClient, table: &TableDef) -> Result<()> {
    match apply(client, table).await {
        Ok(widened) => {
            info!(table = table.name, widened, "schema reconciled");
            Ok(())
        }
        Err(source) => {
            rollback_quietly(client).await;
            Err(PipelineError::SchemaReconciliation {
                table: table.name,
                source,
            })
        }
    }
}

async fn apply(
    client: &mut SqlClient,
    table: &TableDef,
) -> std::result::Result<usize, tiberius::error::Error> {
    batch(client, "BEGIN TRAN").await?;
    batch(client, &table.create_if_absent_ddl()).await?;

    let widths = declared_widths(client, table).await?;
    let statements = plan_widening(table, &widths);
    for statement in &statements {
        debug!(table = table.name, %statement, "widening column");
        batch(client, statement).await?;
    }

    batch(client, "COMMIT TRAN").await?;
    Ok(statements.len())
}

/// Run one statement batch and drain its results. `simple_query` keeps
/// BEGIN TRAN / COMMIT on the session, which `execute`'s sp_executesql
/// wrapping would not.
async fn batch(client: &mut SqlClient, sql: &str) -> std::result::Result<(), tiberius::error::Error> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}

/// Character capacities of the table's existing columns, from
/// INFORMATION_SCHEMA: `Some(n)` for NVARCHAR(n), `Some(-1)` for
/// NVARCHAR(MAX), `None` for non-character columns.
async fn declared_widths(
    client: &mut SqlClient,
    table: &TableDef,
) -> std::result::Result<Vec<(String, Option<i32>)>, tiberius::error::Error> {
    let rows = client
        .query(
            "SELECT COLUMN_NAME, CHARACTER_MAXIMUM_LENGTH \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
             ORDER BY ORDINAL_POSITION",
            &[&table.schema, &table.name],
        )
        .await?
        .into_first_result()
        .await?;

    let mut widths = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row.try_get::<&str, _>(0)?.unwrap_or_default().to_string();
        let capacity = row.try_get::<i32, _>(1)?;
        widths.push((name, capacity));
    }
    Ok(widths)
}

/// ALTER statements needed to bring `existing` columns up to the canonical
/// minimum widths. Columns at or beyond the minimum produce nothing, so the
/// plan is empty on a reconciled table.
fn plan_widening(table: &TableDef, existing: &[(String, Option<i32>)]) -> Vec<String> {
    let mut statements = Vec::new();
    for column in table.columns {
        let capacity = existing
            .iter()
            .find(|(name, _)| name.as_str() == column.name)
            .and_then(|(_, capacity)| *capacity);
        let capacity = match capacity {
            Some(capacity) => capacity,
            None => continue,
        };
        match column.ty {
            SqlType::NVarChar(min) => {
                if capacity != -1 && capacity < i32::from(min) {
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN [{}] NVARCHAR({}) NULL",
                        table.qualified(),
                        column.name,
                        min
                    ));
                }
            }
            SqlType::NVarCharMax => {
                if capacity != -1 {
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN [{}] NVARCHAR(MAX) NULL",
                        table.qualified(),
                        column.name
                    ));
                }
            }
            _ => {}
        }
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BRAND_DETAIL;

    fn widths(pairs: &[(&str, Option<i32>)]) -> Vec<(String, Option<i32>)> {
        pairs
            .iter()
            .map(|(name, capacity)| (name.to_string(), *capacity))
            .collect()
    }

    #[test]
    fn narrow_column_is_widened_to_minimum() {
        let existing = widths(&[("BRAND_NAME", Some(100))]);
        let plan = plan_widening(&BRAND_DETAIL, &existing);
        assert_eq!(
            plan,
            vec!["ALTER TABLE [dbo].[BrandDetail] ALTER COLUMN [BRAND_NAME] NVARCHAR(400) NULL"]
        );
    }

    #[test]
    fn column_at_minimum_is_left_alone() {
        let existing = widths(&[("BRAND_NAME", Some(400))]);
        assert!(plan_widening(&BRAND_DETAIL, &existing).is_empty());
    }

    #[test]
    fn wider_column_is_never_narrowed() {
        let existing = widths(&[("BRAND_TYPE", Some(4000)), ("BRAND_NAME", Some(-1))]);
        assert!(plan_widening(&BRAND_DETAIL, &existing).is_empty());
    }

    #[test]
    fn bounded_url_column_is_widened_to_max() {
        let existing = widths(&[("BRAND_URL_ADDR", Some(1000))]);
        let plan = plan_widening(&BRAND_DETAIL, &existing);
        assert_eq!(
            plan,
            vec!["ALTER TABLE [dbo].[BrandDetail] ALTER COLUMN [BRAND_URL_ADDR] NVARCHAR(MAX) NULL"]
        );
    }

    #[test]
    fn url_column_already_max_is_left_alone() {
        let existing = widths(&[("BRAND_URL_ADDR", Some(-1))]);
        assert!(plan_widening(&BRAND_DETAIL, &existing).is_empty());
    }

    #[test]
    fn non_character_columns_are_ignored() {
        let existing = widths(&[("BRAND_ID", None), ("SUBINDUSTRY_ID", None)]);
        assert!(plan_widening(&BRAND_DETAIL, &existing).is_empty());
    }

    #[test]
    fn multiple_narrow_columns_all_get_statements() {
        let existing = widths(&[
            ("BRAND_NAME", Some(50)),
            ("BRAND_TYPE", Some(20)),
            ("BRAND_URL_ADDR", Some(500)),
            ("INDUSTRY_NAME", Some(200)),
        ]);
        let plan = plan_widening(&BRAND_DETAIL, &existing);
        assert_eq!(plan.len(), 3);
        assert!(plan[0].contains("[BRAND_NAME] NVARCHAR(400)"));
        assert!(plan[1].contains("[BRAND_TYPE] NVARCHAR(100)"));
        assert!(plan[2].contains("[BRAND_URL_ADDR] NVARCHAR(MAX)"));
    }

    #[test]
    fn fresh_table_needs_no_widening() {
        // a just-created table reports exactly the canonical widths
        let existing = widths(&[
            ("BRAND_ID", None),
            ("BRAND_NAME", Some(400)),
            ("BRAND_TYPE", Some(100)),
            ("BRAND_URL_ADDR", Some(-1)),
            ("INDUSTRY_NAME", Some(200)),
            ("SUBINDUSTRY_ID", None),
            ("SUBINDUSTRY_NAME", Some(200)),
        ]);
        assert!(plan_widening(&BRAND_DETAIL, &existing).is_empty());
    }

    #[tokio::test]
    #[ignore = "requires AZ_* SQL Server environment"]
    async fn ensure_tables_is_idempotent_against_live_server() -> anyhow::Result<()> {
        use crate::config::Config;
        use crate::schema::CONSUMER_SPEND_DAILY;

        let config = Config::from_env()?;
        let mut client = crate::connect::connect(&config).await?;
        ensure_tables(&mut client, &[BRAND_DETAIL, CONSUMER_SPEND_DAILY]).await?;
        ensure_tables(&mut client, &[BRAND_DETAIL, CONSUMER_SPEND_DAILY]).await?;
        client.close().await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires AZ_* SQL Server environment"]
    async fn narrowed_table_is_widened_back_and_loads_long_urls() -> anyhow::Result<()> {
        use crate::config::Config;
        use crate::load::{insert, BrandDetail};

        let config = Config::from_env()?;
        let mut client = crate::connect::connect(&config).await?;
        ensure_table(&mut client, &BRAND_DETAIL).await?;

        // narrow two columns behind the reconciler's back
        for statement in [
            "TRUNCATE TABLE [dbo].[BrandDetail]",
            "ALTER TABLE [dbo].[BrandDetail] ALTER COLUMN [BRAND_NAME] NVARCHAR(50) NULL",
            "ALTER TABLE [dbo].[BrandDetail] ALTER COLUMN [BRAND_URL_ADDR] NVARCHAR(100) NULL",
        ] {
            batch(&mut client, statement).await?;
        }

        ensure_table(&mut client, &BRAND_DETAIL).await?;

        let widths = declared_widths(&mut client, &BRAND_DETAIL).await?;
        let capacity = |name: &str| {
            widths
                .iter()
                .find(|(column, _)| column.as_str() == name)
                .and_then(|(_, capacity)| *capacity)
        };
        assert_eq!(capacity("BRAND_NAME"), Some(400));
        assert_eq!(capacity("BRAND_URL_ADDR"), Some(-1));

        // a URL far past the narrowed width must survive the load untruncated
        let long_url = format!("https://shop.example.net/catalog?tail={}", "x".repeat(4000));
        let rows = vec![BrandDetail {
            brand_id: Some(1),
            brand_name: Some("Widened Brand".to_string()),
            brand_type: None,
            brand_url_addr: Some(long_url.clone()),
            industry_name: None,
            subindustry_id: None,
            subindustry_name: None,
        }];
        let inserted = insert::replace_all(&mut client, &BRAND_DETAIL, &rows).await?;
        assert_eq!(inserted, 1);

        let row = client
            .simple_query("SELECT CAST(LEN(BRAND_URL_ADDR) AS INT) FROM [dbo].[BrandDetail]")
            .await?
            .into_row()
            .await?;
        let stored_len = match row {
            Some(row) => row.try_get::<i32, _>(0)?,
            None => None,
        };
        assert_eq!(stored_len, Some(long_url.len() as i32));
        client.close().await?;
        Ok(())
    }
}
