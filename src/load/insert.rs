//! Atomic replacement of a table's contents via truncate plus chunked
//! bulk insert, all inside one explicit transaction.

use tiberius::TokenRow;
use tracing::{debug, info};

use crate::connect::{rollback_quietly, SqlClient};
use crate::error::{PipelineError, Result};
use crate::schema::TableDef;

/// Rows sent per bulk-load request.
pub const INSERT_CHUNK_ROWS: usize = 5_000;

/// Conversion into a TDS row. Values must be pushed in the table's declared
/// column order.
pub trait ToTokenRow {
    fn to_token_row(&self) -> TokenRow<'_>;
}

/// Replace the full contents of `table` with `rows`.
///
/// Truncate and every insert chunk share one transaction, so concurrent
/// readers observe either the previous contents or the new ones, and any
/// failure rolls back to the previous contents. An empty `rows` slice
/// empties the table.
pub async fn replace_all<T: ToTokenRow>(
    client: &mut SqlClient,
    table: &TableDef,
    rows: &[T],
) -> Result<u64> {
    info!(table = table.name, rows = rows.len(), "replacing table contents");
    match replace_inner(client, table, rows).await {
        Ok(inserted) => Ok(inserted),
        Err((phase, source)) => {
            rollback_quietly(client).await;
            Err(PipelineError::BulkInsert {
                table: table.name,
                phase,
                source,
            })
        }
    }
}

async fn replace_inner<T: ToTokenRow>(
    client: &mut SqlClient,
    table: &TableDef,
    rows: &[T],
) -> std::result::Result<u64, (&'static str, tiberius::error::Error)> {
    batch(client, "BEGIN TRAN").await.map_err(|e| ("begin", e))?;
    batch(client, &format!("TRUNCATE TABLE {}", table.qualified()))
        .await
        .map_err(|e| ("truncate", e))?;

    let qualified = table.qualified();
    let mut inserted = 0u64;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut request = client
            .bulk_insert(&qualified)
            .await
            .map_err(|e| ("insert", e))?;
        for row in chunk {
            request
                .send(row.to_token_row())
                .await
                .map_err(|e| ("insert", e))?;
        }
        let result = request.finalize().await.map_err(|e| ("insert", e))?;
        inserted += result.total();
        debug!(table = table.name, inserted, "chunk flushed");
    }

    batch(client, "COMMIT TRAN").await.map_err(|e| ("commit", e))?;
    Ok(inserted)
}

async fn batch(client: &mut SqlClient, sql: &str) -> std::result::Result<(), tiberius::error::Error> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}
