//! Post-load smoke queries and the operator report.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use tracing::info;

use crate::connect::SqlClient;
use crate::error::{PipelineError, Result};
use crate::schema::{TableDef, BRAND_DETAIL, CONSUMER_SPEND_DAILY};

/// How many states the spend ranking shows.
const TOP_STATES: usize = 5;

/// Row count for one destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i32,
}

/// One entry of the spend-by-state ranking. Both sides are nullable in the
/// store, so both stay optional here.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpend {
    pub state: Option<String>,
    pub total_spend: Option<Decimal>,
}

/// Everything the verifier reads back after the load commits.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub counts: Vec<TableCount>,
    pub top_states: Vec<StateSpend>,
}

/// Count both destination tables and rank states by total spend.
pub async fn run(client: &mut SqlClient) -> Result<VerifyReport> {
    let mut counts = Vec::with_capacity(2);
    for table in [&BRAND_DETAIL, &CONSUMER_SPEND_DAILY] {
        counts.push(count_rows(client, table).await?);
    }
    let top_states = top_states_by_spend(client).await?;
    info!(
        brand_rows = counts[0].rows,
        spend_rows = counts[1].rows,
        states = top_states.len(),
        "verification queries complete"
    );
    Ok(VerifyReport { counts, top_states })
}

async fn count_rows(client: &mut SqlClient, table: &TableDef) -> Result<TableCount> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.qualified());
    let row = client
        .simple_query(sql.as_str())
        .await
        .map_err(verification)?
        .into_row()
        .await
        .map_err(verification)?;
    let rows = match row {
        Some(row) => row.try_get::<i32, _>(0).map_err(verification)?.unwrap_or(0),
        None => 0,
    };
    Ok(TableCount {
        table: table.name,
        rows,
    })
}

async fn top_states_by_spend(client: &mut SqlClient) -> Result<Vec<StateSpend>> {
    let sql = format!(
        "SELECT TOP {TOP_STATES} STATE_ABBR, SUM(SPEND_AMOUNT) AS TotalSpend \
         FROM {} GROUP BY STATE_ABBR ORDER BY TotalSpend DESC",
        CONSUMER_SPEND_DAILY.qualified()
    );
    let rows = client
        .simple_query(sql.as_str())
        .await
        .map_err(verification)?
        .into_first_result()
        .await
        .map_err(verification)?;

    let mut ranking = Vec::with_capacity(rows.len());
    for row in rows {
        let state = row
            .try_get::<&str, _>(0)
            .map_err(verification)?
            .map(str::to_string);
        let total_spend = row.try_get::<Decimal, _>(1).map_err(verification)?;
        ranking.push(StateSpend { state, total_spend });
    }
    Ok(ranking)
}

fn verification(source: tiberius::error::Error) -> PipelineError {
    PipelineError::Verification { source }
}

/// Render the report as the fixed-width console table operators read.
pub fn render_report(report: &VerifyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{: <25} {:>12}", "Table", "Rows");
    let _ = writeln!(out, "{:-<38}", "");
    for count in &report.counts {
        let _ = writeln!(out, "{: <25} {:>12}", count.table, count.rows);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{: <12} {:>18}", "State", "Total spend");
    let _ = writeln!(out, "{:-<31}", "");
    for entry in &report.top_states {
        let state = entry.state.as_deref().unwrap_or("<null>");
        let total = entry
            .total_spend
            .map(|spend| spend.to_string())
            .unwrap_or_else(|| "<null>".to_string());
        let _ = writeln!(out, "{: <12} {:>18}", state, total);
    }
    out
}

/// Print the report to stdout.
pub fn print_report(report: &VerifyReport) {
    print!("\n{}", render_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> VerifyReport {
        VerifyReport {
            counts: vec![
                TableCount { table: "BrandDetail", rows: 1532 },
                TableCount { table: "ConsumerSpendDaily", rows: 48210 },
            ],
            top_states: vec![
                StateSpend {
                    state: Some("CA".to_string()),
                    total_spend: Some("1250345.7700".parse().unwrap()),
                },
                StateSpend {
                    state: Some("NY".to_string()),
                    total_spend: Some("980222.0000".parse().unwrap()),
                },
                StateSpend { state: None, total_spend: None },
            ],
        }
    }

    #[test]
    fn report_lists_tables_with_counts() {
        let rendered = render_report(&sample_report());
        assert!(rendered.contains("BrandDetail"), "{rendered}");
        assert!(rendered.contains("1532"), "{rendered}");
        assert!(rendered.contains("ConsumerSpendDaily"), "{rendered}");
        assert!(rendered.contains("48210"), "{rendered}");
    }

    #[test]
    fn report_ranks_states_in_given_order() {
        let rendered = render_report(&sample_report());
        let ca = rendered.find("CA").unwrap();
        let ny = rendered.find("NY").unwrap();
        assert!(ca < ny, "{rendered}");
        assert!(rendered.contains("1250345.7700"), "{rendered}");
    }

    #[test]
    fn null_state_group_renders_placeholder() {
        let rendered = render_report(&sample_report());
        assert!(rendered.contains("<null>"), "{rendered}");
    }
}
