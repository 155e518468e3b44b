//! Reading the two source extracts and replacing the destination tables.

pub mod coerce;
pub mod insert;
pub mod read;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use tiberius::{TokenRow, ToSql};
use tracing::warn;

use crate::connect::SqlClient;
use crate::error::{PipelineError, Result};
use crate::schema::{BRAND_DETAIL, CONSUMER_SPEND_DAILY};
use self::coerce::{CoercionStats, FieldCx};
use self::insert::ToTokenRow;

/// Directory the scheduler drops source extracts into, relative to the
/// working directory.
pub const DATA_DIR: &str = "data";
/// Brand metadata extract.
pub const BRAND_CSV: &str = "brand-detail-url-etc_0_0_0.csv";
/// Daily consumer spend extract.
pub const DAILY_CSV: &str = "2021-01-19--data_01be88c2-0306-48b3-0042-fa0703282ad6_1304_5_0.csv";

/// Locations of the two source files for this run.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub brand_csv: PathBuf,
    pub daily_csv: PathBuf,
}

impl DataPaths {
    /// Resolve the fixed file names under `root/data`.
    pub fn resolve(root: &Path) -> Self {
        let dir = root.join(DATA_DIR);
        DataPaths {
            brand_csv: dir.join(BRAND_CSV),
            daily_csv: dir.join(DAILY_CSV),
        }
    }

    /// Fail before any schema work when a source file is absent.
    pub fn ensure_present(&self) -> Result<()> {
        for path in [&self.brand_csv, &self.daily_csv] {
            if !path.is_file() {
                return Err(PipelineError::SourceFile {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
        }
        Ok(())
    }
}

/// What one table load did, for operator logs and tests.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub table: &'static str,
    pub rows_read: usize,
    pub rows_inserted: u64,
    pub coercions: CoercionStats,
}

/// One `dbo.BrandDetail` row, typed. Every column is nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandDetail {
    pub brand_id: Option<i32>,
    pub brand_name: Option<String>,
    pub brand_type: Option<String>,
    pub brand_url_addr: Option<String>,
    pub industry_name: Option<String>,
    pub subindustry_id: Option<i32>,
    pub subindustry_name: Option<String>,
}

/// One `dbo.ConsumerSpendDaily` row, typed. Every column is nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSpendDaily {
    pub brand_id: Option<i32>,
    pub brand_name: Option<String>,
    pub spend_amount: Option<Decimal>,
    pub state_abbr: Option<String>,
    pub trans_count: Option<Decimal>,
    pub trans_date: Option<NaiveDateTime>,
    pub version: Option<NaiveDateTime>,
}

impl ToTokenRow for BrandDetail {
    fn to_token_row(&self) -> TokenRow<'_> {
        let mut row = TokenRow::new();
        row.push(self.brand_id.to_sql());
        row.push(self.brand_name.to_sql());
        row.push(self.brand_type.to_sql());
        row.push(self.brand_url_addr.to_sql());
        row.push(self.industry_name.to_sql());
        row.push(self.subindustry_id.to_sql());
        row.push(self.subindustry_name.to_sql());
        row
    }
}

impl ToTokenRow for ConsumerSpendDaily {
    fn to_token_row(&self) -> TokenRow<'_> {
        let mut row = TokenRow::new();
        row.push(self.brand_id.to_sql());
        row.push(self.brand_name.to_sql());
        row.push(self.spend_amount.to_sql());
        row.push(self.state_abbr.to_sql());
        row.push(self.trans_count.to_sql());
        row.push(self.trans_date.to_sql());
        row.push(self.version.to_sql());
        row
    }
}

/// Raw brand record as it comes off disk. Blank fields arrive as None.
#[derive(Debug, Deserialize)]
struct BrandCsvRow {
    #[serde(rename = "BRAND_ID")]
    brand_id: Option<String>,
    #[serde(rename = "BRAND_NAME")]
    brand_name: Option<String>,
    #[serde(rename = "BRAND_TYPE")]
    brand_type: Option<String>,
    #[serde(rename = "BRAND_URL_ADDR")]
    brand_url_addr: Option<String>,
    #[serde(rename = "INDUSTRY_NAME")]
    industry_name: Option<String>,
    #[serde(rename = "SUBINDUSTRY_ID")]
    subindustry_id: Option<String>,
    #[serde(rename = "SUBINDUSTRY_NAME")]
    subindustry_name: Option<String>,
}

/// Raw spend record as it comes off disk.
#[derive(Debug, Deserialize)]
struct SpendCsvRow {
    #[serde(rename = "BRAND_ID")]
    brand_id: Option<String>,
    #[serde(rename = "BRAND_NAME")]
    brand_name: Option<String>,
    #[serde(rename = "SPEND_AMOUNT")]
    spend_amount: Option<String>,
    #[serde(rename = "STATE_ABBR")]
    state_abbr: Option<String>,
    #[serde(rename = "TRANS_COUNT")]
    trans_count: Option<String>,
    #[serde(rename = "TRANS_DATE")]
    trans_date: Option<String>,
    #[serde(rename = "VERSION")]
    version: Option<String>,
}

/// Parse the brand extract into typed rows. Text columns pass through
/// verbatim; the two id columns parse strictly.
pub fn read_brand_rows(path: &Path) -> Result<Vec<BrandDetail>> {
    let raw_rows: Vec<BrandCsvRow> = read::rows(path, &BRAND_DETAIL)?;
    let mut rows = Vec::with_capacity(raw_rows.len());
    for (index, raw) in raw_rows.into_iter().enumerate() {
        let cx = FieldCx::new(path, index as u64 + 1);
        rows.push(BrandDetail {
            brand_id: coerce::int(raw.brand_id.as_deref(), "BRAND_ID", &cx)?,
            brand_name: raw.brand_name,
            brand_type: raw.brand_type,
            brand_url_addr: raw.brand_url_addr,
            industry_name: raw.industry_name,
            subindustry_id: coerce::int(raw.subindustry_id.as_deref(), "SUBINDUSTRY_ID", &cx)?,
            subindustry_name: raw.subindustry_name,
        });
    }
    Ok(rows)
}

/// Parse the daily spend extract into typed rows plus the count of
/// timestamp values that will load as NULL.
pub fn read_spend_rows(path: &Path) -> Result<(Vec<ConsumerSpendDaily>, CoercionStats)> {
    let raw_rows: Vec<SpendCsvRow> = read::rows(path, &CONSUMER_SPEND_DAILY)?;
    let mut stats = CoercionStats::default();
    let mut rows = Vec::with_capacity(raw_rows.len());
    for (index, raw) in raw_rows.into_iter().enumerate() {
        let cx = FieldCx::new(path, index as u64 + 1);
        rows.push(ConsumerSpendDaily {
            brand_id: coerce::int(raw.brand_id.as_deref(), "BRAND_ID", &cx)?,
            brand_name: raw.brand_name,
            spend_amount: coerce::decimal(raw.spend_amount.as_deref(), "SPEND_AMOUNT", &cx)?,
            state_abbr: raw.state_abbr,
            trans_count: coerce::decimal(raw.trans_count.as_deref(), "TRANS_COUNT", &cx)?,
            trans_date: coerce::datetime(raw.trans_date.as_deref(), "TRANS_DATE", &mut stats),
            version: coerce::datetime(raw.version.as_deref(), "VERSION", &mut stats),
        });
    }
    for (column, dropped) in stats.iter() {
        warn!(column, dropped, "timestamp values will load as NULL");
    }
    Ok((rows, stats))
}

/// Load the brand extract and replace `dbo.BrandDetail`.
pub async fn replace_brand_detail(client: &mut SqlClient, path: &Path) -> Result<LoadSummary> {
    let rows = read_brand_rows(path)?;
    let rows_inserted = insert::replace_all(client, &BRAND_DETAIL, &rows).await?;
    Ok(LoadSummary {
        table: BRAND_DETAIL.name,
        rows_read: rows.len(),
        rows_inserted,
        coercions: CoercionStats::default(),
    })
}

/// Load the daily spend extract and replace `dbo.ConsumerSpendDaily`.
pub async fn replace_consumer_spend(client: &mut SqlClient, path: &Path) -> Result<LoadSummary> {
    let (rows, coercions) = read_spend_rows(path)?;
    let rows_inserted = insert::replace_all(client, &CONSUMER_SPEND_DAILY, &rows).await?;
    Ok(LoadSummary {
        table: CONSUMER_SPEND_DAILY.name,
        rows_read: rows.len(),
        rows_inserted,
        coercions,
    })
}
