use anyhow::Result;
use spendloader::{
    config::Config,
    connect,
    load::{self, DataPaths},
    schema::{self, reconcile},
    verify,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) resolve config + source files ────────────────────────────
    let config = Config::from_env()?;
    let paths = DataPaths::resolve(&std::env::current_dir()?);
    paths.ensure_present()?;
    info!(
        brand_csv = %paths.brand_csv.display(),
        daily_csv = %paths.daily_csv.display(),
        "source files present"
    );

    // ─── 3) connect ──────────────────────────────────────────────────
    let mut client = connect::connect(&config).await?;

    // ─── 4) reconcile destination tables ─────────────────────────────
    reconcile::ensure_tables(
        &mut client,
        &[schema::BRAND_DETAIL, schema::CONSUMER_SPEND_DAILY],
    )
    .await?;

    // ─── 5) load both extracts ───────────────────────────────────────
    let brand = load::replace_brand_detail(&mut client, &paths.brand_csv).await?;
    info!(
        table = brand.table,
        rows = brand.rows_inserted,
        "table replaced"
    );
    let spend = load::replace_consumer_spend(&mut client, &paths.daily_csv).await?;
    info!(
        table = spend.table,
        rows = spend.rows_inserted,
        null_timestamps = spend.coercions.total(),
        "table replaced"
    );

    // ─── 6) verify + report ──────────────────────────────────────────
    let report = verify::run(&mut client).await?;
    verify::print_report(&report);
    client.close().await?;

    info!("load complete");
    Ok(())
}
