use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::Args;
use client::{ReportApi, ReportView};
use shared::{config::Config, models::ReportQuery, render::ReportTable};

use super::open_session;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Start of the period
    #[arg(
        long = "from",
        value_name = "YYYY-MM-DD",
        help = "Start date of the report period (e.g., 2024-01-01). Omit for the backend's default range."
    )]
    pub from_date: Option<String>,

    /// End of the period
    #[arg(
        long = "to",
        value_name = "YYYY-MM-DD",
        help = "End date of the report period (e.g., 2024-01-31). Omit for the backend's default range."
    )]
    pub to_date: Option<String>,

    /// Print the raw JSON payload
    #[arg(long, help = "Print the report as JSON instead of a table")]
    pub json: bool,
}

pub async fn run(config: &Config, args: ReportArgs) -> Result<()> {
    let session = open_session(config)?;
    let api = ReportApi::new(&config.api).context("failed to set up the report client")?;
    let mut view = ReportView::new(session, api);

    let query = ReportQuery::new(args.from_date, args.to_date);
    if view.fetch(&query).await.is_err() {
        return Err(view
            .take_error()
            .map_or_else(|| anyhow!("report fetch failed"), anyhow::Error::new));
    }
    let report = view.result().context("report fetch returned no result")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", ReportTable::from_response(report, &Local));
    }
    Ok(())
}
