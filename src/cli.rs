use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wxhist", version, about = "Historical weather reports")]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a report and save the Excel and PDF files
    Report {
        #[arg(long)]
        location: Option<String>,
        #[arg(long, value_parser = parse_date, help = "DD-MM-YYYY or YYYY-MM-DD")]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date, help = "DD-MM-YYYY or YYYY-MM-DD")]
        end: Option<NaiveDate>,
        #[arg(long, help = "Directory to save reports into")]
        output: Option<PathBuf>,
    },
    /// List places matching a search
    Search { text: String },
    /// Resolve the device location to a place name
    Here,
    /// Show current weather at coordinates
    Weather {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    wxhist_core::geo::parse_user_date(value)
        .ok_or_else(|| format!("invalid date {:?}, expected DD-MM-YYYY", value))
}
