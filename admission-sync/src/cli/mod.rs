pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::ingest::{DuplicatePolicy, ValueField};
use crate::services::pipeline::Universe;

#[derive(Parser)]
#[command(name = "admission-sync")]
#[command(about = "Reconcile admission spreadsheets against ClickHouse and apply bulk updates")]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config dir>/admission-sync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how the source file is read and what would be applied
    Inspect(commands::inspect::InspectArgs),
    /// Check which source identifiers exist in the target table
    Verify(commands::verify::VerifyArgs),
    /// Write source values into the target table in batches
    Update(commands::update::UpdateArgs),
}

/// Where the source rows come from and how they are selected
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Spreadsheet (.xlsx/.xls/.ods) or CSV file
    pub file: PathBuf,

    /// Worksheet name (default: first sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Header row index; auto-detected when omitted
    #[arg(long)]
    pub header_offset: Option<usize>,

    /// Keep only rows from this source region
    #[arg(long)]
    pub region: Option<String>,

    /// Keep rows from every region
    #[arg(long, conflicts_with = "region")]
    pub all_regions: bool,

    /// Attribute to reconcile: min-score or study-years
    #[arg(long, default_value = "min-score")]
    pub field: ValueField,

    /// Conflicting source values for one id: reject, warn or last-wins
    #[arg(long)]
    pub duplicate_policy: Option<DuplicatePolicyArg>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum DuplicatePolicyArg {
    Reject,
    Warn,
    LastWins,
}

impl From<DuplicatePolicyArg> for DuplicatePolicy {
    fn from(arg: DuplicatePolicyArg) -> Self {
        match arg {
            DuplicatePolicyArg::Reject => DuplicatePolicy::Reject,
            DuplicatePolicyArg::Warn => DuplicatePolicy::Warn,
            DuplicatePolicyArg::LastWins => DuplicatePolicy::LastWins,
        }
    }
}

/// Target table overrides
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub database: Option<String>,

    #[arg(long)]
    pub table: Option<String>,

    #[arg(long)]
    pub id_column: Option<String>,
}

/// Coverage denominator and sampling
#[derive(Args, Debug, Clone, Default)]
pub struct CoverageArgs {
    /// Coverage relative to this many rows
    #[arg(long, conflicts_with = "universe_from_target")]
    pub universe: Option<u64>,

    /// Coverage relative to the target table's row count
    #[arg(long)]
    pub universe_from_target: bool,

    /// Look up only the first N identifiers
    #[arg(long)]
    pub sample: Option<usize>,

    /// Minimum coverage ratio for a pass (0.0 - 1.0)
    #[arg(long)]
    pub min_coverage: Option<f64>,
}

/// Report files
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Write the report as JSON
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Write the report as an Excel workbook
    #[arg(long)]
    pub report_xlsx: Option<PathBuf>,
}

impl SourceArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(sheet) = &self.sheet {
            config.source.sheet = Some(sheet.clone());
        }
        if let Some(offset) = self.header_offset {
            config.source.header_offset = Some(offset);
        }
        if self.all_regions {
            config.source.region = None;
        } else if let Some(region) = &self.region {
            config.source.region = Some(region.clone());
        }
        if let Some(policy) = self.duplicate_policy {
            config.source.duplicate_policy = policy.into();
        }
    }
}

impl TargetArgs {
    pub fn apply(&self, config: &mut Config) {
        let target = &mut config.target;
        if let Some(host) = &self.host {
            target.host = host.clone();
        }
        if let Some(port) = self.port {
            target.port = port;
        }
        if let Some(database) = &self.database {
            target.database = database.clone();
        }
        if let Some(table) = &self.table {
            target.table = table.clone();
        }
        if let Some(id_column) = &self.id_column {
            target.id_column = id_column.clone();
        }
    }
}

impl CoverageArgs {
    pub fn universe(&self) -> Universe {
        match (self.universe, self.universe_from_target) {
            (Some(n), _) => Universe::Fixed(n),
            (None, true) => Universe::TargetRows,
            (None, false) => Universe::Requested,
        }
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(min) = self.min_coverage {
            config.acceptance.min_coverage = min;
        }
    }
}
