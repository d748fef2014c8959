use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "sheetlinks",
    version,
    about = "Cross-reference detection and navigation for construction drawing sets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Analyze(AnalyzeArgs),
    Links(LinksArgs),
    Revisions(RevisionsArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PairingMode {
    Auto,
    AllPairs,
    Grid,
}

impl PairingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::AllPairs => "all-pairs",
            Self::Grid => "grid",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConfidenceFilter {
    All,
    Medium,
    High,
}

impl ConfidenceFilter {
    pub fn threshold(self) -> f64 {
        match self {
            Self::All => 0.0,
            Self::Medium => 0.70,
            Self::High => 0.85,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(long, default_value = ".cache/sheetlinks")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub plan_id: String,

    /// pdf.js-style text content export
    #[arg(long, conflicts_with = "pdf", required_unless_present = "pdf")]
    pub text_layer: Option<PathBuf>,

    /// Extract the text layer with poppler's pdftohtml instead
    #[arg(long)]
    pub pdf: Option<PathBuf>,

    #[arg(long)]
    pub page_metadata: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = 1.0)]
    pub render_scale: f64,

    #[arg(long, value_enum, default_value_t = PairingMode::Auto)]
    pub pairing: PairingMode,

    #[arg(long = "sheet-pattern")]
    pub sheet_patterns: Vec<String>,

    #[arg(long, default_value_t = 200)]
    pub unresolved_limit: usize,

    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Only run when the plan has no indexed pages yet
    #[arg(long, default_value_t = false)]
    pub if_unindexed: bool,

    /// Clear a lock left behind by an interrupted run
    #[arg(long, default_value_t = false)]
    pub force_unlock: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LinksArgs {
    #[arg(long, default_value = ".cache/sheetlinks")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub plan_id: String,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, value_enum, default_value_t = ConfidenceFilter::All)]
    pub min_confidence: ConfidenceFilter,

    #[arg(long)]
    pub select: Option<i64>,

    #[arg(long, default_value_t = false, requires = "select")]
    pub navigate: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RevisionsArgs {
    #[arg(long, default_value = ".cache/sheetlinks")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub plan_id: String,

    #[arg(long)]
    pub sheet: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/sheetlinks")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub plan_id: Option<String>,
}
