use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cli::AnalyzeArgs;
use crate::detect::{Analyzer, DetectionConfig, extract_text_boxes, page_text_blob};
use crate::model::{
    AnalysisCounts, AnalysisPaths, AnalysisRunManifest, PageLink, PageRecord, PageText,
    PageTextLayer, RawTextRun, UnresolvedReference,
};
use crate::util::{
    ensure_directory, now_utc_string, read_json, sha256_file, utc_compact_string,
    write_json_pretty,
};

const DB_SCHEMA_VERSION: &str = "0.1.0";

mod db_setup;
mod page_metadata;
mod run;
mod store;
mod text_layer;

pub use run::run;

pub(crate) use db_setup::{open_database, resolve_db_path};
pub(crate) use store::{count_rows_for_plan, load_links, load_page_records, run_lock_state};

#[cfg(test)]
use db_setup::*;
use page_metadata::*;
#[cfg(test)]
use run::*;
use store::*;
use text_layer::*;
