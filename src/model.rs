use serde::{Deserialize, Serialize};

/// One physical sheet of a plan, keyed by (plan, page number).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(default)]
    pub plan_id: String,
    pub page_number: u32,
    #[serde(default)]
    pub sheet_number: Option<String>,
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub discipline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub revision_label: Option<String>,
}

/// A text run as delivered by the text-layer provider, still in PDF user space
/// (origin bottom-left, `transform[4..6]` is the baseline origin).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTextRun {
    #[serde(rename = "str", default)]
    pub text: String,
    #[serde(default)]
    pub transform: Option<Vec<f64>>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTextLayer {
    pub page_number: u32,
    pub viewport_width: f64,
    pub viewport_height: f64,
    #[serde(default)]
    pub items: Vec<RawTextRun>,
}

/// Text in page-local pixel space, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TextBox {
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// All extracted boxes of one page plus the pixel size they were laid out in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub page_number: u32,
    pub width_px: f64,
    pub height_px: f64,
    pub boxes: Vec<TextBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    SheetRef,
    SymbolTag,
}

impl CandidateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SheetRef => "sheet_ref",
            Self::SymbolTag => "symbol_tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCandidate {
    pub source_page: u32,
    pub reference_text: String,
    pub normalized_ref: String,
    pub bbox: NormBox,
    pub confidence: f64,
    pub kind: CandidateKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    #[serde(default)]
    pub id: Option<i64>,
    pub plan_id: String,
    pub source_page: u32,
    pub target_page: u32,
    pub reference_text: String,
    pub target_sheet_number: Option<String>,
    pub target_title: Option<String>,
    pub x_norm: f64,
    pub y_norm: f64,
    pub width_norm: f64,
    pub height_norm: f64,
    pub confidence: Option<f64>,
    pub is_auto: bool,
    pub dedup_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRevision {
    pub id: String,
    pub plan_id: String,
    pub target_page: u32,
    pub sheet_number: Option<String>,
    pub sheet_key: String,
    pub revision_label: String,
    pub revision_sort: Option<i64>,
    pub is_current: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionGroup {
    pub sheet_key: String,
    pub revisions: Vec<PageRevision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub source_page: u32,
    pub reference_text: String,
    pub normalized_ref: String,
    pub kind: CandidateKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPaths {
    pub db_path: String,
    pub text_layer_source: String,
    pub page_metadata_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisCounts {
    pub page_count: usize,
    pub pages_extracted: usize,
    pub pages_failed: usize,
    pub text_boxes: usize,
    pub candidates_detected: usize,
    pub links_built: usize,
    pub links_persisted: usize,
    pub unresolved_count: usize,
    pub revision_groups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub plan_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub lock_version: i64,
    pub source_sha256: Option<String>,
    pub paths: AnalysisPaths,
    pub counts: AnalysisCounts,
    pub unresolved: Vec<UnresolvedReference>,
    pub warnings: Vec<String>,
}
