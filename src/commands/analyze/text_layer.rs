use super::*;

/// Per-page source of raw text runs.
pub(crate) trait TextLayerProvider {
    fn describe(&self) -> String;

    fn page_count(&self) -> Result<u32>;

    fn load_page(&self, page_number: u32) -> Result<PageTextLayer>;
}

#[derive(Debug, Deserialize)]
struct TextLayerExport {
    pages: Vec<TextLayerExportPage>,
}

#[derive(Debug, Deserialize)]
struct TextLayerExportPage {
    page_number: u32,
    #[serde(default)]
    viewport_width: f64,
    #[serde(default)]
    viewport_height: f64,
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// A pdf.js `getTextContent` style export, one entry per page.
pub(crate) struct JsonTextLayer {
    path: PathBuf,
    pages: BTreeMap<u32, TextLayerExportPage>,
}

impl JsonTextLayer {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let export: TextLayerExport = read_json(path)?;
        Ok(Self::from_pages(path, export.pages))
    }

    fn from_pages(path: &Path, pages: Vec<TextLayerExportPage>) -> Self {
        Self {
            path: path.to_path_buf(),
            pages: pages
                .into_iter()
                .map(|page| (page.page_number, page))
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_json_str(raw: &str) -> Result<Self> {
        let export: TextLayerExport =
            serde_json::from_str(raw).context("failed to parse text layer export")?;
        Ok(Self::from_pages(Path::new("<inline>"), export.pages))
    }
}

impl TextLayerProvider for JsonTextLayer {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.keys().next_back().copied().unwrap_or(0))
    }

    fn load_page(&self, page_number: u32) -> Result<PageTextLayer> {
        let Some(page) = self.pages.get(&page_number) else {
            bail!("page {page_number} missing from {}", self.path.display());
        };
        if let Some(error) = &page.error {
            bail!("text extraction failed for page {page_number}: {error}");
        }

        let items = page
            .items
            .iter()
            .filter_map(|item| serde_json::from_value::<RawTextRun>(item.clone()).ok())
            .collect::<Vec<RawTextRun>>();
        let skipped = page.items.len() - items.len();
        if skipped > 0 {
            debug!(page = page_number, skipped, "skipped malformed text runs");
        }

        Ok(PageTextLayer {
            page_number,
            viewport_width: page.viewport_width,
            viewport_height: page.viewport_height,
            items,
        })
    }
}

/// Text layer read from a PDF with poppler's `pdfinfo` and `pdftohtml -xml`.
pub(crate) struct PdftohtmlTextLayer {
    pdf_path: PathBuf,
}

impl PdftohtmlTextLayer {
    pub(crate) fn new(pdf_path: &Path) -> Result<Self> {
        if !pdf_path.exists() {
            bail!("PDF not found: {}", pdf_path.display());
        }
        Ok(Self {
            pdf_path: pdf_path.to_path_buf(),
        })
    }
}

impl TextLayerProvider for PdftohtmlTextLayer {
    fn describe(&self) -> String {
        self.pdf_path.display().to_string()
    }

    fn page_count(&self) -> Result<u32> {
        let output = Command::new("pdfinfo")
            .arg(&self.pdf_path)
            .output()
            .with_context(|| format!("failed to execute pdfinfo for {}", self.pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdfinfo returned non-zero exit status for {}: {}",
                self.pdf_path.display(),
                stderr.trim()
            );
        }

        let pattern = Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").context("failed to compile pdfinfo regex")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        pattern
            .captures(&stdout)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<u32>().ok())
            .with_context(|| format!("pdfinfo reported no page count for {}", self.pdf_path.display()))
    }

    fn load_page(&self, page_number: u32) -> Result<PageTextLayer> {
        let output = Command::new("pdftohtml")
            .arg("-xml")
            .arg("-i")
            .arg("-zoom")
            .arg("1")
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-stdout")
            .arg(&self.pdf_path)
            .output()
            .with_context(|| {
                format!("failed to execute pdftohtml for {}", self.pdf_path.display())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftohtml returned non-zero exit status for {} page {}: {}",
                self.pdf_path.display(),
                page_number,
                stderr.trim()
            );
        }

        parse_pdftohtml_page(&String::from_utf8_lossy(&output.stdout), page_number)
    }
}

/// Converts one page of pdftohtml XML (top-down boxes) into bottom-up runs so
/// every provider feeds the same geometry path.
pub(crate) fn parse_pdftohtml_page(xml: &str, page_number: u32) -> Result<PageTextLayer> {
    let page_regex = Regex::new(r"<page\b([^>]*)>").context("failed to compile page tag regex")?;
    let text_regex =
        Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").context("failed to compile text tag regex")?;
    let markup_regex = Regex::new(r"<[^>]+>").context("failed to compile markup regex")?;

    let Some(page_attributes) = page_regex
        .captures(xml)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str())
    else {
        bail!("pdftohtml output for page {page_number} has no page element");
    };

    let viewport_width = xml_number_attribute(page_attributes, "width").unwrap_or(0.0);
    let viewport_height = xml_number_attribute(page_attributes, "height").unwrap_or(0.0);

    let mut items = Vec::new();
    for captures in text_regex.captures_iter(xml) {
        let attributes = captures.get(1).map(|value| value.as_str()).unwrap_or("");
        let raw_text = captures.get(2).map(|value| value.as_str()).unwrap_or("");
        let text = decode_xml_text(&markup_regex.replace_all(raw_text, ""));
        if text.trim().is_empty() {
            continue;
        }

        let (Some(top), Some(left), Some(width), Some(height)) = (
            xml_number_attribute(attributes, "top"),
            xml_number_attribute(attributes, "left"),
            xml_number_attribute(attributes, "width"),
            xml_number_attribute(attributes, "height"),
        ) else {
            continue;
        };

        let baseline = viewport_height - top - height;
        items.push(RawTextRun {
            text,
            transform: Some(vec![height, 0.0, 0.0, height, left, baseline]),
            width: Some(width),
            height: Some(height),
        });
    }

    Ok(PageTextLayer {
        page_number,
        viewport_width,
        viewport_height,
        items,
    })
}

fn xml_number_attribute(attributes: &str, name: &str) -> Option<f64> {
    let needle = format!("{name}=\"");
    let start = attributes
        .match_indices(&needle)
        .find(|(index, _)| {
            *index == 0
                || attributes[..*index]
                    .chars()
                    .last()
                    .map(char::is_whitespace)
                    .unwrap_or(false)
        })?
        .0
        + needle.len();
    let rest = &attributes[start..];
    let end = rest.find('"')?;
    rest[..end].trim().parse::<f64>().ok()
}

fn decode_xml_text(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#160;", " ")
        .replace('\u{00a0}', " ")
        .replace("&amp;", "&")
}
