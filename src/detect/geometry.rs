use crate::model::{NormBox, PageText, PageTextLayer, RawTextRun, TextBox};

/// Converts bottom-up PDF text runs into top-down pixel boxes at `scale`.
///
/// Runs without a usable transform, with non-positive size, or with a size or
/// position that cannot lie on the page are dropped.
pub fn extract_text_boxes(layer: &PageTextLayer, scale: f64) -> PageText {
    let width_px = layer.viewport_width * scale;
    let height_px = layer.viewport_height * scale;

    let boxes = if width_px > 0.0 && height_px > 0.0 {
        layer
            .items
            .iter()
            .filter_map(|run| run_to_box(run, layer.viewport_height, scale, width_px, height_px))
            .collect()
    } else {
        Vec::new()
    };

    PageText {
        page_number: layer.page_number,
        width_px,
        height_px,
        boxes,
    }
}

fn run_to_box(
    run: &RawTextRun,
    viewport_height: f64,
    scale: f64,
    width_px: f64,
    height_px: f64,
) -> Option<TextBox> {
    if run.text.trim().is_empty() {
        return None;
    }

    let transform = run.transform.as_ref()?;
    if transform.len() < 6 || transform.iter().any(|value| !value.is_finite()) {
        return None;
    }

    let width = run.width?;
    let height = run
        .height
        .filter(|value| *value > 0.0)
        .unwrap_or_else(|| transform[2].hypot(transform[3]));

    let x = transform[4] * scale;
    let y = (viewport_height - transform[5] - height) * scale;
    let width = width * scale;
    let height = height * scale;

    if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
        return None;
    }
    if width <= 0.0 || height <= 0.0 || width > width_px || height > height_px {
        return None;
    }
    if x >= width_px || y >= height_px || x + width <= 0.0 || y + height <= 0.0 {
        return None;
    }

    Some(TextBox {
        text: run.text.clone(),
        x,
        y,
        width,
        height,
    })
}

/// Maps a pixel rectangle into the unit square, keeping at least `min_size` on
/// each axis and shifting the origin back inside the page when needed.
pub fn normalize_box(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    page_width: f64,
    page_height: f64,
    min_size: f64,
) -> NormBox {
    let (x, width) = normalize_axis(x, width, page_width, min_size);
    let (y, height) = normalize_axis(y, height, page_height, min_size);

    NormBox {
        x,
        y,
        width,
        height,
    }
}

fn normalize_axis(start: f64, length: f64, extent: f64, min_size: f64) -> (f64, f64) {
    if extent <= 0.0 {
        return (0.0, min_size);
    }

    let mut start = (start / extent).clamp(0.0, 1.0);
    let length = (length / extent).clamp(min_size, 1.0);
    if start + length > 1.0 {
        start = 1.0 - length;
    }

    (start, length)
}
