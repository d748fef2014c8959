use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::LinksArgs;
use crate::commands::analyze::{load_links, open_database, resolve_db_path};
use crate::overlay::OverlayState;

pub fn run(args: LinksArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_deref());
    let connection = open_database(&db_path)?;
    let links = load_links(&connection, &args.plan_id)?;

    let mut overlay = OverlayState::new(args.page);
    overlay.set_filter(args.min_confidence);
    let visible = overlay.visible_links(&links);

    info!(
        plan_id = %args.plan_id,
        page = args.page,
        total = links.len(),
        visible = visible.len(),
        "loaded hotspots"
    );

    if args.json {
        let payload = serde_json::to_string_pretty(&visible).context("failed to serialize links")?;
        println!("{payload}");
    } else {
        for link in &visible {
            info!(
                id = link.id.unwrap_or_default(),
                reference = %link.reference_text,
                target_page = link.target_page,
                target_sheet = %link.target_sheet_number.as_deref().unwrap_or("-"),
                confidence = link.confidence.unwrap_or(1.0),
                auto = link.is_auto,
                "hotspot"
            );
        }
    }

    let Some(link_id) = args.select else {
        return Ok(());
    };

    overlay.toggle(link_id);
    debug!(selected = ?overlay.selected_link(), "toggled hotspot selection");
    let Some(selected) = overlay.selected(&links) else {
        bail!(
            "link {link_id} is not a visible hotspot on page {} of plan {}",
            args.page,
            args.plan_id
        );
    };

    info!(
        id = link_id,
        reference = %selected.reference_text,
        target_page = selected.target_page,
        target_sheet = %selected.target_sheet_number.as_deref().unwrap_or("-"),
        target_title = %selected.target_title.as_deref().unwrap_or("-"),
        "selected hotspot"
    );

    if args.navigate {
        match overlay.navigate_selected(&links) {
            Some(page) => info!(page, "navigated"),
            None => warn!(page = overlay.current_page(), "hotspot targets the current page"),
        }
    }

    Ok(())
}
