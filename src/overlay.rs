//! Hotspot selection and navigation over a plan's persisted links.

use crate::cli::ConfidenceFilter;
use crate::model::PageLink;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    current_page: u32,
    selected_link: Option<i64>,
    filter: ConfidenceFilter,
}

impl OverlayState {
    pub fn new(current_page: u32) -> Self {
        Self {
            current_page,
            selected_link: None,
            filter: ConfidenceFilter::All,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn selected_link(&self) -> Option<i64> {
        self.selected_link
    }

    pub fn set_filter(&mut self, filter: ConfidenceFilter) {
        self.filter = filter;
    }

    /// Links that render as hotspots on the current page. Links without a
    /// confidence (manual links) pass every filter.
    pub fn visible_links<'a>(&self, links: &'a [PageLink]) -> Vec<&'a PageLink> {
        let threshold = self.filter.threshold();
        links
            .iter()
            .filter(|link| link.source_page == self.current_page)
            .filter(|link| link.confidence.map(|value| value >= threshold).unwrap_or(true))
            .collect()
    }

    /// Clicking the selected hotspot again clears the selection.
    pub fn toggle(&mut self, link_id: i64) -> Option<i64> {
        self.selected_link = if self.selected_link == Some(link_id) {
            None
        } else {
            Some(link_id)
        };
        self.selected_link
    }

    pub fn selected<'a>(&self, links: &'a [PageLink]) -> Option<&'a PageLink> {
        let selected = self.selected_link?;
        self.visible_links(links)
            .into_iter()
            .find(|link| link.id == Some(selected))
    }

    /// Follows the selected hotspot. Returns the new page when it changed;
    /// the selection is cleared either way.
    pub fn navigate_selected(&mut self, links: &[PageLink]) -> Option<u32> {
        let target = self.selected(links).map(|link| link.target_page);
        self.selected_link = None;

        let target = target?;
        if target == self.current_page {
            return None;
        }
        self.current_page = target;
        Some(target)
    }
}
