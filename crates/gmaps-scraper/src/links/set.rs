use std::collections::HashSet;

use super::{PlaceLink, PLACE_PATH};
use crate::page::Element;

/// Insertion-ordered, deduplicated, optionally capped collection of links.
#[derive(Debug, Default)]
pub(crate) struct LinkSet {
    seen: HashSet<String>,
    ordered: Vec<PlaceLink>,
    cap: Option<usize>,
}

impl LinkSet {
    pub(crate) fn new(cap: Option<usize>) -> Self {
        Self {
            cap,
            ..Self::default()
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.ordered.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.cap.is_some_and(|cap| self.ordered.len() >= cap)
    }

    /// Returns `true` if `url` was new and there was room for it.
    pub(crate) fn insert(&mut self, url: &str) -> bool {
        if self.is_full() || self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string());
        self.ordered.push(PlaceLink::new(url));
        true
    }

    /// Adds the place links among `elements` in document order, stopping as
    /// soon as the cap is reached. Returns how many were new.
    pub(crate) fn absorb(&mut self, elements: &[Element]) -> usize {
        let mut added = 0;
        for href in elements.iter().filter_map(|e| e.href.as_deref()) {
            if self.is_full() {
                break;
            }
            if href.contains(PLACE_PATH) && self.insert(href) {
                added += 1;
            }
        }
        added
    }

    pub(crate) fn into_links(self) -> Vec<PlaceLink> {
        self.ordered
    }
}
