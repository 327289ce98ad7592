//! Grouping of timers by category and category-wide actions

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::state::{Timer, TimerAction, TimerEvent};

/// Timers keyed by category, categories in order of first appearance
pub type CategoryGroups = IndexMap<String, Vec<Timer>>;

/// Partition `timers` by category, keeping each category's relative order.
/// Categories without timers never appear.
pub fn group_by_category(timers: &[Timer]) -> CategoryGroups {
    let mut groups = CategoryGroups::new();
    for timer in timers {
        groups
            .entry(timer.category.clone())
            .or_default()
            .push(timer.clone());
    }
    groups
}

/// Project `action` onto every timer in `category`.
///
/// Returns the whole collection with the category's timers updated and the
/// rest passed through. Nothing is persisted.
pub fn bulk_action(timers: &[Timer], category: &str, action: TimerAction) -> Vec<Timer> {
    let mut updated = timers.to_vec();
    apply_to_category(&mut updated, category, action, Utc::now());
    updated
}

/// Apply `action` in place to the timers of `category`, returning the index
/// and event of every timer that changed.
pub fn apply_to_category(
    timers: &mut [Timer],
    category: &str,
    action: TimerAction,
    now: DateTime<Utc>,
) -> Vec<(usize, TimerEvent)> {
    timers
        .iter_mut()
        .enumerate()
        .filter(|(_, timer)| timer.category == category)
        .filter_map(|(index, timer)| timer.apply(action, now).map(|event| (index, event)))
        .collect()
}

/// Which category sections are folded away in a list view
#[derive(Debug, Clone, Default)]
pub struct CollapsedCategories {
    collapsed: HashMap<String, bool>,
}

impl CollapsedCategories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a category between collapsed and expanded, returning the new state
    pub fn toggle(&mut self, category: &str) -> bool {
        let entry = self.collapsed.entry(category.to_string()).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn is_collapsed(&self, category: &str) -> bool {
        self.collapsed.get(category).copied().unwrap_or(false)
    }

    /// Groups in display order, with an empty timer list for collapsed ones
    pub fn visible_groups<'a>(
        &self,
        groups: &'a CategoryGroups,
    ) -> Vec<(&'a str, &'a [Timer])> {
        groups
            .iter()
            .map(|(category, timers)| {
                let shown: &[Timer] = if self.is_collapsed(category) { &[] } else { timers };
                (category.as_str(), shown)
            })
            .collect()
    }
}
