// src/core/visibility.rs

//! Tag-based visibility filtering.
//!
//! Every user carries an allow-list (`visible_tags`) and a deny-list
//! (`hidden_tags`). The resource inventory asks, per resource and per
//! request, whether the resource's tags pass that user's lists.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Decides whether a resource carrying `resource_tags` is visible to a user
/// with the given allow-list and deny-list.
///
/// 1. Any tag on the deny-list hides the resource, whatever the allow-list says.
/// 2. An empty allow-list places no constraint.
/// 3. Otherwise at least one tag must be on the allow-list.
///
/// An untagged resource can never satisfy a non-empty allow-list.
pub fn is_visible<S>(
    resource_tags: &HashSet<S>,
    visible_tags: &HashSet<S>,
    hidden_tags: &HashSet<S>,
) -> bool
where
    S: std::hash::Hash + Eq,
{
    if resource_tags.iter().any(|tag| hidden_tags.contains(tag)) {
        return false;
    }
    if visible_tags.is_empty() {
        return true;
    }
    resource_tags.iter().any(|tag| visible_tags.contains(tag))
}

/// A user's allow-list and deny-list, as stored in the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(default)]
    pub visible_tags: BTreeSet<String>,
    #[serde(default)]
    pub hidden_tags: BTreeSet<String>,
}

impl TagFilter {
    pub fn new(visible_tags: BTreeSet<String>, hidden_tags: BTreeSet<String>) -> Self {
        Self {
            visible_tags,
            hidden_tags,
        }
    }

    /// True when neither list constrains anything.
    pub fn is_unrestricted(&self) -> bool {
        self.visible_tags.is_empty() && self.hidden_tags.is_empty()
    }

    /// Same decision as [`is_visible`], for tags in any iterable form.
    pub fn allows<I, T>(&self, resource_tags: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut matched_allow = false;
        for tag in resource_tags {
            let tag = tag.as_ref();
            if self.hidden_tags.contains(tag) {
                return false;
            }
            if !matched_allow && self.visible_tags.contains(tag) {
                matched_allow = true;
            }
        }
        self.visible_tags.is_empty() || matched_allow
    }

    /// Drops every resource whose tags do not pass this filter.
    pub fn retain_visible<R, F, I, T>(&self, resources: &mut Vec<R>, tags_of: F)
    where
        F: Fn(&R) -> I,
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        resources.retain(|resource| self.allows(tags_of(resource)));
    }
}
