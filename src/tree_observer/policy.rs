//! Decides whether an attribute change should reload a node.

use std::collections::BTreeSet;

/// Reserved prefix used by the style machinery for its own bookkeeping attributes.
pub const DEFAULT_RESERVED_PREFIX: &str = "_q_stylesheet";

/// What to do about one attribute change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Not interesting.
    Ignore,
    /// Reload the node that changed.
    Reload,
    /// Reload the node if the inclusion predicate accepts it.
    ReloadIfIncluded,
}

/// Per-observer reaction settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadPolicy {
    properties: BTreeSet<String>,
    refresh_child_widgets: bool,
    update_with_all_changes: bool,
    reserved_prefix: String,
}

impl Default for ReloadPolicy {
    fn default() -> Self {
        Self {
            properties: BTreeSet::new(),
            refresh_child_widgets: false,
            update_with_all_changes: false,
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_string(),
        }
    }
}

impl ReloadPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watched attribute names, sorted.
    pub fn properties(&self) -> Vec<String> {
        self.properties.iter().cloned().collect()
    }

    pub fn add_property(&mut self, name: impl Into<String>) {
        self.properties.insert(name.into());
    }

    pub fn remove_property(&mut self, name: &str) {
        self.properties.remove(name);
    }

    pub fn set_properties<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = names.into_iter().map(Into::into).collect();
    }

    pub fn refresh_child_widgets(&self) -> bool {
        self.refresh_child_widgets
    }

    pub fn set_refresh_child_widgets(&mut self, enable: bool) {
        self.refresh_child_widgets = enable;
    }

    pub fn update_with_all_changes(&self) -> bool {
        self.update_with_all_changes
    }

    pub fn set_update_with_all_changes(&mut self, enable: bool) {
        self.update_with_all_changes = enable;
    }

    pub fn reserved_prefix(&self) -> &str {
        &self.reserved_prefix
    }

    /// Attributes starting with `prefix` are always ignored. Empty disables the check.
    pub fn set_reserved_prefix(&mut self, prefix: impl Into<String>) {
        self.reserved_prefix = prefix.into();
    }

    pub fn is_reserved(&self, attribute: &str) -> bool {
        !self.reserved_prefix.is_empty() && attribute.starts_with(&self.reserved_prefix)
    }

    /// Decide how to react to `attribute` changing on a node.
    pub fn react(&self, attribute: &str, is_root: bool) -> Reaction {
        if self.is_reserved(attribute) {
            return Reaction::Ignore;
        }

        if !self.update_with_all_changes && !self.properties.contains(attribute) {
            return Reaction::Ignore;
        }

        if is_root {
            Reaction::Reload
        } else if self.refresh_child_widgets {
            Reaction::ReloadIfIncluded
        } else {
            Reaction::Ignore
        }
    }
}
