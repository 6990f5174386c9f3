//! Seam to the style engine that parses and applies style text.

use crate::ui::NodeRef;

/// Style engine consumed by the registry and the node observers.
///
/// Implementations apply the document application-wide and recompute
/// style for single nodes. None of these calls can fail from this crate's
/// point of view; engines log their own parse errors.
pub trait StyleEngine: Send + Sync {
    /// Replace the application-wide style document.
    fn apply_style_text(&self, document: &str);

    /// Drop whatever style information is cached for `node` (unpolish).
    fn discard_cached_style(&self, node: &NodeRef);

    /// Recompute and reapply style for `node` (polish).
    fn recompute_style(&self, node: &NodeRef);
}
