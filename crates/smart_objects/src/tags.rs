//! # Gameplay Tags
//!
//! Hierarchical dotted tags (`"Activity.Sit.Bench"`), tag sets and tag
//! queries used for activity matching, user filtering and runtime state.
//!
//! ## Key Types
//!
//! - [`Tag`] - Single hierarchical tag; a tag matches itself and all its parents
//! - [`TagContainer`] - Duplicate-free set of tags
//! - [`TagQuery`] - Boolean query over a container; the empty query matches everything
//! - [`ReasonMaskTable`] - Maps enable/disable reason tags to bits of a 16-bit mask

use crate::error::SmartObjectError;
use compact_str::CompactString;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reason used by [`set_enabled`](crate::SmartObjectSubsystem::set_enabled).
pub const GAMEPLAY_REASON: &str = "SmartObject.EnabledReason.Gameplay";

// ============================================================================
// Tag
// ============================================================================

/// A hierarchical tag such as `Activity.Sit`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(CompactString);

impl Tag {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(CompactString::new(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if `self` equals `other` or is one of its children.
    ///
    /// `Activity.Sit.Bench` matches `Activity.Sit` and `Activity`, but not
    /// `Activity.Si`.
    pub fn matches(&self, other: &Tag) -> bool {
        let name = self.as_str();
        let parent = other.as_str();
        name == parent
            || (name.len() > parent.len()
                && name.starts_with(parent)
                && name.as_bytes()[parent.len()] == b'.')
    }

    /// Direct parent tag, if any.
    pub fn parent(&self) -> Option<Tag> {
        self.as_str().rfind('.').map(|idx| Tag::new(&self.as_str()[..idx]))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.as_str())
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::new(value)
    }
}

// ============================================================================
// TagContainer
// ============================================================================

/// Duplicate-free set of tags that keeps insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagContainer {
    tags: Vec<Tag>,
}

impl TagContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag. Returns false if it was already present.
    pub fn add(&mut self, tag: Tag) -> bool {
        if self.has_tag_exact(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Removes a tag. Returns false if it was not present.
    pub fn remove(&mut self, tag: &Tag) -> bool {
        match self.tags.iter().position(|t| t == tag) {
            Some(idx) => {
                self.tags.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Adds every tag of `other`.
    pub fn append(&mut self, other: &TagContainer) {
        for tag in &other.tags {
            self.add(tag.clone());
        }
    }

    /// Union of two containers.
    pub fn union(&self, other: &TagContainer) -> TagContainer {
        let mut out = self.clone();
        out.append(other);
        out
    }

    /// Hierarchical membership: `{A.B}` has `A`.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|t| t.matches(tag))
    }

    pub fn has_tag_exact(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_any(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    pub fn has_all(&self, tags: &[Tag]) -> bool {
        tags.iter().all(|t| self.has_tag(t))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

impl<T: Into<Tag>> FromIterator<T> for TagContainer {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut container = TagContainer::new();
        for tag in iter {
            container.add(tag.into());
        }
        container
    }
}

impl fmt::Display for TagContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tags.iter().map(Tag::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ============================================================================
// TagQuery
// ============================================================================

/// Boolean query evaluated against a [`TagContainer`].
///
/// Matching is hierarchical. [`TagQuery::Empty`] matches every container;
/// callers use [`TagQuery::is_empty`] when an empty query must mean "no
/// requirement" instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TagQuery {
    #[default]
    Empty,
    AnyTagsMatch(Vec<Tag>),
    AllTagsMatch(Vec<Tag>),
    NoTagsMatch(Vec<Tag>),
    AnyExprMatch(Vec<TagQuery>),
    AllExprMatch(Vec<TagQuery>),
    NoExprMatch(Vec<TagQuery>),
}

impl TagQuery {
    pub fn any<T: Into<Tag>>(tags: impl IntoIterator<Item = T>) -> Self {
        TagQuery::AnyTagsMatch(tags.into_iter().map(Into::into).collect())
    }

    pub fn all<T: Into<Tag>>(tags: impl IntoIterator<Item = T>) -> Self {
        TagQuery::AllTagsMatch(tags.into_iter().map(Into::into).collect())
    }

    pub fn none<T: Into<Tag>>(tags: impl IntoIterator<Item = T>) -> Self {
        TagQuery::NoTagsMatch(tags.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TagQuery::Empty)
    }

    pub fn matches(&self, container: &TagContainer) -> bool {
        match self {
            TagQuery::Empty => true,
            TagQuery::AnyTagsMatch(tags) => container.has_any(tags),
            TagQuery::AllTagsMatch(tags) => container.has_all(tags),
            TagQuery::NoTagsMatch(tags) => !container.has_any(tags),
            TagQuery::AnyExprMatch(exprs) => exprs.iter().any(|e| e.matches(container)),
            TagQuery::AllExprMatch(exprs) => exprs.iter().all(|e| e.matches(container)),
            TagQuery::NoExprMatch(exprs) => !exprs.iter().any(|e| e.matches(container)),
        }
    }
}

// ============================================================================
// Enabled reasons
// ============================================================================

/// Lazily assigns one bit of a 16-bit disable mask to each reason tag.
///
/// An object is enabled when its mask is zero. The gameplay reason is always
/// bit 0.
#[derive(Debug)]
pub struct ReasonMaskTable {
    bits: RwLock<HashMap<Tag, u16>>,
}

impl Default for ReasonMaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasonMaskTable {
    pub const MAX_REASONS: usize = u16::BITS as usize;

    pub fn new() -> Self {
        let mut bits = HashMap::new();
        bits.insert(Tag::new(GAMEPLAY_REASON), 1u16);
        Self { bits: RwLock::new(bits) }
    }

    /// Mask bit for `reason`, allocating one on first use.
    pub fn mask_for(&self, reason: &Tag) -> Result<u16, SmartObjectError> {
        if let Some(mask) = self.bits.read().get(reason) {
            return Ok(*mask);
        }

        let mut bits = self.bits.write();
        if let Some(mask) = bits.get(reason) {
            return Ok(*mask);
        }
        if bits.len() >= Self::MAX_REASONS {
            return Err(SmartObjectError::ReasonTableExhausted {
                reason: reason.to_string(),
            });
        }
        let mask = 1u16 << bits.len();
        bits.insert(reason.clone(), mask);
        Ok(mask)
    }

    /// Mask bit for `reason` without allocating.
    pub fn existing_mask(&self, reason: &Tag) -> Option<u16> {
        self.bits.read().get(reason).copied()
    }

    pub fn len(&self) -> usize {
        self.bits.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchical_matching() {
        let tag = Tag::new("Activity.Sit.Bench");
        assert!(tag.matches(&Tag::new("Activity.Sit")));
        assert!(tag.matches(&Tag::new("Activity")));
        assert!(!tag.matches(&Tag::new("Activity.Si")));
        assert!(!Tag::new("Activity").matches(&tag));
        assert_eq!(tag.parent(), Some(Tag::new("Activity.Sit")));
    }

    #[test]
    fn container_add_remove_reports_changes() {
        let mut tags = TagContainer::new();
        assert!(tags.add(Tag::new("State.Busy")));
        assert!(!tags.add(Tag::new("State.Busy")));
        assert!(tags.has_tag(&Tag::new("State")));
        assert!(!tags.has_tag_exact(&Tag::new("State")));
        assert!(tags.remove(&Tag::new("State.Busy")));
        assert!(!tags.remove(&Tag::new("State.Busy")));
        assert!(tags.is_empty());
    }

    #[test]
    fn queries_follow_boolean_semantics() {
        let tags: TagContainer = ["Activity.Sit", "Furniture.Bench"].into_iter().collect();
        assert!(TagQuery::Empty.matches(&tags));
        assert!(TagQuery::any(["Activity", "Other"]).matches(&tags));
        assert!(!TagQuery::all(["Activity", "Other"]).matches(&tags));
        assert!(TagQuery::none(["Other"]).matches(&tags));
        assert!(!TagQuery::none(["Furniture"]).matches(&tags));

        let nested = TagQuery::AllExprMatch(vec![
            TagQuery::any(["Activity.Sit"]),
            TagQuery::NoExprMatch(vec![TagQuery::any(["Broken"])]),
        ]);
        assert!(nested.matches(&tags));
    }

    #[test]
    fn reason_table_allocates_bits_until_exhausted() {
        let table = ReasonMaskTable::new();
        assert_eq!(table.mask_for(&Tag::new(GAMEPLAY_REASON)).unwrap(), 1);
        assert_eq!(table.mask_for(&Tag::new("Reason.Cutscene")).unwrap(), 2);
        assert_eq!(table.mask_for(&Tag::new("Reason.Cutscene")).unwrap(), 2);

        for i in 2..ReasonMaskTable::MAX_REASONS {
            table.mask_for(&Tag::new(format!("Reason.R{i}"))).unwrap();
        }
        assert!(matches!(
            table.mask_for(&Tag::new("Reason.OneTooMany")),
            Err(SmartObjectError::ReasonTableExhausted { .. })
        ));
    }
}
