//! # Candidate Search
//!
//! Batched search used by many agents at once. Instead of running a spatial
//! query every tick, an agent submits a [`SlotCandidateRequest`] keyed by its
//! own identity and polls for the result on a later tick. The owner of the
//! [`CandidateSearchQueue`] resolves pending requests in bounded batches.
//!
//! ## Protocol
//!
//! 1. [`CandidateSearchQueue::submit`] - queue a request; a requester has at most one
//! 2. [`CandidateSearchQueue::process_pending`] - resolve a batch against the subsystem
//! 3. [`CandidateSearchQueue::take_completed`] - ids resolved since the last call
//! 4. [`CandidateSearchQueue::poll`] - `None` while pending, the candidates afterwards
//! 5. [`CandidateSearchQueue::cancel`] - requesters remove their request when done
//!
//! Requests never expire on their own. Requesters that keep polling should
//! wait [`CandidateSearchQueue::next_repoll_delay`] between attempts so many
//! agents sharing one interval do not wake up together.

mod queue;

pub use queue::CandidateSearchQueue;

use crate::config::MAX_CANDIDATE_SLOTS;
use crate::math::Vec3;
use crate::tags::{TagContainer, TagQuery};
use crate::types::{ClaimPriority, RequestResult};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use uuid::Uuid;

/// Identifier returned by [`CandidateSearchQueue::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SearchRequestId(pub u64);

impl fmt::Display for SearchRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search#{}", self.0)
    }
}

/// How candidates are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CandidateSelectMethod {
    /// Discovery order
    #[default]
    FirstFound,
    /// Closest slot first; equal distances keep discovery order
    NearestToLocation,
}

/// What a requester is looking for.
#[derive(Debug, Clone)]
pub struct SlotCandidateRequest {
    /// Identity of the requesting entity
    pub requester: Uuid,
    /// Center of the search
    pub location: Vec3,
    pub user_tags: TagContainer,
    pub activity_requirements: TagQuery,
    /// Half-size of the search box; the configured default when `None`
    pub search_extents: Option<Vec3>,
    pub select_method: CandidateSelectMethod,
    /// Claimed slots below this priority count as candidates
    pub claim_priority: ClaimPriority,
}

impl SlotCandidateRequest {
    pub fn new(requester: Uuid, location: Vec3) -> Self {
        Self {
            requester,
            location,
            user_tags: TagContainer::new(),
            activity_requirements: TagQuery::Empty,
            search_extents: None,
            select_method: CandidateSelectMethod::default(),
            claim_priority: ClaimPriority::Normal,
        }
    }

    pub fn with_user_tags(mut self, tags: TagContainer) -> Self {
        self.user_tags = tags;
        self
    }

    pub fn with_activity_requirements(mut self, query: TagQuery) -> Self {
        self.activity_requirements = query;
        self
    }

    pub fn with_select_method(mut self, method: CandidateSelectMethod) -> Self {
        self.select_method = method;
        self
    }

    pub fn with_search_extents(mut self, extents: Vec3) -> Self {
        self.search_extents = Some(extents);
        self
    }
}

/// One candidate slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateSlot {
    pub result: RequestResult,
    /// Squared distance from the request location to the slot
    pub distance_sq: f64,
}

/// Best candidates for one request, at most [`MAX_CANDIDATE_SLOTS`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSlots {
    slots: SmallVec<[CandidateSlot; MAX_CANDIDATE_SLOTS]>,
}

impl CandidateSlots {
    pub(crate) fn from_ranked(ranked: impl IntoIterator<Item = CandidateSlot>, limit: usize) -> Self {
        Self {
            slots: ranked.into_iter().take(limit.min(MAX_CANDIDATE_SLOTS)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Best candidate.
    pub fn first(&self) -> Option<&CandidateSlot> {
        self.slots.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateSlot> {
        self.slots.iter()
    }

    pub fn as_slice(&self) -> &[CandidateSlot] {
        &self.slots
    }
}

/// Where a request stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    Pending,
    Completed(CandidateSlots),
}
