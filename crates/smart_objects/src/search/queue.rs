/// Pending and completed candidate searches
use super::{CandidateSelectMethod, CandidateSlot, CandidateSlots, SearchRequestId, SearchStatus, SlotCandidateRequest};
use crate::config::SearchConfig;
use crate::math::Box3;
use crate::subsystem::{RequestFilter, SmartObjectRequest, SmartObjectSubsystem};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug)]
struct SearchEntry {
    request: SlotCandidateRequest,
    status: SearchStatus,
}

/// Single-threaded queue of candidate searches.
///
/// The queue is driven by one owner; hosts sharing it between tasks wrap it
/// in a mutex.
#[derive(Debug)]
pub struct CandidateSearchQueue {
    config: SearchConfig,
    next_id: u64,
    requests: HashMap<SearchRequestId, SearchEntry>,
    by_requester: HashMap<Uuid, SearchRequestId>,
    pending: VecDeque<SearchRequestId>,
    completed: Vec<SearchRequestId>,
}

impl CandidateSearchQueue {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            next_id: 1,
            requests: HashMap::new(),
            by_requester: HashMap::new(),
            pending: VecDeque::new(),
            completed: Vec::new(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Queues a search. A requester owns at most one request: submitting
    /// again drops the previous one, pending or completed.
    pub fn submit(&mut self, request: SlotCandidateRequest) -> SearchRequestId {
        if let Some(previous) = self.by_requester.get(&request.requester).copied() {
            debug!("requester {} replaced {}", request.requester, previous);
            self.cancel(previous);
        }

        let id = SearchRequestId(self.next_id);
        self.next_id += 1;

        self.by_requester.insert(request.requester, id);
        self.requests.insert(
            id,
            SearchEntry {
                request,
                status: SearchStatus::Pending,
            },
        );
        self.pending.push_back(id);
        trace!("queued {}", id);
        id
    }

    /// `None` while the request is pending or unknown; the candidates once
    /// resolved. Polling does not remove the request.
    pub fn poll(&self, id: SearchRequestId) -> Option<CandidateSlots> {
        match &self.requests.get(&id)?.status {
            SearchStatus::Pending => None,
            SearchStatus::Completed(slots) => Some(slots.clone()),
        }
    }

    pub fn status(&self, id: SearchRequestId) -> Option<&SearchStatus> {
        self.requests.get(&id).map(|entry| &entry.status)
    }

    /// Removes a request in any state. Returns false for unknown ids.
    pub fn cancel(&mut self, id: SearchRequestId) -> bool {
        let Some(entry) = self.requests.remove(&id) else {
            return false;
        };
        if self.by_requester.get(&entry.request.requester) == Some(&id) {
            self.by_requester.remove(&entry.request.requester);
        }
        self.pending.retain(|pending| *pending != id);
        self.completed.retain(|completed| *completed != id);
        true
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Resolves up to `max_requests_per_batch` pending requests in
    /// submission order. Returns how many were resolved.
    pub fn process_pending(&mut self, subsystem: &SmartObjectSubsystem) -> usize {
        let mut processed = 0;
        while processed < self.config.max_requests_per_batch {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let Some(entry) = self.requests.get_mut(&id) else {
                continue;
            };

            let slots = Self::resolve(&self.config, subsystem, &entry.request);
            debug!("{} resolved with {} candidates", id, slots.len());
            entry.status = SearchStatus::Completed(slots);
            self.completed.push(id);
            processed += 1;
        }
        processed
    }

    /// Ids resolved since the previous call.
    pub fn take_completed(&mut self) -> Vec<SearchRequestId> {
        std::mem::take(&mut self.completed)
    }

    /// Base re-poll interval with uniform jitter of `repoll_jitter` in both
    /// directions.
    pub fn next_repoll_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let base = self.config.repoll_interval_ms as f64;
        let jitter = self.config.repoll_jitter;
        let factor = if jitter > 0.0 {
            1.0 + rng.gen_range(-jitter..=jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64((base * factor).max(0.0) / 1000.0)
    }

    fn resolve(
        config: &SearchConfig,
        subsystem: &SmartObjectSubsystem,
        request: &SlotCandidateRequest,
    ) -> CandidateSlots {
        let extents = request.search_extents.unwrap_or(config.search_extents);
        let filter = RequestFilter::default()
            .with_user_tags(request.user_tags.clone())
            .with_activity_requirements(request.activity_requirements.clone())
            .with_claim_priority(request.claim_priority);
        let query = SmartObjectRequest::new(Box3::from_center_extent(request.location, extents), filter);

        let mut candidates: Vec<CandidateSlot> = subsystem
            .find_smart_objects(&query, None)
            .into_iter()
            .filter_map(|result| {
                let location = subsystem.get_slot_location(result.slot)?;
                Some(CandidateSlot {
                    result,
                    distance_sq: location.dist_squared(request.location),
                })
            })
            .collect();

        if request.select_method == CandidateSelectMethod::NearestToLocation {
            candidates.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
        }

        CandidateSlots::from_ranked(candidates, config.max_candidates)
    }
}
