//! Simulated agents looking for something to do.
//!
//! Each agent loops through search, claim, occupy and release. Searches go
//! through the shared [`CandidateSearchQueue`]; results are polled after a
//! jittered delay, never in the same tick they were submitted.

use rand::rngs::StdRng;
use smart_objects::{
    CandidateSearchQueue, CandidateSelectMethod, CandidateSlots, ClaimHandle, ClaimPriority,
    EntranceLocationRequest, NavigationValidator, SearchRequestId, SlotCandidateRequest, SmartObjectSubsystem,
    TagQuery, UserPayload, Vec3,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Counters accumulated over a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub ticks: u64,
    pub searches_submitted: u64,
    /// Searches whose candidates all turned out unusable
    pub empty_searches: u64,
    pub occupations: u64,
    pub completed_uses: u64,
    /// Candidates another agent claimed first
    pub claim_conflicts: u64,
    pub entrance_failures: u64,
    /// Claims that were gone when the agent tried to release them
    pub lost_claims: u64,
    /// Subsystem events observed by the host
    pub events_seen: u64,
}

/// Everything an agent needs for one step.
pub struct TickContext<'a> {
    pub tick: u64,
    pub tick_interval: Duration,
    pub occupy_ticks: u64,
    pub subsystem: &'a SmartObjectSubsystem,
    pub queue: &'a mut CandidateSearchQueue,
    pub navigation: &'a dyn NavigationValidator,
    pub rng: &'a mut StdRng,
    pub report: &'a mut SimulationReport,
}

impl TickContext<'_> {
    /// Jittered re-poll delay converted to whole ticks, at least one.
    fn repoll_ticks(&mut self) -> u64 {
        let delay = self.queue.next_repoll_delay(&mut *self.rng);
        let ticks = delay.as_nanos().div_ceil(self.tick_interval.as_nanos().max(1));
        u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
    }
}

/// Where an agent is in its loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentPhase {
    Idle { until_tick: u64 },
    Searching { request: SearchRequestId, poll_at: u64 },
    Occupying { claim: ClaimHandle, until_tick: u64 },
}

#[derive(Debug, Clone)]
pub struct Agent {
    id: Uuid,
    location: Vec3,
    activity: TagQuery,
    phase: AgentPhase,
}

impl Agent {
    pub fn new(location: Vec3, activity: TagQuery) -> Self {
        Self {
            id: Uuid::new_v4(),
            location,
            activity,
            phase: AgentPhase::Idle { until_tick: 0 },
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn location(&self) -> Vec3 {
        self.location
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Advances the agent by one tick.
    pub fn step(&mut self, ctx: &mut TickContext<'_>) {
        match self.phase {
            AgentPhase::Idle { until_tick } if ctx.tick >= until_tick => {
                let request = SlotCandidateRequest::new(self.id, self.location)
                    .with_activity_requirements(self.activity.clone())
                    .with_select_method(CandidateSelectMethod::NearestToLocation);
                let id = ctx.queue.submit(request);
                ctx.report.searches_submitted += 1;
                let poll_at = ctx.tick + ctx.repoll_ticks();
                trace!("Agent {} submitted {}", self.id, id);
                self.phase = AgentPhase::Searching { request: id, poll_at };
            }
            AgentPhase::Searching { request, poll_at } if ctx.tick >= poll_at => match ctx.queue.poll(request) {
                None => {
                    let poll_at = ctx.tick + ctx.repoll_ticks();
                    self.phase = AgentPhase::Searching { request, poll_at };
                }
                Some(candidates) => {
                    ctx.queue.cancel(request);
                    self.try_use(&candidates, ctx);
                }
            },
            AgentPhase::Occupying { claim, until_tick } if ctx.tick >= until_tick => {
                if ctx.subsystem.release(claim) {
                    ctx.report.completed_uses += 1;
                } else {
                    warn!("Agent {} lost its claim {} before releasing it", self.id, claim);
                    ctx.report.lost_claims += 1;
                }
                self.phase = AgentPhase::Idle {
                    until_tick: ctx.tick + ctx.repoll_ticks(),
                };
            }
            _ => {}
        }
    }

    fn try_use(&mut self, candidates: &CandidateSlots, ctx: &mut TickContext<'_>) {
        let entrance_request = EntranceLocationRequest::default()
            .nearest_to(self.location)
            .with_slot_fallback();

        for candidate in candidates.iter() {
            let slot = candidate.result.slot;
            let payload: UserPayload = Arc::new(self.id);
            let claim = ctx.subsystem.claim(slot, ClaimPriority::Normal, Some(payload));
            if !claim.is_valid() {
                ctx.report.claim_conflicts += 1;
                continue;
            }

            let Some(entrance) = ctx
                .subsystem
                .find_entrance_location_for_slot(slot, &entrance_request, ctx.navigation)
            else {
                debug!("Agent {} found no usable entrance for {}", self.id, slot);
                ctx.report.entrance_failures += 1;
                ctx.subsystem.release(claim);
                continue;
            };

            if ctx.subsystem.mark_slot_as_occupied(claim, None).is_none() {
                ctx.subsystem.release(claim);
                continue;
            }

            debug!("Agent {} occupies {} from {:?}", self.id, slot, entrance.location);
            self.location = entrance.location;
            ctx.report.occupations += 1;
            self.phase = AgentPhase::Occupying {
                claim,
                until_tick: ctx.tick + ctx.occupy_ticks,
            };
            return;
        }

        ctx.report.empty_searches += 1;
        self.phase = AgentPhase::Idle {
            until_tick: ctx.tick + ctx.repoll_ticks(),
        };
    }
}
