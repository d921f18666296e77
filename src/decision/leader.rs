//! Centralized per-tick assignment.
//!
//! Once per tick the leader (the living agent with the lowest id) lists, for
//! every other living agent, the reachable cells on which it would survive
//! the tick. Each cell then takes the most urgent of its applicants who is
//! still unplaced and legally allowed onto it. This is a single greedy pass
//! over cells in id order, not an optimal matching. The plan is rebuilt from
//! scratch every tick.

use super::{reachable_cells, Candidate, Context};
use crate::agent::{Agent, AgentId};
use crate::cell::CellId;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

/// Placement priority; lower is more urgent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Urgency(pub f64);

impl Urgency {
    /// `disease flag + happiness + estimated remaining lifespan`
    pub fn of(agent: &Agent) -> Self {
        let sick = if agent.is_sick() { 1.0 } else { 0.0 };
        Urgency(sick + agent.happiness() + agent.estimated_remaining_lifespan())
    }
}

impl Eq for Urgency {}

impl PartialOrd for Urgency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Urgency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Heap entry; the max-heap pops the most urgent, then the lowest id
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Offer {
    urgency: Reverse<Urgency>,
    agent: Reverse<AgentId>,
}

/// Result of one auction
#[derive(Debug, Clone, Default)]
pub struct LeaderPlan {
    leader: Option<AgentId>,
    assignments: BTreeMap<AgentId, Candidate>,
    unplaced: Vec<AgentId>,
}

impl LeaderPlan {
    /// Run the auction over the current population
    pub fn build(ctx: &Context<'_>) -> Self {
        let leader = ctx.agents.values().find(|a| a.is_alive()).map(|a| a.id);

        let mut offers: BTreeMap<CellId, BinaryHeap<Offer>> = BTreeMap::new();
        let mut options: BTreeMap<(AgentId, CellId), Candidate> = BTreeMap::new();
        let followers: Vec<&Agent> = ctx
            .agents
            .values()
            .filter(|a| a.is_alive() && Some(a.id) != leader)
            .collect();

        for agent in &followers {
            let urgency = Urgency::of(agent);
            for candidate in reachable_cells(agent, ctx) {
                let (sugar, spice) = ctx.gain(&candidate);
                if !agent.survives_with(sugar, spice) {
                    continue;
                }
                offers.entry(candidate.cell).or_default().push(Offer {
                    urgency: Reverse(urgency),
                    agent: Reverse(agent.id),
                });
                options.insert((agent.id, candidate.cell), candidate);
            }
        }

        let mut assignments: BTreeMap<AgentId, Candidate> = BTreeMap::new();
        for (cell, mut heap) in offers {
            while let Some(Offer {
                agent: Reverse(id), ..
            }) = heap.pop()
            {
                if assignments.contains_key(&id) {
                    continue;
                }
                let Some(agent) = ctx.agents.get(&id).filter(|a| a.is_alive()) else {
                    continue;
                };
                if !Self::may_enter(agent, cell, ctx) {
                    continue;
                }
                if let Some(candidate) = options.get(&(id, cell)) {
                    assignments.insert(id, *candidate);
                    break;
                }
            }
        }

        let unplaced: Vec<AgentId> = followers
            .iter()
            .map(|a| a.id)
            .filter(|id| !assignments.contains_key(id))
            .collect();

        log::trace!(
            "Leader {:?} placed {} agents, {} unplaced",
            leader,
            assignments.len(),
            unplaced.len()
        );

        Self {
            leader,
            assignments,
            unplaced,
        }
    }

    /// Free, already ours, or held by legal prey
    pub fn may_enter(agent: &Agent, cell: CellId, ctx: &Context<'_>) -> bool {
        match ctx.occupant(cell) {
            None => true,
            Some(occupant) if occupant.id == agent.id => true,
            Some(occupant) => ctx.combat_enabled() && agent.can_prey_on(occupant),
        }
    }

    pub fn leader(&self) -> Option<AgentId> {
        self.leader
    }

    #[inline]
    pub fn is_leader(&self, agent: AgentId) -> bool {
        self.leader == Some(agent)
    }

    /// Assigned cell for a follower
    pub fn target(&self, agent: AgentId) -> Option<&Candidate> {
        self.assignments.get(&agent)
    }

    /// Followers the auction could not place
    pub fn unplaced(&self) -> &[AgentId] {
        &self.unplaced
    }

    pub fn assigned(&self) -> usize {
        self.assignments.len()
    }
}
