//! Dispatch planning under the shortest-completion-time policy.
//!
//! Planning is pure: callers snapshot pile load, the planner assigns
//! candidates and tracks queue growth in its local copy so successive
//! assignments within one round see the effect of earlier ones.

use uuid::Uuid;

use crate::domain::ChargingMode;

/// Snapshot of one admissible pile at planning time.
#[derive(Debug, Clone)]
pub struct PileLoad {
    pub id: String,
    /// Nominal power (kWh/h)
    pub power: f64,
    /// Queue bound including the charging slot (`Q`)
    pub capacity: u32,
    /// Requested capacities of the requests already queued, head first
    pub queued: Vec<f64>,
}

impl PileLoad {
    pub fn free_slots(&self) -> u32 {
        self.capacity.saturating_sub(self.queued.len() as u32)
    }

    /// Wait time (everyone already queued) plus own charging time, seconds.
    pub fn completion_secs(&self, capacity: f64) -> f64 {
        if self.power <= 0.0 {
            return f64::INFINITY;
        }
        let queued: f64 = self.queued.iter().sum();
        (queued + capacity) / self.power * 3600.0
    }
}

/// A request awaiting dispatch, in waiting-area order.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub request_id: Uuid,
    pub mode: ChargingMode,
    pub requested_capacity: f64,
    /// Numeric ticket for FIFO ordering
    pub ticket_seq: u64,
}

/// Planned placement of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub request_id: Uuid,
    pub pile_id: String,
    /// 1-based queue position
    pub position: u32,
}

/// Pick the pile minimizing completion time for `capacity`; ties broken by
/// lexicographic pile id. Returns the index into `piles`.
fn best_pile(piles: &[PileLoad], capacity: f64) -> Option<usize> {
    piles
        .iter()
        .enumerate()
        .filter(|(_, p)| p.free_slots() > 0)
        .min_by(|(_, a), (_, b)| {
            a.completion_secs(capacity)
                .partial_cmp(&b.completion_secs(capacity))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|(i, _)| i)
}

/// Normal-mode dispatch: strict FIFO over `candidates` (already filtered to
/// the piles' type), each placed on the pile with the shortest completion
/// time. Stops as soon as no admissible pile remains.
pub fn plan_normal(candidates: &[Candidate], piles: &mut [PileLoad]) -> Vec<Assignment> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| c.ticket_seq);

    let mut assignments = Vec::new();
    for candidate in ordered {
        let Some(idx) = best_pile(piles, candidate.requested_capacity) else {
            break;
        };
        let pile = &mut piles[idx];
        pile.queued.push(candidate.requested_capacity);
        assignments.push(Assignment {
            request_id: candidate.request_id,
            pile_id: pile.id.clone(),
            position: pile.queued.len() as u32,
        });
    }
    assignments
}

/// Batch-optimal dispatch: only runs once the waiting area can fill every
/// free slot across the admissible piles. Larger jobs are placed first and
/// the mode-to-type constraint is deliberately relaxed; the hard constraint
/// is only the per-pile queue bound.
///
/// Returns `None` when there are fewer waiting requests than free slots (the
/// round is deferred).
pub fn plan_batch(candidates: &[Candidate], piles: &mut [PileLoad]) -> Option<Vec<Assignment>> {
    let total_slots: u32 = piles.iter().map(|p| p.free_slots()).sum();
    if total_slots == 0 || (candidates.len() as u32) < total_slots {
        return None;
    }

    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        b.requested_capacity
            .partial_cmp(&a.requested_capacity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticket_seq.cmp(&b.ticket_seq))
    });
    ordered.truncate(total_slots as usize);

    let mut assignments = Vec::new();
    for candidate in ordered {
        let Some(idx) = best_pile(piles, candidate.requested_capacity) else {
            break;
        };
        let pile = &mut piles[idx];
        pile.queued.push(candidate.requested_capacity);
        assignments.push(Assignment {
            request_id: candidate.request_id,
            pile_id: pile.id.clone(),
            position: pile.queued.len() as u32,
        });
    }
    Some(assignments)
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pile(id: &str, power: f64, capacity: u32, queued: &[f64]) -> PileLoad {
        PileLoad {
            id: id.to_string(),
            power,
            capacity,
            queued: queued.to_vec(),
        }
    }

    fn candidate(seq: u64, mode: ChargingMode, capacity: f64) -> Candidate {
        Candidate {
            request_id: Uuid::new_v4(),
            mode,
            requested_capacity: capacity,
            ticket_seq: seq,
        }
    }

    #[test]
    fn completion_time_includes_queue_wait() {
        let p = pile("F1", 30.0, 2, &[15.0]);
        // (15 + 15) / 30 h = 1 h
        assert_eq!(p.completion_secs(15.0), 3600.0);
    }

    #[test]
    fn picks_pile_with_shortest_completion() {
        let mut piles = vec![
            pile("F1", 30.0, 2, &[30.0]), // completion for 15: (30+15)/30 = 1.5h
            pile("F2", 30.0, 2, &[]),     // completion for 15: 0.5h
        ];
        let cands = [candidate(1, ChargingMode::Fast, 15.0)];
        let plan = plan_normal(&cands, &mut piles);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].pile_id, "F2");
        assert_eq!(plan[0].position, 1);
    }

    #[test]
    fn ties_break_lexicographically() {
        let mut piles = vec![
            pile("F2", 30.0, 2, &[]),
            pile("F1", 30.0, 2, &[]),
        ];
        let cands = [candidate(1, ChargingMode::Fast, 10.0)];
        let plan = plan_normal(&cands, &mut piles);
        assert_eq!(plan[0].pile_id, "F1");
    }

    #[test]
    fn successive_requests_see_earlier_assignments() {
        let mut piles = vec![pile("F1", 30.0, 2, &[]), pile("F2", 30.0, 2, &[])];
        let cands = [
            candidate(1, ChargingMode::Fast, 10.0),
            candidate(2, ChargingMode::Fast, 10.0),
        ];
        let plan = plan_normal(&cands, &mut piles);
        // second request must not pile onto F1, whose local queue grew
        assert_eq!(plan[0].pile_id, "F1");
        assert_eq!(plan[1].pile_id, "F2");
    }

    #[test]
    fn stops_when_no_slot_remains() {
        let mut piles = vec![pile("F1", 30.0, 1, &[])];
        let cands = [
            candidate(1, ChargingMode::Fast, 10.0),
            candidate(2, ChargingMode::Fast, 10.0),
        ];
        let plan = plan_normal(&cands, &mut piles);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn fifo_by_ticket_not_input_order() {
        let mut piles = vec![pile("F1", 30.0, 1, &[])];
        let c2 = candidate(2, ChargingMode::Fast, 10.0);
        let c1 = candidate(1, ChargingMode::Fast, 10.0);
        let plan = plan_normal(&[c2.clone(), c1.clone()], &mut piles);
        assert_eq!(plan[0].request_id, c1.request_id);
    }

    #[test]
    fn batch_defers_until_slots_filled() {
        let mut piles = vec![pile("F1", 30.0, 2, &[]), pile("T1", 7.0, 2, &[])];
        let cands: Vec<Candidate> = (1..=3)
            .map(|n| candidate(n, ChargingMode::Fast, 10.0))
            .collect();
        // 4 free slots but only 3 candidates
        assert!(plan_batch(&cands, &mut piles).is_none());
    }

    #[test]
    fn batch_places_largest_first_ignoring_mode() {
        // two fast piles and one slow pile, all empty, Q=2 → 6 slots
        let mut piles = vec![
            pile("F1", 30.0, 2, &[]),
            pile("F2", 30.0, 2, &[]),
            pile("T1", 7.0, 2, &[]),
        ];
        let caps = [30.0, 20.0, 15.0, 10.0, 7.0, 4.0];
        let cands: Vec<Candidate> = caps
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let mode = if i % 2 == 0 {
                    ChargingMode::Fast
                } else {
                    ChargingMode::Slow
                };
                candidate(i as u64 + 1, mode, c)
            })
            .collect();

        let plan = plan_batch(&cands, &mut piles).expect("batch should run");
        assert_eq!(plan.len(), 6);

        // every pile exactly full
        for p in &piles {
            assert_eq!(p.free_slots(), 0);
        }
        // each pile holds positions 1..=2
        for pid in ["F1", "F2", "T1"] {
            let mut positions: Vec<u32> = plan
                .iter()
                .filter(|a| a.pile_id == pid)
                .map(|a| a.position)
                .collect();
            positions.sort();
            assert_eq!(positions, vec![1, 2]);
        }
        // the largest job lands on a fast pile (shortest own completion)
        let largest = cands
            .iter()
            .max_by(|a, b| {
                a.requested_capacity
                    .partial_cmp(&b.requested_capacity)
                    .unwrap()
            })
            .unwrap();
        let placed = plan
            .iter()
            .find(|a| a.request_id == largest.request_id)
            .unwrap();
        assert!(placed.pile_id.starts_with('F'));
    }

    #[test]
    fn zero_power_pile_is_never_preferred() {
        let mut piles = vec![pile("F1", 0.0, 2, &[]), pile("F2", 30.0, 2, &[])];
        let cands = [candidate(1, ChargingMode::Fast, 10.0)];
        let plan = plan_normal(&cands, &mut piles);
        assert_eq!(plan[0].pile_id, "F2");
    }
}
