use crate::core::seed::{seeded_shuffle, Seed};

use super::pool::{ContentFamily, PhaseKey, StimulusPool};

/// Which seed orders the stimuli *inside* an assigned group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedScope {
    /// Participant seed only; the group plays in the same order for every phase.
    User,
    /// `"{user}_{phase}"`; uncorrelated order per phase.
    UserPhase,
}

/// The group of one pool that belongs to one participant in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAssignment {
    pub pool: StimulusPool,
    pub phase_key: PhaseKey,
    /// Slot in the participant's shuffled group order.
    pub slot: usize,
    /// Stimulus numbers in pool order.
    pub stimuli: Vec<u16>,
    user_id: String,
}

impl GroupAssignment {
    /// Stimuli in the order they are presented.
    pub fn presentation_order(&self, scope: SeedScope) -> Vec<u16> {
        let seed = match scope {
            SeedScope::User => Seed::for_user(&self.user_id),
            SeedScope::UserPhase => Seed::for_user_phase(&self.user_id, &self.phase_key.as_key()),
        };
        seeded_shuffle(&self.stimuli, seed)
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }
}

/// Every group of `pool` in the participant's shuffled order.
pub fn all_groups(pool: &StimulusPool, user_id: &str) -> Vec<Vec<u16>> {
    seeded_shuffle(&pool.contiguous_groups(), Seed::for_user(user_id))
}

/// Resolve the group `phase_key` reads for `user_id`. Pure; recomputed on every call.
pub fn assign_group(pool: &StimulusPool, phase_key: &PhaseKey, user_id: &str) -> GroupAssignment {
    let groups = all_groups(pool, user_id);
    let slot = slot_for(pool, phase_key, groups.len());
    let stimuli = groups.get(slot).cloned().unwrap_or_default();

    GroupAssignment {
        pool: *pool,
        phase_key: phase_key.clone(),
        slot,
        stimuli,
        user_id: user_id.to_string(),
    }
}

/// Hand-assigned slot per phase. Unknown or inapplicable keys take the last slot,
/// which for the intelligibility pool is never used by a real phase.
fn slot_for(pool: &StimulusPool, phase_key: &PhaseKey, group_count: usize) -> usize {
    if group_count == 0 {
        return 0;
    }
    let reserved = group_count - 1;

    let slot = match (pool.family, phase_key) {
        (ContentFamily::Intelligibility, PhaseKey::Pretest) => 0,
        (ContentFamily::Intelligibility, PhaseKey::TrainingDay(day)) if (1..=4).contains(day) => {
            usize::from(*day)
        }
        (ContentFamily::Intelligibility, PhaseKey::Posttest1) => 5,
        (ContentFamily::Intelligibility, PhaseKey::Posttest2) => 6,
        (
            ContentFamily::ListeningEffort | ContentFamily::ComprehensionStories,
            PhaseKey::Pretest,
        ) => 0,
        (
            ContentFamily::ListeningEffort | ContentFamily::ComprehensionStories,
            PhaseKey::Posttest1,
        ) => 1,
        (
            ContentFamily::ListeningEffort | ContentFamily::ComprehensionStories,
            PhaseKey::Posttest2,
        ) => 2,
        (ContentFamily::TrainingNarratives, PhaseKey::TrainingDay(day)) if *day >= 1 => {
            usize::from(*day) - 1
        }
        _ => reserved,
    };

    slot % group_count
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::stimuli::pool::{EFFORT_POOL, INTELLIGIBILITY_POOL};

    fn phases() -> Vec<PhaseKey> {
        vec![
            PhaseKey::Pretest,
            PhaseKey::TrainingDay(1),
            PhaseKey::TrainingDay(2),
            PhaseKey::TrainingDay(3),
            PhaseKey::TrainingDay(4),
            PhaseKey::Posttest1,
            PhaseKey::Posttest2,
        ]
    }

    #[test]
    fn intelligibility_groups_partition_the_pool() {
        for user in ["p1", "p2", "participant-0042", ""] {
            let groups = all_groups(&INTELLIGIBILITY_POOL, user);
            assert_eq!(groups.len(), 8);
            let mut seen = BTreeSet::new();
            for group in &groups {
                assert_eq!(group.len(), 20);
                for stimulus in group {
                    assert!(seen.insert(*stimulus), "{stimulus} appears twice for {user}");
                }
            }
            assert_eq!(seen, (1..=160).collect::<BTreeSet<u16>>());
        }
    }

    #[test]
    fn assignment_is_deterministic() {
        let a = assign_group(&INTELLIGIBILITY_POOL, &PhaseKey::Pretest, "p1");
        let b = assign_group(&INTELLIGIBILITY_POOL, &PhaseKey::Pretest, "p1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
        assert_eq!(
            a.presentation_order(SeedScope::UserPhase),
            b.presentation_order(SeedScope::UserPhase)
        );
    }

    #[test]
    fn phases_never_share_a_group() {
        let assigned: Vec<BTreeSet<u16>> = phases()
            .iter()
            .map(|key| {
                assign_group(&INTELLIGIBILITY_POOL, key, "p1")
                    .stimuli
                    .into_iter()
                    .collect()
            })
            .collect();
        for (i, a) in assigned.iter().enumerate() {
            for b in assigned.iter().skip(i + 1) {
                assert!(a.is_disjoint(b));
            }
        }
    }

    #[test]
    fn unknown_phase_uses_reserved_group() {
        let spare = assign_group(
            &INTELLIGIBILITY_POOL,
            &PhaseKey::Other("practice".into()),
            "p1",
        );
        assert_eq!(spare.slot, 7);
        let used: BTreeSet<u16> = phases()
            .iter()
            .flat_map(|key| assign_group(&INTELLIGIBILITY_POOL, key, "p1").stimuli)
            .collect();
        assert!(spare.stimuli.iter().all(|s| !used.contains(s)));
    }

    #[test]
    fn effort_pool_has_three_disjoint_slots() {
        let pre = assign_group(&EFFORT_POOL, &PhaseKey::Pretest, "p7");
        let post1 = assign_group(&EFFORT_POOL, &PhaseKey::Posttest1, "p7");
        let post2 = assign_group(&EFFORT_POOL, &PhaseKey::Posttest2, "p7");
        assert_eq!((pre.slot, post1.slot, post2.slot), (0, 1, 2));
        let mut all: Vec<u16> = [pre.stimuli, post1.stimuli, post2.stimuli].concat();
        all.sort_unstable();
        assert_eq!(all, (1..=90).collect::<Vec<u16>>());
    }

    #[test]
    fn slot_stays_in_bounds_for_smaller_pools() {
        let small = StimulusPool {
            family: ContentFamily::Intelligibility,
            size: 60,
            group_size: 20,
        };
        let post2 = assign_group(&small, &PhaseKey::Posttest2, "p1");
        assert_eq!(post2.slot, 6 % 3);
        assert_eq!(post2.len(), 20);
    }

    #[test]
    fn presentation_order_permutes_only_the_group() {
        let assignment = assign_group(&INTELLIGIBILITY_POOL, &PhaseKey::Posttest1, "p3");
        let mut ordered = assignment.presentation_order(SeedScope::UserPhase);
        ordered.sort_unstable();
        let mut members = assignment.stimuli.clone();
        members.sort_unstable();
        assert_eq!(ordered, members);
    }
}
