//! Feed slot assignment.
//!
//! Maps a transmitter identity to one of a fixed number of display slots.
//! The rules are tried in strict order:
//!
//! 1. the identity's preferred slot, if unassigned or already its own;
//! 2. the slot the identity already holds;
//! 3. the first unassigned slot that is nobody else's preferred slot;
//! 4. the first unassigned slot at all;
//! 5. slot 0, overwriting its holder.

use std::collections::HashMap;

use crate::error::ConfigError;

/// Who owns a slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotAssignment {
    #[default]
    Unassigned,
    Assigned(String),
}

impl SlotAssignment {
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(id) => Some(id),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, Self::Unassigned)
    }

    fn is_held_by(&self, identity: &str) -> bool {
        self.identity() == Some(identity)
    }
}

#[derive(Debug, Clone)]
pub struct FeedSlot<I> {
    pub assignment: SlotAssignment,
    pub last_image: Option<I>,
}

impl<I> Default for FeedSlot<I> {
    fn default() -> Self {
        Self {
            assignment: SlotAssignment::Unassigned,
            last_image: None,
        }
    }
}

/// Which rule picked the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentRule {
    Preferred,
    Existing,
    Unreserved,
    AnyUnassigned,
    Overwrite,
}

/// Outcome of one assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChoice {
    pub index: usize,
    pub rule: AssignmentRule,
    /// A different identity that lost this slot.
    pub displaced: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedSlotTable<I> {
    slots: Vec<FeedSlot<I>>,
    preferred: HashMap<String, usize>,
}

impl<I> FeedSlotTable<I> {
    pub fn new(slot_count: usize, preferred: HashMap<String, usize>) -> Result<Self, ConfigError> {
        if slot_count == 0 {
            return Err(ConfigError::NoSlots);
        }
        if let Some((identity, &slot)) = preferred.iter().find(|(_, slot)| **slot >= slot_count) {
            return Err(ConfigError::PreferredSlotOutOfRange {
                identity: identity.clone(),
                slot,
                slot_count,
            });
        }
        Ok(Self {
            slots: (0..slot_count).map(|_| FeedSlot::default()).collect(),
            preferred,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FeedSlot<I>] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&FeedSlot<I>> {
        self.slots.get(index)
    }

    pub fn preferred_slot(&self, identity: &str) -> Option<usize> {
        self.preferred.get(identity).copied()
    }

    /// The slot `identity` currently holds.
    pub fn slot_of(&self, identity: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.assignment.is_held_by(identity))
    }

    /// Pick a slot without changing anything.
    pub fn choose(&self, identity: &str) -> (usize, AssignmentRule) {
        if let Some(pref) = self.preferred_slot(identity) {
            let slot = &self.slots[pref].assignment;
            if slot.is_unassigned() || slot.is_held_by(identity) {
                return (pref, AssignmentRule::Preferred);
            }
        }

        if let Some(held) = self.slot_of(identity) {
            return (held, AssignmentRule::Existing);
        }

        let reserved_for_other = |index: usize| {
            self.preferred
                .iter()
                .any(|(owner, &slot)| slot == index && owner != identity)
        };
        let mut free = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.assignment.is_unassigned())
            .map(|(index, _)| index);

        if let Some(index) = free.clone().find(|&index| !reserved_for_other(index)) {
            return (index, AssignmentRule::Unreserved);
        }

        if let Some(index) = free.next() {
            return (index, AssignmentRule::AnyUnassigned);
        }

        (0, AssignmentRule::Overwrite)
    }

    /// Pick a slot and store `image` there under `identity`.
    ///
    /// If the identity moves to its preferred slot while holding another,
    /// the old slot is released so no identity ever holds two slots.
    pub fn assign(&mut self, identity: &str, image: I) -> SlotChoice {
        let (index, rule) = self.choose(identity);

        if let Some(previous) = self.slot_of(identity).filter(|&held| held != index) {
            self.slots[previous] = FeedSlot::default();
        }

        let slot = &mut self.slots[index];
        let displaced = match &slot.assignment {
            SlotAssignment::Assigned(owner) if owner != identity => Some(owner.clone()),
            _ => None,
        };
        slot.assignment = SlotAssignment::Assigned(identity.to_string());
        slot.last_image = Some(image);

        SlotChoice {
            index,
            rule,
            displaced,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn table(prefs: &[(&str, usize)]) -> FeedSlotTable<u32> {
        let preferred = prefs.iter().map(|(id, s)| (id.to_string(), *s)).collect();
        FeedSlotTable::new(4, preferred).unwrap()
    }

    fn holders(t: &FeedSlotTable<u32>) -> Vec<Option<&str>> {
        t.slots().iter().map(|s| s.assignment.identity()).collect()
    }

    #[test]
    fn arrival_sequence_a_to_e() {
        let mut t = table(&[("A", 0), ("B", 1)]);
        let picks: Vec<_> = ["A", "B", "C", "D", "E"]
            .iter()
            .enumerate()
            .map(|(n, id)| t.assign(id, n as u32).index)
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 3, 0]);
        assert_eq!(holders(&t), vec![Some("E"), Some("B"), Some("C"), Some("D")]);
        assert_eq!(t.slot(0).unwrap().last_image, Some(4));
    }

    #[test]
    fn rule_1_preferred_slot_when_free_or_own() {
        let mut t = table(&[("A", 2)]);
        let c = t.assign("A", 1);
        assert_eq!((c.index, c.rule), (2, AssignmentRule::Preferred));
        let c = t.assign("A", 2);
        assert_eq!((c.index, c.rule), (2, AssignmentRule::Preferred));
        assert_eq!(t.slot(2).unwrap().last_image, Some(2));
    }

    #[test]
    fn rule_1_beats_rule_2() {
        // A prefers 0, but 0 is taken, so A lands on 1. Once 0 frees up
        // A moves back to its preferred slot and releases slot 1.
        let mut t = table(&[("A", 0), ("X", 3)]);
        t.slots[0].assignment = SlotAssignment::Assigned("Z".into());
        let c = t.assign("A", 1);
        assert_eq!((c.index, c.rule), (1, AssignmentRule::Unreserved));

        t.slots[0] = FeedSlot::default();
        let c = t.assign("A", 2);
        assert_eq!((c.index, c.rule), (0, AssignmentRule::Preferred));
        assert_eq!(t.slot_of("A"), Some(0));
        assert!(t.slot(1).unwrap().assignment.is_unassigned());
    }

    #[test]
    fn rule_2_keeps_existing_slot() {
        let mut t = table(&[("A", 0)]);
        t.assign("B", 1);
        assert_eq!(t.slot_of("B"), Some(1));
        t.assign("Q", 0);
        // B has no preference; it keeps slot 1 even though slot 3 is free.
        let c = t.assign("B", 2);
        assert_eq!((c.index, c.rule), (1, AssignmentRule::Existing));
    }

    #[test]
    fn rule_2_when_preferred_slot_is_taken() {
        let mut t = table(&[("A", 0)]);
        t.slots[0].assignment = SlotAssignment::Assigned("Z".into());
        t.assign("A", 1);
        assert_eq!(t.slot_of("A"), Some(1));
        let c = t.assign("A", 2);
        assert_eq!((c.index, c.rule), (1, AssignmentRule::Existing));
    }

    #[test]
    fn rule_3_skips_other_identities_preferred_slots() {
        let mut t = table(&[("A", 0), ("B", 1)]);
        let c = t.assign("C", 0);
        assert_eq!((c.index, c.rule), (2, AssignmentRule::Unreserved));
    }

    #[test]
    fn rule_4_uses_reserved_slot_as_fallback() {
        let mut t = table(&[("A", 0), ("B", 1)]);
        t.assign("C", 0);
        t.assign("D", 0);
        let c = t.assign("E", 0);
        assert_eq!((c.index, c.rule), (0, AssignmentRule::AnyUnassigned));
        assert_eq!(c.displaced, None);
    }

    #[test]
    fn rule_5_overwrites_slot_zero() {
        let mut t = table(&[]);
        for id in ["P", "Q", "R", "S"] {
            t.assign(id, 0);
        }
        let c = t.assign("T", 9);
        assert_eq!((c.index, c.rule), (0, AssignmentRule::Overwrite));
        assert_eq!(c.displaced.as_deref(), Some("P"));
        assert_eq!(t.slot_of("P"), None);
    }

    #[test]
    fn identity_never_holds_two_slots() {
        let mut t = table(&[("A", 0), ("B", 1), ("C", 2)]);
        for id in ["D", "C", "A", "E", "B", "D", "F", "A", "C", "G", "A"] {
            t.assign(id, 0);
            let mut seen: Vec<_> = holders(&t).into_iter().flatten().collect();
            let before = seen.len();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), before, "after {id}: {:?}", holders(&t));
        }
    }

    #[test]
    fn configurable_slot_count() {
        let t: FeedSlotTable<()> = FeedSlotTable::new(9, HashMap::new()).unwrap();
        assert_eq!(t.len(), 9);
        assert!(matches!(
            FeedSlotTable::<()>::new(0, HashMap::new()),
            Err(ConfigError::NoSlots)
        ));
        let bad = HashMap::from([("A".to_string(), 4)]);
        assert!(matches!(
            FeedSlotTable::<()>::new(4, bad),
            Err(ConfigError::PreferredSlotOutOfRange { slot: 4, .. })
        ));
    }
}
