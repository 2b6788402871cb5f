use crate::types::Address;
use std::collections::HashSet;

/// Identity of one turn. A new deadline for the same address is a new turn,
/// so legitimate repeat turns produce distinct keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TurnKey {
    pub match_id: u64,
    pub turn: Address,
    pub deadline: u64,
}

impl TurnKey {
    pub fn new(match_id: u64, turn: Address, deadline: u64) -> Self {
        Self {
            match_id,
            turn,
            deadline,
        }
    }
}

/// Sole admission gate into turn handling: a key is claimed at most once per
/// process lifetime, so an overlapping or slow poll cycle can never act on
/// the same turn twice. Claims are cleared in bulk when a new match is
/// adopted, never individually.
#[derive(Debug, Default)]
pub struct TurnDetector {
    claimed: HashSet<TurnKey>,
}

impl TurnDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly the first time a key is seen.
    pub fn claim(&mut self, key: TurnKey) -> bool {
        self.claimed.insert(key)
    }

    pub fn reset(&mut self) {
        self.claimed.clear();
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn key(match_id: u64, turn: &str, deadline: u64) -> TurnKey {
        TurnKey::new(match_id, Address::from(turn), deadline)
    }

    #[test]
    fn claim__accepts_first_then_rejects_identical_key() {
        let mut detector = TurnDetector::new();

        assert!(detector.claim(key(7, "0xaa", 1000)));
        assert!(!detector.claim(key(7, "0xaa", 1000)));
        assert!(!detector.claim(key(7, "0xaa", 1000)));
    }

    #[test]
    fn claim__same_address_new_deadline_is_a_new_turn() {
        let mut detector = TurnDetector::new();

        assert!(detector.claim(key(7, "0xaa", 1000)));
        assert!(detector.claim(key(7, "0xaa", 1060)));
    }

    #[test]
    fn claim__distinguishes_matches_with_coinciding_deadlines() {
        let mut detector = TurnDetector::new();

        assert!(detector.claim(key(7, "0xaa", 1000)));
        assert!(detector.claim(key(8, "0xaa", 1000)));
    }

    #[test]
    fn reset__forgets_all_claims() {
        let mut detector = TurnDetector::new();
        assert!(detector.claim(key(7, "0xaa", 1000)));
        assert!(detector.claim(key(7, "0xbb", 1060)));

        detector.reset();

        assert_eq!(0, detector.claimed_count());
        assert!(detector.claim(key(7, "0xaa", 1000)));
    }
}
