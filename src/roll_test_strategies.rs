use std::collections::VecDeque;
use proptest::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use crate::{DieSource, Registry};


/// Replays a fixed list of raw rolls.
#[derive(Debug)]
pub(crate) struct Scripted {
    draws: VecDeque<u32>,
}

impl Scripted {
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self { draws: draws.into_iter().collect() }
    }
}

impl DieSource for Scripted {
    fn draw(&mut self, sides: u32) -> u32 {
        let raw = self.draws.pop_front().expect("scripted draws exhausted");
        assert!(raw < sides, "scripted draw {raw} out of range for {sides} sides");
        raw
    }
}


pub(crate) fn seeded_rng() -> impl Strategy<Value = StdRng> {
    any::<u64>().prop_map(StdRng::seed_from_u64)
}

pub(crate) fn fixture_registry() -> Registry {
    Registry::from_json_str(r#"{
        "F": {
            "name": "Fudge",
            "faces": ["-", "0", "+"],
            "values": { "-": -1, "+": 1 },
            "names": { "-": "minus", "0": "blank", "+": "plus" }
        },
        "skill": {
            "name": "Skill",
            "sides": 6,
            "success": { "op": ">=", "value": 5 },
            "boon": { "op": ">=", "value": 6 },
            "crit_success": 6
        },
        "glyph": {
            "name": "Glyph",
            "faces": ["sun", "moon", "star"],
            "complication": { "op": "=", "value": ["moon"] }
        }
    }"#).unwrap()
}
