use std::{fmt::Display, ops::Range, sync::Arc};
use rand::Rng;
use serde::{Serialize, Serializer};
use tracing::{debug, trace, warn};
use crate::{Category, ClauseSet, DiceType, Error, Face};


/// Upper bound on explosion iterations for a single term.
pub const ITERATION_LIMIT: usize = 100;

/// Most dice a single term may roll before explosions.
pub const MAX_DICE: u32 = 10_000;


/// Source of uniform die draws.
///
/// Every [`rand::Rng`] is a `DieSource`; tests and replays can supply their own.
pub trait DieSource {
    /// Returns a raw roll in `[0, sides)`. `sides` is never zero.
    fn draw(&mut self, sides: u32) -> u32;
}

impl<R: Rng + ?Sized> DieSource for R {
    fn draw(&mut self, sides: u32) -> u32 {
        self.random_range(0..sides)
    }
}


/// Keep rule of a term: retain only the `n` highest or lowest dice.
///
/// Dice are ordered by raw roll index, not by resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Keep {
    /// `k<n>`
    Highest(u32),
    /// `kl<n>`
    Lowest(u32),
}

impl Keep {
    /// Number of dice to keep.
    pub fn n(self) -> u32 {
        match self {
            Keep::Highest(n) | Keep::Lowest(n) => n
        }
    }

    /// Returns the kept rolls in ascending order. Keeps `min(n, rolls.len())` dice.
    ///
    /// # Examples
    /// ```
    /// use faceroll::Keep;
    ///
    /// assert_eq!(Keep::Highest(2).apply(&[5, 0, 2, 4]), vec![4, 5]);
    /// assert_eq!(Keep::Lowest(1).apply(&[5, 0, 2, 4]), vec![0]);
    /// assert!(Keep::Highest(0).apply(&[5, 0]).is_empty());
    /// ```
    pub fn apply(self, rolls: &[u32]) -> Vec<u32> {
        let mut sorted = rolls.to_vec();
        sorted.sort_unstable();

        let n = (self.n() as usize).min(sorted.len());
        match self {
            Keep::Highest(_) => sorted.split_off(sorted.len() - n),
            Keep::Lowest(_) => {
                sorted.truncate(n);
                sorted
            }
        }
    }
}

impl Display for Keep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Keep::Highest(n) => write!(f, "k{n}"),
            Keep::Lowest(n) => write!(f, "kl{n}"),
        }
    }
}


/// Per-category counts. `None` means the category was never activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Count for [`Category::Success`].
    pub success: Option<i64>,
    /// Count for [`Category::Failure`].
    pub failure: Option<i64>,
    /// Count for [`Category::Boon`].
    pub boon: Option<i64>,
    /// Count for [`Category::Complication`].
    pub complication: Option<i64>,
}

impl Counters {
    /// Count of `category`, `None` if inactive.
    pub fn get(&self, category: Category) -> Option<i64> {
        match category {
            Category::Success => self.success,
            Category::Failure => self.failure,
            Category::Boon => self.boon,
            Category::Complication => self.complication,
        }
    }

    fn slot(&mut self, category: Category) -> &mut Option<i64> {
        match category {
            Category::Success => &mut self.success,
            Category::Failure => &mut self.failure,
            Category::Boon => &mut self.boon,
            Category::Complication => &mut self.complication,
        }
    }

    /// True when no category is active.
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|category| self.get(*category).is_none())
    }

    /// Adds the active categories of `other`; categories inactive in both stay `None`.
    pub fn merge(&mut self, other: &Counters) {
        for category in Category::ALL {
            if let Some(count) = other.get(category) {
                let slot = self.slot(category);
                *slot = Some(slot.unwrap_or(0).saturating_add(count));
            }
        }
    }
}


/// One dice operand such as `4d6!r1k3`, and the outcome of rolling it.
///
/// Rolls are raw face indices. Every reroll, explosion or keep pushes a copy of
/// the roll list onto [`DiceTerm::history`] before changing it.
#[derive(Debug, Clone, Serialize)]
pub struct DiceTerm {
    source: String,
    code: String,
    count: u32,
    #[serde(skip)]
    dice: Arc<DiceType>,
    clauses: ClauseSet,
    rolls: Vec<u32>,
    history: Vec<Vec<u32>>,
    faces: Vec<Face>,
    sum: Option<i64>,
    counters: Counters,
    #[serde(serialize_with = "serialize_error")]
    error: Option<Error>,
}

impl DiceTerm {
    pub(crate) fn new(source: &str, code: &str, count: u32, dice: Arc<DiceType>, clauses: ClauseSet) -> Self {
        Self {
            source: source.into(),
            code: code.into(),
            count,
            dice,
            clauses,
            rolls: Vec::new(),
            history: Vec::new(),
            faces: Vec::new(),
            sum: None,
            counters: Counters::default(),
            error: None,
        }
    }

    /// Rolls the term: initial roll, reroll pass, explosions, keep rule, then counting.
    ///
    /// Faces without a numeric value do not fail the roll; they are recorded
    /// in [`DiceTerm::error`] and leave [`DiceTerm::sum`] empty.
    ///
    /// # Errors
    /// Returns [`Error::IterationLimitExceeded`] if explosions keep producing
    /// dice for more than [`ITERATION_LIMIT`] iterations.
    pub fn resolve<S: DieSource + ?Sized>(&mut self, rng: &mut S) -> Result<(), Error> {
        let sides = self.dice.sides();

        self.history.clear();
        self.rolls = (0..self.count).map(|_| rng.draw(sides)).collect();

        self.reroll(rng, 0..self.rolls.len());
        self.explode(rng)?;

        if let Some(keep) = self.clauses.keep {
            self.snapshot();
            self.rolls = keep.apply(&self.rolls);
        }

        self.tally();

        debug!(term = %self.source, rolls = ?self.rolls, sum = ?self.sum, "Resolved dice term");
        Ok(())
    }

    fn snapshot(&mut self) {
        self.history.push(self.rolls.clone());
    }

    fn matches_any(&self, raw: u32, atoms: &[crate::Atom]) -> bool {
        let face = self.dice.face(raw);
        atoms.iter().any(|atom| atom.matches(&face))
    }

    /// Replaces each roll in `range` that shows a reroll face with one fresh draw.
    fn reroll<S: DieSource + ?Sized>(&mut self, rng: &mut S, range: Range<usize>) {
        if self.clauses.reroll.is_empty() {
            return;
        }

        let targets: Vec<usize> = range
            .filter(|&i| self.matches_any(self.rolls[i], &self.clauses.reroll))
            .collect();

        if targets.is_empty() {
            return;
        }

        self.snapshot();
        for i in targets {
            let old = self.rolls[i];
            self.rolls[i] = rng.draw(self.dice.sides());
            trace!(term = %self.source, old, new = self.rolls[i], "Rerolled die");
        }
    }

    /// Draws one extra die per exploding face until an iteration adds nothing.
    fn explode<S: DieSource + ?Sized>(&mut self, rng: &mut S) -> Result<(), Error> {
        if self.clauses.explode.is_empty() {
            return Ok(());
        }

        let mut pending = 0..self.rolls.len();
        let mut iterations = 0;

        loop {
            let triggered = self.rolls[pending.clone()]
                .iter()
                .filter(|&&raw| self.matches_any(raw, &self.clauses.explode))
                .count();

            if triggered == 0 {
                return Ok(());
            }

            iterations += 1;
            if iterations > ITERATION_LIMIT {
                return Err(Error::IterationLimitExceeded {
                    term: self.source.clone(),
                    limit: ITERATION_LIMIT,
                });
            }

            self.snapshot();
            let start = self.rolls.len();
            for _ in 0..triggered {
                let raw = rng.draw(self.dice.sides());
                self.rolls.push(raw);
            }
            trace!(term = %self.source, iteration = iterations, added = triggered, "Exploded dice");

            pending = start..self.rolls.len();
            self.reroll(rng, pending.clone());
        }
    }

    fn tally(&mut self) {
        self.faces = self.rolls.iter().map(|&raw| self.dice.face(raw)).collect();
        self.sum = self.faces.iter()
            .map(|face| face.value)
            .try_fold(0i64, |sum, value| value.map(|value| sum.saturating_add(value)));
        self.counters = Counters::default();

        let mut unresolved = self.faces.iter()
            .find(|face| face.value.is_none())
            .map(|face| face.label.clone());

        for category in Category::ALL {
            let clause = self.clauses.category(category);
            if !clause.is_active() {
                continue;
            }

            let mut count = 0i64;
            for face in &self.faces {
                match clause.score(face) {
                    Some(score) => count += score,
                    None => {
                        unresolved.get_or_insert_with(|| face.label.clone());
                    }
                }
            }

            *self.counters.slot(category) = Some(count);
        }

        self.error = unresolved.map(|face| {
            warn!(term = %self.source, face = %face, "Rolled a face without numeric value");
            Error::UnknownDiceValue { term: self.source.clone(), face }
        });
    }

    /// Source text of the term.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Dice-type code as written, e.g. `20` or `F`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of dice rolled before explosions and keep.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Dice type the code resolved to.
    pub fn dice(&self) -> &DiceType {
        &self.dice
    }

    /// Decoded options, natural rules included.
    pub fn clauses(&self) -> &ClauseSet {
        &self.clauses
    }

    /// Final raw rolls, after rerolls, explosions and the keep rule.
    pub fn rolls(&self) -> &[u32] {
        &self.rolls
    }

    /// Roll lists as they were before each mutation, oldest first.
    pub fn history(&self) -> &[Vec<u32>] {
        &self.history
    }

    /// Final rolls resolved to faces.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Sum of the final faces, saturating at the `i64` bounds. `None` if any
    /// face has no numeric value.
    pub fn sum(&self) -> Option<i64> {
        self.sum
    }

    /// Counts of the categories this term activates.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Resolution problem of this term, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}

impl Display for DiceTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d{}{}", self.count, self.code, self.clauses)
    }
}

fn serialize_error<S: Serializer>(error: &Option<Error>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.collect_str(error),
        None => serializer.serialize_none(),
    }
}


#[cfg(test)]
mod test {
    use std::num::NonZeroU32;
    use proptest::prelude::*;
    use super::*;
    use crate::roll_test_strategies::{Scripted, fixture_registry, seeded_rng};


    fn term(options: &str, count: u32, dice: DiceType) -> DiceTerm {
        let clauses = ClauseSet::decode(options, &dice).unwrap();
        DiceTerm::new(&format!("{count}d?{options}"), "?", count, Arc::new(dice), clauses)
    }

    fn d(sides: u32) -> DiceType {
        DiceType::uniform(NonZeroU32::new(sides).unwrap())
    }

    fn values(term: &DiceTerm) -> Vec<i64> {
        term.faces().iter().map(|face| face.value.unwrap()).collect()
    }

    proptest! {
        #[test]
        fn test_plain_roll_stays_in_range(count in 1u32..=50, sides in 1u32..=100, mut rng in seeded_rng()) {
            let mut term = term("", count, d(sides));
            term.resolve(&mut rng).unwrap();

            prop_assert_eq!(term.rolls().len(), count as usize);
            prop_assert!(term.rolls().iter().all(|&raw| raw < sides));
            prop_assert!(term.history().is_empty());
            prop_assert!(term.counters().is_empty());

            let sum = term.sum().unwrap();
            prop_assert!(sum >= i64::from(count) && sum <= i64::from(count * sides));
        }

        #[test]
        fn test_unmatched_reroll_and_explode_keep_count(count in 1u32..=20, mut rng in seeded_rng()) {
            let mut term = term("!7r8", count, d(6));
            term.resolve(&mut rng).unwrap();

            prop_assert_eq!(term.rolls().len(), count as usize);
            prop_assert!(term.history().is_empty());
        }

        #[test]
        fn test_keep_returns_min_n(
            rolls in prop::collection::vec(0u32..20, 0..20),
            n in 0u32..25
        ) {
            let highest = Keep::Highest(n).apply(&rolls);
            let lowest = Keep::Lowest(n).apply(&rolls);
            let expected = (n as usize).min(rolls.len());

            prop_assert_eq!(highest.len(), expected);
            prop_assert_eq!(lowest.len(), expected);

            if 2 * expected <= rolls.len() {
                if let (Some(min_high), Some(max_low)) = (highest.iter().min(), lowest.iter().max()) {
                    prop_assert!(min_high >= max_low);
                }
            }
        }

        #[test]
        fn test_keep_on_term(count in 1u32..=10, n in 0u32..12, mut rng in seeded_rng()) {
            let mut term = term(&format!("k{n}"), count, d(20));
            term.resolve(&mut rng).unwrap();

            prop_assert_eq!(term.rolls().len(), (n as usize).min(count as usize));
            prop_assert_eq!(term.history().len(), 1);
            prop_assert_eq!(term.history()[0].len(), count as usize);
        }

        #[test]
        fn test_explosions_terminate(count in 1u32..=10, mut rng in seeded_rng()) {
            let mut term = term("!", count, d(6));
            prop_assert!(term.resolve(&mut rng).is_ok());
            prop_assert!(term.rolls().len() >= count as usize);
        }
    }

    #[test]
    fn test_keep_highest_three() {
        let mut term = term("k3", 4, d(6));
        term.resolve(&mut Scripted::new([5, 0, 2, 4])).unwrap();

        assert_eq!(values(&term), vec![3, 5, 6]);
        assert_eq!(term.sum(), Some(14));
        assert_eq!(term.history(), &[vec![5, 0, 2, 4]]);
    }

    #[test]
    fn test_keep_lowest_one() {
        let mut term = term("kl1", 2, d(20));
        term.resolve(&mut Scripted::new([17, 3])).unwrap();

        assert_eq!(values(&term), vec![4]);
    }

    #[test]
    fn test_initial_reroll_replaces_once() {
        let mut term = term("r1", 3, d(6));
        term.resolve(&mut Scripted::new([0, 3, 0, 0, 5])).unwrap();

        assert_eq!(values(&term), vec![1, 4, 6]);
        assert_eq!(term.history(), &[vec![0, 3, 0]]);
    }

    #[test]
    fn test_explosion_chain() {
        let mut term = term("!", 2, d(6));
        term.resolve(&mut Scripted::new([5, 2, 5, 1])).unwrap();

        assert_eq!(values(&term), vec![6, 3, 6, 2]);
        assert_eq!(term.sum(), Some(17));
        assert_eq!(term.history().len(), 2);
    }

    #[test]
    fn test_exploded_dice_are_rerolled() {
        let mut term = term("!r1", 1, d(6));
        term.resolve(&mut Scripted::new([5, 0, 3])).unwrap();

        assert_eq!(values(&term), vec![6, 4]);
        assert_eq!(term.history(), &[vec![5], vec![5, 0]]);
    }

    #[test]
    fn test_self_exploding_die_hits_limit() {
        let mut term = term("!", 1, d(1));
        let err = term.resolve(&mut Scripted::new(std::iter::repeat(0).take(ITERATION_LIMIT + 2))).unwrap_err();

        assert!(matches!(err, Error::IterationLimitExceeded { limit: ITERATION_LIMIT, .. }));
    }

    #[test]
    fn test_success_with_crit() {
        for (raw, expected) in [(19, 2), (14, 1), (9, 0)] {
            let mut term = term(">=15cs20", 1, d(20));
            term.resolve(&mut Scripted::new([raw])).unwrap();

            assert_eq!(term.counters().success, Some(expected), "raw = {raw}");
            assert_eq!(term.counters().failure, None);
        }
    }

    #[test]
    fn test_crit_without_base_match_counts_nothing() {
        let mut term = term(">=15cs1,2", 2, d(20));
        term.resolve(&mut Scripted::new([0, 16])).unwrap();

        assert_eq!(term.counters().success, Some(1));
    }

    #[test]
    fn test_categories_are_independent() {
        let mut term = term(">=4b=6~<=1", 3, d(6));
        term.resolve(&mut Scripted::new([5, 0, 3])).unwrap();

        assert_eq!(term.counters().success, Some(2));
        assert_eq!(term.counters().boon, Some(1));
        assert_eq!(term.counters().failure, Some(1));
        assert_eq!(term.counters().complication, None);
    }

    #[test]
    fn test_natural_rules_count_without_options() {
        let registry = fixture_registry();
        let skill = registry.lookup("skill").unwrap().as_ref().clone();
        let mut term = term("", 3, skill);
        term.resolve(&mut Scripted::new([5, 4, 1])).unwrap();

        assert_eq!(term.counters().success, Some(3));
        assert_eq!(term.counters().boon, Some(1));
    }

    #[test]
    fn test_label_sets_on_fudge_dice() {
        let registry = fixture_registry();
        let fudge = registry.lookup("F").unwrap().as_ref().clone();
        let mut term = term("==\"+\"~='-'", 4, fudge);
        term.resolve(&mut Scripted::new([0, 1, 2, 2])).unwrap();

        assert_eq!(term.sum(), Some(1));
        assert_eq!(term.counters().success, Some(2));
        assert_eq!(term.counters().failure, Some(1));
    }

    #[test]
    fn test_faces_without_value_are_recorded() {
        let registry = fixture_registry();
        let glyph = registry.lookup("glyph").unwrap().as_ref().clone();
        let mut term = term("", 2, glyph);
        term.resolve(&mut Scripted::new([0, 1])).unwrap();

        assert_eq!(term.sum(), None);
        assert_eq!(term.counters().complication, Some(1));
        assert!(matches!(term.error(), Some(Error::UnknownDiceValue { face, .. }) if face == "sun"));
    }

    #[test]
    fn test_keep_zero_is_empty() {
        let mut term = term("k0", 3, d(6));
        term.resolve(&mut Scripted::new([1, 2, 3])).unwrap();

        assert!(term.rolls().is_empty());
        assert_eq!(term.sum(), Some(0));
    }

    #[test]
    fn test_sum_saturates() {
        let big = DiceType::from_faces(["hi"]).unwrap().with_value("hi", i64::MAX);
        let mut term = term("", 2, big);
        term.resolve(&mut Scripted::new([0, 0])).unwrap();

        assert_eq!(term.sum(), Some(i64::MAX));
        assert!(term.error().is_none());
    }

    #[test]
    fn test_counters_merge() {
        let mut total = Counters::default();
        total.merge(&Counters { success: Some(2), ..Default::default() });
        total.merge(&Counters { success: Some(1), boon: Some(0), ..Default::default() });

        assert_eq!(total, Counters { success: Some(3), boon: Some(0), ..Default::default() });
    }
}
