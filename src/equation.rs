use std::fmt::Display;
use serde::Serialize;
use crate::{Category, Compare, Counters, DiceTerm, DieSource, Error};


/// Sign a term is added with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sign {
    /// `+`, also the sign of a leading unsigned term.
    Plus,
    /// `-`
    Minus,
}

impl Sign {
    /// Applies the sign to `value`, saturating on negation.
    pub fn apply(self, value: i64) -> i64 {
        match self {
            Sign::Plus => value,
            Sign::Minus => value.saturating_neg()
        }
    }
}

impl Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sign::Plus => write!(f, "+"),
            Sign::Minus => write!(f, "-")
        }
    }
}


/// One operand of an equation.
#[derive(Debug, Clone, Serialize)]
pub enum Term {
    /// A bare integer, or `0` for an empty term.
    Constant(i64),
    /// A `<count>d<type><options>` term.
    Dice(DiceTerm),
}

impl Term {
    /// Value of the term, `None` for dice showing a face without value.
    pub fn sum(&self) -> Option<i64> {
        match self {
            Term::Constant(value) => Some(*value),
            Term::Dice(dice) => dice.sum(),
        }
    }

    /// Counters of a dice term; constants have none.
    pub fn counters(&self) -> Option<&Counters> {
        match self {
            Term::Constant(_) => None,
            Term::Dice(dice) => Some(dice.counters()),
        }
    }

    /// The dice term, if this is one.
    pub fn dice(&self) -> Option<&DiceTerm> {
        match self {
            Term::Constant(_) => None,
            Term::Dice(dice) => Some(dice),
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Constant(value) => write!(f, "{value}"),
            Term::Dice(dice) => write!(f, "{dice}"),
        }
    }
}


/// Trailing `<cmp> <int>` clause of an equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Comparison {
    /// One of `<`, `<=`, `>`, `>=`.
    pub op: Compare,
    /// Integer the total is compared against.
    pub value: i64,
}

impl Comparison {
    /// Evaluates `total <op> value`.
    pub fn test(&self, total: i64) -> bool {
        self.op.test(total, self.value)
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.op, self.value)
    }
}


/// What a presentation layer should put first when showing an equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Headline {
    /// Outcome of the trailing comparison.
    Outcome(bool),
    /// At least one counter category is active and there is no comparison.
    Counters(Counters),
    /// Signed sum of the terms.
    Total(i64),
    /// No term produced a sum or a counter.
    Nothing,
}


/// A parsed command: signed terms plus an optional final comparison.
///
/// Created by [`crate::parse_equation`]; rolled by [`Equation::resolve`] or
/// directly through [`crate::evaluate`].
#[derive(Debug, Clone, Serialize)]
pub struct Equation {
    source: String,
    terms: Vec<(Sign, Term)>,
    comparison: Option<Comparison>,
}

impl Equation {
    pub(crate) fn new(source: &str, terms: Vec<(Sign, Term)>, comparison: Option<Comparison>) -> Self {
        Self { source: source.into(), terms, comparison }
    }

    /// Rolls every dice term, left to right.
    ///
    /// # Errors
    /// Returns [`Error::IterationLimitExceeded`] from the first term whose
    /// explosions do not settle; the remaining terms are left unrolled.
    pub fn resolve<S: DieSource + ?Sized>(&mut self, rng: &mut S) -> Result<(), Error> {
        for (_, term) in &mut self.terms {
            if let Term::Dice(dice) = term {
                dice.resolve(rng)?;
            }
        }

        Ok(())
    }

    /// The command as given, trimmed.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Signed terms in source order.
    pub fn terms(&self) -> &[(Sign, Term)] {
        &self.terms
    }

    /// Signed sum of every term that has one.
    pub fn total(&self) -> i64 {
        self.terms
            .iter()
            .filter_map(|(sign, term)| term.sum().map(|sum| sign.apply(sum)))
            .fold(0i64, i64::saturating_add)
    }

    /// True if at least one term produced a sum.
    pub fn has_total(&self) -> bool {
        self.terms.iter().any(|(_, term)| term.sum().is_some())
    }

    /// Counters summed over the terms that activated them.
    pub fn counters(&self) -> Counters {
        let mut counters = Counters::default();
        for counts in self.terms.iter().filter_map(|(_, term)| term.counters()) {
            counters.merge(counts);
        }

        counters
    }

    /// Aggregate count of `category`, `None` if no term activated it.
    pub fn counter(&self, category: Category) -> Option<i64> {
        self.counters().get(category)
    }

    /// Shorthand for [`Equation::counter`] with [`Category::Success`].
    pub fn successes(&self) -> Option<i64> {
        self.counter(Category::Success)
    }

    /// Shorthand for [`Equation::counter`] with [`Category::Failure`].
    pub fn failures(&self) -> Option<i64> {
        self.counter(Category::Failure)
    }

    /// Shorthand for [`Equation::counter`] with [`Category::Boon`].
    pub fn boons(&self) -> Option<i64> {
        self.counter(Category::Boon)
    }

    /// Shorthand for [`Equation::counter`] with [`Category::Complication`].
    pub fn complications(&self) -> Option<i64> {
        self.counter(Category::Complication)
    }

    /// Trailing comparison, if any.
    pub fn comparison(&self) -> Option<&Comparison> {
        self.comparison.as_ref()
    }

    /// Result of the final comparison against [`Equation::total`], if one was given.
    pub fn outcome(&self) -> Option<bool> {
        self.comparison.map(|comparison| comparison.test(self.total()))
    }

    /// What to show first: the outcome, else active counters, else the total.
    pub fn headline(&self) -> Headline {
        let counters = self.counters();

        match self.outcome() {
            Some(outcome) => Headline::Outcome(outcome),
            None if !counters.is_empty() => Headline::Counters(counters),
            None if self.has_total() => Headline::Total(self.total()),
            None => Headline::Nothing
        }
    }

    /// Resolution problems recorded by individual terms.
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.terms
            .iter()
            .filter_map(|(_, term)| term.dice().and_then(DiceTerm::error))
    }
}

impl Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (sign, term)) in self.terms.iter().enumerate() {
            match (i, sign) {
                (0, Sign::Plus) => write!(f, "{term}")?,
                (0, Sign::Minus) => write!(f, "-{term}")?,
                _ => write!(f, " {sign} {term}")?
            }
        }

        if let Some(comparison) = &self.comparison {
            write!(f, " {comparison}")?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use super::*;
    use crate::parse_equation;
    use crate::roll_test_strategies::{Scripted, fixture_registry};


    fn rolled(input: &str, draws: &[u32]) -> Equation {
        let mut equation = parse_equation(input, &fixture_registry()).unwrap();
        equation.resolve(&mut Scripted::new(draws.iter().copied())).unwrap();
        equation
    }

    proptest! {
        #[test]
        fn test_sign_apply(value in -1000i64..1000) {
            prop_assert_eq!(Sign::Plus.apply(value), value);
            prop_assert_eq!(Sign::Minus.apply(value), -value);
        }

        #[test]
        fn test_constant_totals(values in prop::collection::vec((any::<bool>(), 0i64..1000), 1..8)) {
            let terms = values.iter()
                .map(|&(minus, value)| (if minus { Sign::Minus } else { Sign::Plus }, Term::Constant(value)))
                .collect();
            let equation = Equation::new("", terms, None);
            let expected: i64 = values.iter().map(|&(minus, value)| if minus { -value } else { value }).sum();

            prop_assert_eq!(equation.total(), expected);
            prop_assert!(equation.has_total());
            prop_assert_eq!(equation.headline(), Headline::Total(expected));
        }
    }

    #[test]
    fn test_comparison_fails() {
        let equation = rolled("2d20 - 3 < 10", &[11, 12]);

        assert_eq!(equation.total(), 22);
        assert_eq!(equation.outcome(), Some(false));
        assert_eq!(equation.headline(), Headline::Outcome(false));
    }

    #[test]
    fn test_comparison_passes() {
        let equation = rolled("1d6 + 1 >= 4", &[2]);

        assert_eq!(equation.total(), 4);
        assert_eq!(equation.outcome(), Some(true));
    }

    #[test]
    fn test_counters_absent_unless_activated() {
        let equation = rolled("2d6 + 3", &[0, 5]);

        assert_eq!(equation.total(), 10);
        assert_eq!(equation.successes(), None);
        assert_eq!(equation.failures(), None);
        assert!(equation.counters().is_empty());
        assert_eq!(equation.headline(), Headline::Total(10));
    }

    #[test]
    fn test_counters_add_across_terms() {
        let equation = rolled("2d6>=5 + 1d20>=15 + 1d6", &[4, 0, 19, 2]);

        assert_eq!(equation.successes(), Some(2));
        assert_eq!(equation.total(), 5 + 1 + 20 + 3);
        assert!(matches!(equation.headline(), Headline::Counters(c) if c.success == Some(2)));
    }

    #[test]
    fn test_term_without_sum_is_skipped() {
        let equation = rolled("1dglyph + 2", &[1]);

        assert_eq!(equation.total(), 2);
        assert!(equation.has_total());
        assert_eq!(equation.complications(), Some(1));
        assert_eq!(equation.errors().count(), 1);
    }

    #[test]
    fn test_nothing_to_show() {
        let equation = rolled("1dglyph", &[0]);

        assert!(!equation.has_total());
        assert_eq!(equation.total(), 0);
        assert_eq!(equation.headline(), Headline::Counters(Counters { complication: Some(0), ..Default::default() }));
    }

    #[test]
    fn test_display() {
        let equation = parse_equation("-2 + 2d20kl1 - 1d6!r1 < 10", &fixture_registry()).unwrap();
        assert_eq!(equation.to_string(), "-2 + 2d20kl1 - 1d6!\"6\"r1 < 10");
    }
}
