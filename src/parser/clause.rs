use std::{fmt::Display, str::FromStr};
use serde::Serialize;
use crate::{DiceType, Face, Keep};
use crate::parser::error::*;
use crate::parser::{Lexer, Token};


/// Relational operator used by thresholds, crit clauses and the final comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compare {
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `==`, or `=` in registry rules. Thresholds built with it are sets.
    Equal,
}

impl Compare {
    /// Evaluates `left <op> right`.
    pub fn test(self, left: i64, right: i64) -> bool {
        match self {
            Compare::Less => left < right,
            Compare::LessEqual => left <= right,
            Compare::Greater => left > right,
            Compare::GreaterEqual => left >= right,
            Compare::Equal => left == right,
        }
    }

    /// Notation of the operator, `==` for equality.
    pub fn symbol(self) -> &'static str {
        match self {
            Compare::Less => "<",
            Compare::LessEqual => "<=",
            Compare::Greater => ">",
            Compare::GreaterEqual => ">=",
            Compare::Equal => "==",
        }
    }
}

impl FromStr for Compare {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "<" => Ok(Compare::Less),
            "<=" => Ok(Compare::LessEqual),
            ">" => Ok(Compare::Greater),
            ">=" => Ok(Compare::GreaterEqual),
            "=" | "==" => Ok(Compare::Equal),
            other => Err(ParserError::UnknownOperation(other.into()))
        }
    }
}

impl Display for Compare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}


/// One element of an operand: an integer or a quoted face label.
///
/// An integer matches a die by numeric value, a label matches it by face label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Atom {
    /// Bare integer, e.g. the `1` of `r1`.
    Value(i64),
    /// Quoted face label, e.g. the `"+"` of `r"+"`.
    Label(String),
}

impl Atom {
    /// True if `face` shows this value or label.
    pub fn matches(&self, face: &Face) -> bool {
        match self {
            Atom::Value(value) => face.value == Some(*value),
            Atom::Label(label) => face.label == *label,
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Atom::Value(value) => write!(f, "{value}"),
            Atom::Label(label) => write!(f, "\"{label}\""),
        }
    }
}

fn write_atoms(f: &mut std::fmt::Formatter<'_>, atoms: &[Atom]) -> std::fmt::Result {
    for (i, atom) in atoms.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{atom}")?;
    }

    Ok(())
}


/// The counting categories a term can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Set by `<`, `<=`, `>`, `>=`, `==`.
    Success,
    /// Set by the `~` family.
    Failure,
    /// Set by the `b` family.
    Boon,
    /// Set by the `x` family.
    Complication,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Category; 4] = [
        Category::Success,
        Category::Failure,
        Category::Boon,
        Category::Complication,
    ];

    /// Lowercase name, as used in registry documents and output.
    pub fn name(self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Failure => "failure",
            Category::Boon => "boon",
            Category::Complication => "complication",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}


/// Condition a die must satisfy to count towards a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Threshold {
    /// Numeric comparison of the die's value against `value`.
    Scalar {
        /// Never [`Compare::Equal`].
        op: Compare,
        /// Right-hand side of the comparison.
        value: i64
    },
    /// Membership of the die in a set of values or labels.
    Set(Vec<Atom>),
}

impl Threshold {
    /// Builds a threshold from an operator and its operand.
    ///
    /// Equality always produces a set. Other operators need a single operand;
    /// a label operand is converted to its numeric value through `dice`.
    ///
    /// # Errors
    /// - [`ParserError::Malformed`] if a relational operator gets more than one value.
    /// - [`ParserError::UnknownDiceValue`] if a label operand has no numeric value.
    pub fn new(op: Compare, operand: Vec<Atom>, dice: &DiceType) -> Result<Self> {
        if op == Compare::Equal {
            return Ok(Threshold::Set(operand));
        }

        let value = scalar(operand, op.symbol(), dice)?;
        Ok(Threshold::Scalar { op, value })
    }

    /// Operator this threshold compares with; sets compare by equality.
    pub fn op(&self) -> Compare {
        match self {
            Threshold::Scalar { op, .. } => *op,
            Threshold::Set(_) => Compare::Equal,
        }
    }

    /// Returns `None` when a scalar comparison meets a face without a numeric value.
    pub fn matches(&self, face: &Face) -> Option<bool> {
        match self {
            Threshold::Scalar { op, value } => face.value.map(|v| op.test(v, *value)),
            Threshold::Set(atoms) => Some(atoms.iter().any(|atom| atom.matches(face))),
        }
    }
}

impl Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Threshold::Scalar { op, value } => write!(f, "{op}{value}"),
            Threshold::Set(atoms) => {
                write!(f, "==")?;
                write_atoms(f, atoms)
            }
        }
    }
}


/// Secondary condition that doubles a matching die's contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Crit {
    /// Compared with the operator of the category's threshold.
    Scalar(i64),
    /// Matched by membership.
    Set(Vec<Atom>),
}

impl Crit {
    /// True if `face` is a crit for a category judged by `threshold`.
    pub fn matches(&self, face: &Face, threshold: &Threshold) -> bool {
        match self {
            Crit::Scalar(value) => face.value
                .map(|v| threshold.op().test(v, *value))
                .unwrap_or(false),
            Crit::Set(atoms) => atoms.iter().any(|atom| atom.matches(face)),
        }
    }
}

impl From<Vec<Atom>> for Crit {
    fn from(operand: Vec<Atom>) -> Self {
        match operand.as_slice() {
            [Atom::Value(value)] => Crit::Scalar(*value),
            _ => Crit::Set(operand)
        }
    }
}

impl Display for Crit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crit::Scalar(value) => write!(f, "{value}"),
            Crit::Set(atoms) => write_atoms(f, atoms),
        }
    }
}


/// Where a clause came from. Inline clauses replace natural ones and are never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum Clause<T> {
    /// Neither the dice type nor the options activate it.
    #[default]
    Unset,
    /// Taken from the dice type's registry rules.
    Natural(T),
    /// Written in the term's options.
    Inline(T),
}

impl<T> Clause<T> {
    /// The active value, whatever its origin.
    pub fn get(&self) -> Option<&T> {
        match self {
            Clause::Unset => None,
            Clause::Natural(value) | Clause::Inline(value) => Some(value),
        }
    }

    /// True once the options set this clause.
    pub fn is_inline(&self) -> bool {
        matches!(self, Clause::Inline(_))
    }

    fn natural(value: Option<T>) -> Self {
        value.map(Clause::Natural).unwrap_or(Clause::Unset)
    }

    /// Overlays an inline value built by `build`, unless one was already set inline.
    fn overlay(&mut self, build: impl FnOnce() -> Result<T>) -> Result<()> {
        if !self.is_inline() {
            *self = Clause::Inline(build()?);
        }

        Ok(())
    }
}


/// Threshold and crit clause of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryClause {
    /// Activates the category's counter when set.
    pub threshold: Clause<Threshold>,
    /// Only consulted for dice that meet `threshold`.
    pub crit: Clause<Crit>,
}

impl CategoryClause {
    /// True if the category has a threshold, natural or inline.
    pub fn is_active(&self) -> bool {
        self.threshold.get().is_some()
    }

    /// Contribution of one die: 0 on no match, 1 on a match, 2 when the crit clause also matches.
    ///
    /// Returns `None` if the threshold needs a numeric value the face does not have.
    pub fn score(&self, face: &Face) -> Option<i64> {
        let Some(threshold) = self.threshold.get() else {
            return Some(0);
        };

        if !threshold.matches(face)? {
            return Some(0);
        }

        match self.crit.get() {
            Some(crit) if crit.matches(face, threshold) => Some(2),
            _ => Some(1)
        }
    }
}


/// Everything the option suffix of one term asks for.
///
/// Built in two stages: [`ClauseSet::natural`] seeds the categories from the
/// dice type's registry rules, then each inline option is overlaid on top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClauseSet {
    /// Faces rerolled once, from `r`.
    pub reroll: Vec<Atom>,
    /// Faces that add a die, from `!`.
    pub explode: Vec<Atom>,
    /// First `k`/`kl` of the options.
    pub keep: Option<Keep>,
    /// Clause of [`Category::Success`].
    pub success: CategoryClause,
    /// Clause of [`Category::Failure`].
    pub failure: CategoryClause,
    /// Clause of [`Category::Boon`].
    pub boon: CategoryClause,
    /// Clause of [`Category::Complication`].
    pub complication: CategoryClause,
}

impl ClauseSet {
    /// Clause set holding only the natural rules of `dice`.
    pub fn natural(dice: &DiceType) -> Self {
        let mut clauses = Self::default();

        for category in Category::ALL {
            let clause = clauses.category_mut(category);
            clause.threshold = Clause::natural(dice.natural(category).cloned());
            clause.crit = Clause::natural(dice.natural_crit(category).cloned());
        }

        clauses
    }

    /// Decodes an option suffix such as `!r1k3>=5cs6` on top of the natural rules of `dice`.
    ///
    /// # Errors
    /// - [`ParserError::MissingOperand`] if a token requiring an operand has none.
    /// - [`ParserError::Malformed`] for text no token matches or a badly shaped operand.
    /// - [`ParserError::UnknownDiceValue`] if a label used as a number has no value.
    ///
    /// # Examples
    /// ```
    /// use faceroll::{Atom, ClauseSet, DiceType, Keep};
    /// use std::num::NonZeroU32;
    ///
    /// let d6 = DiceType::uniform(NonZeroU32::new(6).unwrap());
    /// let clauses = ClauseSet::decode("!r1k3", &d6).unwrap();
    ///
    /// assert_eq!(clauses.explode, vec![Atom::Label("6".into())]);
    /// assert_eq!(clauses.reroll, vec![Atom::Value(1)]);
    /// assert_eq!(clauses.keep, Some(Keep::Highest(3)));
    /// ```
    pub fn decode(options: &str, dice: &DiceType) -> Result<Self> {
        let mut clauses = Self::natural(dice);
        let mut lexer = Lexer::new(options);

        loop {
            let token = lexer.next_token()?;
            if token == Token::Eof {
                break;
            }

            let operand = lexer.operand()?;
            clauses.apply(token, operand, dice)?;
        }

        Ok(clauses)
    }

    /// Clause of `category`.
    pub fn category(&self, category: Category) -> &CategoryClause {
        match category {
            Category::Success => &self.success,
            Category::Failure => &self.failure,
            Category::Boon => &self.boon,
            Category::Complication => &self.complication,
        }
    }

    fn category_mut(&mut self, category: Category) -> &mut CategoryClause {
        match category {
            Category::Success => &mut self.success,
            Category::Failure => &mut self.failure,
            Category::Boon => &mut self.boon,
            Category::Complication => &mut self.complication,
        }
    }

    fn apply(&mut self, token: Token, operand: Option<Vec<Atom>>, dice: &DiceType) -> Result<()> {
        let missing = || ParserError::MissingOperand(token.symbol().into());

        match token {
            Token::Explode => {
                let operand = operand.unwrap_or_else(|| vec![dice.max_face()]);
                extend_unique(&mut self.explode, operand);
            },

            Token::Reroll => {
                let operand = operand.ok_or_else(missing)?;
                extend_unique(&mut self.reroll, operand);
            },

            Token::KeepHighest | Token::KeepLowest => {
                let n = keep_count(operand.ok_or_else(missing)?, token)?;

                if self.keep.is_none() {
                    self.keep = Some(match token {
                        Token::KeepHighest => Keep::Highest(n),
                        _ => Keep::Lowest(n)
                    });
                }
            },

            Token::Threshold(category, op) => {
                let operand = operand.ok_or_else(missing)?;
                self.category_mut(category)
                    .threshold
                    .overlay(|| Threshold::new(op, operand, dice))?;
            },

            Token::Natural(category) => {
                let op = dice.natural(category)
                    .map(Threshold::op)
                    .ok_or_else(missing)?;
                let operand = operand.ok_or_else(missing)?;

                self.category_mut(category)
                    .threshold
                    .overlay(|| Threshold::new(op, operand, dice))?;
            },

            Token::Crit(category) => {
                let operand = match operand {
                    Some(operand) => operand,
                    None if category == Category::Success => vec![dice.max_face()],
                    None => return Err(missing())
                };

                self.category_mut(category)
                    .crit
                    .overlay(|| Ok(Crit::from(operand)))?;
            },

            Token::Eof => {}
        }

        Ok(())
    }
}

impl Display for ClauseSet {
    /// Writes the inline-equivalent notation of the clause set, natural rules included.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.explode.is_empty() {
            write!(f, "!")?;
            write_atoms(f, &self.explode)?;
        }

        if !self.reroll.is_empty() {
            write!(f, "r")?;
            write_atoms(f, &self.reroll)?;
        }

        if let Some(keep) = self.keep {
            write!(f, "{keep}")?;
        }

        for category in Category::ALL {
            let clause = self.category(category);

            if let Some(threshold) = clause.threshold.get() {
                write!(f, "{}", Token::Threshold(category, threshold.op()).symbol())?;
                match threshold {
                    Threshold::Scalar { value, .. } => write!(f, "{value}")?,
                    Threshold::Set(atoms) => write_atoms(f, atoms)?,
                }
            }

            if let Some(crit) = clause.crit.get() {
                write!(f, "{}{crit}", Token::Crit(category).symbol())?;
            }
        }

        Ok(())
    }
}


fn extend_unique(set: &mut Vec<Atom>, atoms: Vec<Atom>) {
    for atom in atoms {
        if !set.contains(&atom) {
            set.push(atom);
        }
    }
}

fn scalar(operand: Vec<Atom>, symbol: &str, dice: &DiceType) -> Result<i64> {
    match operand.as_slice() {
        [Atom::Value(value)] => Ok(*value),
        [Atom::Label(label)] => dice.value_of(label)
            .ok_or_else(|| ParserError::UnknownDiceValue(label.clone())),
        _ => Err(ParserError::Malformed(format!("`{symbol}` takes a single value")))
    }
}

fn keep_count(operand: Vec<Atom>, token: Token) -> Result<u32> {
    match operand.as_slice() {
        [Atom::Value(n)] => u32::try_from(*n)
            .map_err(|_| ParserError::Malformed(format!("`{}` needs a non-negative count", token.symbol()))),
        _ => Err(ParserError::Malformed(format!("`{}` takes a single count", token.symbol())))
    }
}
