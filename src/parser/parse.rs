use std::{num::NonZeroU32, sync::Arc};
use crate::{Comparison, DiceTerm, DiceType, DieSource, Equation, Error, Registry, Sign, Term, MAX_DICE};
use crate::parser::error::*;
use crate::parser::{ClauseSet, Compare};


/// Comparison operators accepted at the end of an expression, longest first.
const FINAL_COMPARISONS: [&str; 4] = ["<=", ">=", "<", ">"];


/// Splits off a trailing `<cmp> <int>` clause.
///
/// The operator has to be separated from the last term by whitespace, so
/// `1d20>=15` stays an inline threshold while `1d20 >= 15` compares the total.
fn split_comparison(input: &str) -> Result<(&str, Option<Comparison>)> {
    let trimmed = input.trim_end();
    let digits_start = trimmed.trim_end_matches(|c: char| c.is_ascii_digit()).len();

    if digits_start == trimmed.len() {
        return Ok((trimmed, None));
    }

    let (mut head, mut number) = trimmed.split_at(digits_start);
    if let Some(stripped) = head.strip_suffix('-') {
        head = stripped;
        number = &trimmed[digits_start - 1..];
    }

    let head = head.trim_end();
    for symbol in FINAL_COMPARISONS {
        let Some(rest) = head.strip_suffix(symbol) else {
            continue;
        };

        if !rest.is_empty() && !rest.ends_with(char::is_whitespace) {
            return Ok((trimmed, None));
        }

        let comparison = Comparison { op: symbol.parse::<Compare>()?, value: number.parse()? };
        return Ok((rest.trim_end(), Some(comparison)));
    }

    Ok((trimmed, None))
}


/// Splits an expression body on top-level `+` and `-`.
///
/// Signs inside quoted labels, and a `-` right after `<`, `>`, `=` or `,`
/// (a negative operand), do not split.
fn split_terms(body: &str) -> Result<Vec<(Sign, String)>> {
    let mut terms = Vec::new();
    let mut sign = Sign::Plus;
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut previous: Option<char> = None;

    for ch in body.chars() {
        match (quote, ch) {
            (Some(open), _) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                }
            },
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            },
            (None, '-') if matches!(previous, Some('<' | '>' | '=' | ',')) => current.push(ch),
            (None, '+' | '-') => {
                let text = current.trim();
                if !(terms.is_empty() && text.is_empty()) {
                    terms.push((sign, text.to_string()));
                }

                current.clear();
                sign = if ch == '+' { Sign::Plus } else { Sign::Minus };
            },
            (None, _) => current.push(ch),
        }

        if !ch.is_whitespace() {
            previous = Some(ch);
        }
    }

    if quote.is_some() {
        return Err(ParserError::UnterminatedLabel.in_term(current.trim()));
    }

    terms.push((sign, current.trim().to_string()));
    Ok(terms)
}


/// Parses one term: empty, a non-negative integer, or `<count>d<type><options>`.
fn parse_term(text: &str, registry: &Registry) -> Result<Term> {
    if text.is_empty() {
        return Ok(Term::Constant(0));
    }

    if text.chars().all(|c| c.is_ascii_digit()) {
        return Ok(Term::Constant(text.parse()?));
    }

    let count_end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let (count_text, rest) = text.split_at(count_end);

    let rest = rest.strip_prefix(|c: char| c.eq_ignore_ascii_case(&'d'))
        .ok_or_else(|| ParserError::Malformed(format!("expected `<count>d<type>`, got `{text}`")))?;

    let count: u32 = if count_text.is_empty() { 1 } else { count_text.parse()? };
    if count == 0 {
        return Err(ParserError::Malformed("dice count must be at least 1".into()));
    }
    if count > MAX_DICE {
        return Err(ParserError::Malformed(format!("dice count must be at most {MAX_DICE}")));
    }

    let (code, dice, options) = parse_dice_type(rest, registry)?;
    let clauses = ClauseSet::decode(options, &dice)?;

    Ok(Term::Dice(DiceTerm::new(text, code, count, dice, clauses)))
}

/// Resolves the dice type at the start of `text`, returning it with the residual options.
///
/// A registry code wins over a plain number of sides unless the leading digits run further.
fn parse_dice_type<'a>(text: &'a str, registry: &Registry) -> Result<(&'a str, Arc<DiceType>, &'a str)> {
    let digits_end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());

    if let Some((code, dice)) = registry.longest_prefix(text) {
        if code.len() >= digits_end {
            let (code, options) = text.split_at(code.len());
            return Ok((code, dice.clone(), options));
        }
    }

    if digits_end > 0 {
        let (digits, options) = text.split_at(digits_end);
        if let Some(dice) = registry.lookup(digits) {
            return Ok((digits, dice.clone(), options));
        }

        let sides = digits.parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| ParserError::UnknownDiceType(digits.into()))?;

        return Ok((digits, Arc::new(DiceType::uniform(sides)), options));
    }

    let name_end = text.find(|c: char| !c.is_alphanumeric()).unwrap_or(text.len());
    match &text[..name_end] {
        "" => Err(ParserError::Malformed("missing dice type".into())),
        name => Err(ParserError::UnknownDiceType(name.into()))
    }
}


/// Parses a dice command into an unrolled [`Equation`].
///
/// # Errors
/// - [`ParserError::Malformed`] if the input has no terms.
/// - Any other [`ParserError`], wrapped in [`ParserError::InTerm`] with the
///   source text of the offending term.
///
/// # Examples
/// ```
/// use faceroll::{parse_equation, ParserError, Registry};
///
/// let registry = Registry::new();
/// let equation = parse_equation("2d20kl1 + 2d6!r1 - 3 < 10", &registry).unwrap();
/// assert_eq!(equation.terms().len(), 3);
///
/// let err = parse_equation("3dZZ", &registry).unwrap_err();
/// assert_eq!(err.term(), Some("3dZZ"));
/// assert_eq!(err.err(), &ParserError::UnknownDiceType("ZZ".into()));
/// ```
pub fn parse_equation(input: &str, registry: &Registry) -> Result<Equation> {
    let input = input.trim();
    let (body, comparison) = split_comparison(input)?;
    if body.is_empty() {
        return Err(ParserError::Malformed("expression has no terms".into()));
    }

    let terms = split_terms(body)?
        .into_iter()
        .map(|(sign, text)| {
            parse_term(&text, registry)
                .map(|term| (sign, term))
                .map_err(|err| err.in_term(&text))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Equation::new(input, terms, comparison))
}


/// Parses and rolls a dice command with the thread-local random generator.
///
/// # Errors
/// - [`Error::ParserError`] if the command does not parse.
/// - [`Error::IterationLimitExceeded`] if a term's explosions do not settle.
///
/// # Examples
/// ```
/// use faceroll::{evaluate, Registry};
///
/// let equation = evaluate("2d6 + 3", &Registry::new()).unwrap();
/// assert!((5..=15).contains(&equation.total()));
/// assert_eq!(equation.successes(), None);
/// ```
pub fn evaluate(input: &str, registry: &Registry) -> std::result::Result<Equation, Error> {
    evaluate_with(input, registry, &mut rand::rng())
}


/// Parses and rolls a dice command, drawing from `rng`.
///
/// # Errors
/// Same as [`evaluate`].
pub fn evaluate_with<S: DieSource + ?Sized>(
    input: &str,
    registry: &Registry,
    rng: &mut S
) -> std::result::Result<Equation, Error> {
    let mut equation = parse_equation(input, registry)?;
    equation.resolve(rng)?;
    Ok(equation)
}
