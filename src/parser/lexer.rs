use crate::parser::error::*;
use crate::parser::{Atom, Category, Compare};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    Explode,
    Reroll,
    KeepHighest,
    KeepLowest,
    Threshold(Category, Compare),
    Natural(Category),
    Crit(Category),
    Eof,
}

/// Option tokens in match order. A token must come before every shorter token it starts with.
const TOKENS: &[(&str, Token)] = &[
    ("~<=", Token::Threshold(Category::Failure, Compare::LessEqual)),
    ("~>=", Token::Threshold(Category::Failure, Compare::GreaterEqual)),
    ("~<", Token::Threshold(Category::Failure, Compare::Less)),
    ("~>", Token::Threshold(Category::Failure, Compare::Greater)),
    ("~=", Token::Threshold(Category::Failure, Compare::Equal)),
    ("b<=", Token::Threshold(Category::Boon, Compare::LessEqual)),
    ("b>=", Token::Threshold(Category::Boon, Compare::GreaterEqual)),
    ("b<", Token::Threshold(Category::Boon, Compare::Less)),
    ("b>", Token::Threshold(Category::Boon, Compare::Greater)),
    ("b=", Token::Threshold(Category::Boon, Compare::Equal)),
    ("x<=", Token::Threshold(Category::Complication, Compare::LessEqual)),
    ("x>=", Token::Threshold(Category::Complication, Compare::GreaterEqual)),
    ("x<", Token::Threshold(Category::Complication, Compare::Less)),
    ("x>", Token::Threshold(Category::Complication, Compare::Greater)),
    ("x=", Token::Threshold(Category::Complication, Compare::Equal)),
    ("<=", Token::Threshold(Category::Success, Compare::LessEqual)),
    (">=", Token::Threshold(Category::Success, Compare::GreaterEqual)),
    ("<", Token::Threshold(Category::Success, Compare::Less)),
    (">", Token::Threshold(Category::Success, Compare::Greater)),
    ("==", Token::Threshold(Category::Success, Compare::Equal)),
    ("cs", Token::Crit(Category::Success)),
    ("cf", Token::Crit(Category::Failure)),
    ("cb", Token::Crit(Category::Boon)),
    ("cx", Token::Crit(Category::Complication)),
    ("kl", Token::KeepLowest),
    ("k", Token::KeepHighest),
    ("b", Token::Natural(Category::Boon)),
    ("x", Token::Natural(Category::Complication)),
    ("!", Token::Explode),
    ("r", Token::Reroll),
];

impl Token {
    /// Notation of the token, as written in an option suffix.
    pub fn symbol(self) -> &'static str {
        TOKENS.iter()
            .find(|(_, token)| *token == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or("")
    }
}


/// Scanner over the option suffix of a single term.
#[derive(Debug)]
pub(crate) struct Lexer {
    input: Vec<char>,
    pub position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        if self.position >= self.input.len() {
            return Ok(Token::Eof);
        }

        for (symbol, token) in TOKENS {
            if self.starts_with(symbol) {
                self.position += symbol.chars().count();
                return Ok(*token);
            }
        }

        Err(ParserError::Malformed(format!("unrecognized option `{}`", self.remaining())))
    }

    /// Reads an optional operand: one atom or a comma-separated list of atoms.
    pub fn operand(&mut self) -> Result<Option<Vec<Atom>>> {
        let Some(first) = self.read_atom()? else {
            return Ok(None);
        };

        let mut atoms = vec![first];
        loop {
            self.skip_whitespace();
            if self.peek() != Some(',') {
                break;
            }

            self.position += 1;
            match self.read_atom()? {
                Some(atom) => atoms.push(atom),
                None => return Err(ParserError::Malformed("dangling `,` in operand list".into()))
            }
        }

        Ok(Some(atoms))
    }

    pub fn remaining(&self) -> String {
        self.input[self.position.min(self.input.len())..].iter().collect()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn starts_with(&self, symbol: &str) -> bool {
        let mut position = self.position;

        for expected in symbol.chars() {
            match self.input.get(position) {
                Some(ch) if ch.eq_ignore_ascii_case(&expected) => position += 1,
                _ => return false
            }
        }

        true
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.input[self.position].is_whitespace() {
            self.position += 1;
        }
    }

    fn read_atom(&mut self) -> Result<Option<Atom>> {
        self.skip_whitespace();

        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.position += 1;
                Ok(Some(Atom::Label(self.read_label(quote)?)))
            },
            Some('0'..='9') => Ok(Some(Atom::Value(self.read_number()?))),
            Some('-') if matches!(self.input.get(self.position + 1), Some('0'..='9')) => {
                Ok(Some(Atom::Value(self.read_number()?)))
            },
            _ => Ok(None)
        }
    }

    fn read_number(&mut self) -> Result<i64> {
        let start = self.position;
        if self.peek() == Some('-') {
            self.position += 1;
        }

        while self.position < self.input.len() && self.input[self.position].is_ascii_digit() {
            self.position += 1;
        }

        let number_str: String = self.input[start..self.position].iter().collect();
        Ok(number_str.parse()?)
    }

    fn read_label(&mut self, quote: char) -> Result<String> {
        let start = self.position;
        while self.position < self.input.len() && self.input[self.position] != quote {
            self.position += 1;
        }

        if self.position >= self.input.len() {
            return Err(ParserError::UnterminatedLabel);
        }

        let label = self.input[start..self.position].iter().collect();
        self.position += 1;
        Ok(label)
    }
}
