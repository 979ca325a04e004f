use std::{collections::HashMap, num::NonZeroU32, path::Path, sync::Arc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::{Atom, Category, Crit, ParserError, RegistryError, Threshold};


/// One rolled side of a die, resolved through its [`DiceType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Face {
    /// Zero-based raw roll, in `[0, sides)`.
    pub index: u32,
    /// Label shown on the face, `1..=sides` for numbered dice.
    pub label: String,
    /// `None` if the label is neither mapped to a value nor an integer.
    pub value: Option<i64>,
}


/// Description of a kind of die: its faces, their values and its natural rules.
///
/// A die either has `sides` numbered faces `1..=sides` or an explicit list of
/// face labels. Labels that are not integers need an entry in the value map
/// to take part in sums and numeric comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct DiceType {
    name: Option<String>,
    sides: u32,
    labels: Option<Vec<String>>,
    values: HashMap<String, i64>,
    face_names: HashMap<String, String>,
    natural: [Option<Threshold>; 4],
    natural_crit: [Option<Crit>; 4],
}

impl DiceType {
    /// A die numbered `1..=sides`.
    pub fn uniform(sides: NonZeroU32) -> Self {
        Self {
            name: None,
            sides: sides.get(),
            labels: None,
            values: HashMap::new(),
            face_names: HashMap::new(),
            natural: Default::default(),
            natural_crit: Default::default(),
        }
    }

    /// A die with explicit face labels, in raw roll order. Returns `None` for an empty list.
    pub fn from_faces<I, S>(labels: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let sides = NonZeroU32::new(u32::try_from(labels.len()).ok()?)?;

        Some(Self {
            labels: Some(labels),
            ..Self::uniform(sides)
        })
    }

    /// Sets the display name of the dice type.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Maps a non-numeric face label to its value.
    pub fn with_value(mut self, label: impl Into<String>, value: i64) -> Self {
        self.values.insert(label.into(), value);
        self
    }

    /// Sets the display name of a face.
    pub fn with_face_name(mut self, label: impl Into<String>, name: impl Into<String>) -> Self {
        self.face_names.insert(label.into(), name.into());
        self
    }

    /// Adds a natural threshold for `category`, active without any inline option.
    ///
    /// # Errors
    /// - [`ParserError::UnknownOperation`] if `op` is not a comparison operator.
    /// - Any error of [`Threshold::new`].
    pub fn with_natural(mut self, category: Category, op: &str, operand: Vec<Atom>) -> Result<Self, ParserError> {
        let threshold = Threshold::new(op.parse()?, operand, &self)?;
        self.natural[category.index()] = Some(threshold);
        Ok(self)
    }

    /// Adds a natural crit clause for `category`.
    pub fn with_natural_crit(mut self, category: Category, operand: Vec<Atom>) -> Self {
        self.natural_crit[category.index()] = Some(Crit::from(operand));
        self
    }

    /// Display name from the registry.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of faces, at least 1.
    pub fn sides(&self) -> u32 {
        self.sides
    }

    /// Label of the face at raw roll `index`.
    pub fn label(&self, index: u32) -> String {
        match &self.labels {
            Some(labels) => labels.get(index as usize).cloned().unwrap_or_default(),
            None => (u64::from(index) + 1).to_string(),
        }
    }

    /// Numeric value of a face label: the mapped value, else the label read as an integer.
    pub fn value_of(&self, label: &str) -> Option<i64> {
        self.values.get(label)
            .copied()
            .or_else(|| label.trim().parse().ok())
    }

    /// Resolves raw roll `index` to a face.
    pub fn face(&self, index: u32) -> Face {
        let label = self.label(index);
        let value = self.value_of(&label);
        Face { index, label, value }
    }

    /// Display name of a face, if the registry gives one.
    pub fn face_name(&self, label: &str) -> Option<&str> {
        self.face_names.get(label).map(String::as_str)
    }

    /// The face with the highest raw index, as a label atom.
    pub fn max_face(&self) -> Atom {
        Atom::Label(self.label(self.sides - 1))
    }

    /// Natural threshold of `category`.
    pub fn natural(&self, category: Category) -> Option<&Threshold> {
        self.natural[category.index()].as_ref()
    }

    /// Natural crit of `category`.
    pub fn natural_crit(&self, category: Category) -> Option<&Crit> {
        self.natural_crit[category.index()].as_ref()
    }
}


/// Known dice types, keyed by a case-insensitive code.
///
/// Read-only once built; share it behind an [`Arc`] between threads.
///
/// # Examples
/// ```
/// use faceroll::Registry;
///
/// let registry = Registry::from_json_str(r#"{
///     "F": { "faces": ["-", "0", "+"], "values": { "-": -1, "+": 1 } }
/// }"#).unwrap();
///
/// let fudge = registry.lookup("f").unwrap();
/// assert_eq!(fudge.sides(), 3);
/// assert_eq!(fudge.face(2).value, Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: HashMap<String, (String, Arc<DiceType>)>,
}

impl Registry {
    /// An empty registry; only numbered dice such as `d20` resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the dice type for `code`.
    pub fn insert(&mut self, code: impl Into<String>, dice: DiceType) {
        let code = code.into();
        self.types.insert(code.to_ascii_lowercase(), (code, Arc::new(dice)));
    }

    /// Finds a dice type by code, ignoring ASCII case.
    pub fn lookup(&self, code: &str) -> Option<&Arc<DiceType>> {
        self.types
            .get(&code.to_ascii_lowercase())
            .map(|(_, dice)| dice)
    }

    /// Registered codes as they were written.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.types.values().map(|(code, _)| code.as_str())
    }

    /// Number of registered dice types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no dice type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Longest registered code that `text` starts with, ignoring ASCII case.
    pub(crate) fn longest_prefix(&self, text: &str) -> Option<(&str, &Arc<DiceType>)> {
        self.types
            .values()
            .filter(|(code, _)| {
                text.get(..code.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(code))
            })
            .max_by_key(|(code, _)| code.len())
            .map(|(code, dice)| (code.as_str(), dice))
    }

    /// Parses a registry from its JSON form: an object keyed by dice-type code.
    ///
    /// # Errors
    /// - [`RegistryError::Json`] if the document does not match the registry format.
    /// - [`RegistryError::NoFaces`] if a dice type has neither `sides` nor `faces`.
    /// - [`RegistryError::Rule`] if a natural rule is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let specs: HashMap<String, DiceTypeSpec> = serde_json::from_str(json)?;
        let mut registry = Self::new();

        for (code, spec) in specs {
            let dice = spec.build(&code)?;
            registry.insert(code, dice);
        }

        debug!(types = registry.len(), "Loaded dice registry");
        Ok(registry)
    }

    /// Reads and parses a JSON registry file.
    ///
    /// # Errors
    /// - [`RegistryError::Io`] if the file cannot be read.
    /// - Any error of [`Registry::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}


#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiceTypeSpec {
    name: Option<String>,
    sides: Option<u32>,
    faces: Option<Vec<AtomSpec>>,
    #[serde(default)]
    values: HashMap<String, i64>,
    #[serde(default)]
    names: HashMap<String, String>,
    success: Option<RuleSpec>,
    failure: Option<RuleSpec>,
    boon: Option<RuleSpec>,
    complication: Option<RuleSpec>,
    crit_success: Option<OperandSpec>,
    crit_failure: Option<OperandSpec>,
    crit_boon: Option<OperandSpec>,
    crit_complication: Option<OperandSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    op: String,
    value: OperandSpec,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OperandSpec {
    One(AtomSpec),
    Many(Vec<AtomSpec>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AtomSpec {
    Value(i64),
    Label(String),
}

impl From<AtomSpec> for Atom {
    fn from(value: AtomSpec) -> Self {
        match value {
            AtomSpec::Value(value) => Atom::Value(value),
            AtomSpec::Label(label) => Atom::Label(label),
        }
    }
}

impl AtomSpec {
    fn into_label(self) -> String {
        match self {
            AtomSpec::Value(value) => value.to_string(),
            AtomSpec::Label(label) => label,
        }
    }
}

impl OperandSpec {
    fn into_atoms(self) -> Vec<Atom> {
        match self {
            OperandSpec::One(atom) => vec![atom.into()],
            OperandSpec::Many(atoms) => atoms.into_iter().map(Atom::from).collect(),
        }
    }
}

impl DiceTypeSpec {
    fn build(self, code: &str) -> Result<DiceType, RegistryError> {
        let no_faces = || RegistryError::NoFaces(code.into());

        let mut dice = match (self.faces, self.sides) {
            (Some(faces), sides) => {
                if sides.is_some_and(|sides| sides as usize != faces.len()) {
                    warn!(code, "Dice type gives both `sides` and `faces`, using `faces`");
                }

                DiceType::from_faces(faces.into_iter().map(AtomSpec::into_label))
                    .ok_or_else(no_faces)?
            },
            (None, Some(sides)) => NonZeroU32::new(sides)
                .map(DiceType::uniform)
                .ok_or_else(no_faces)?,
            (None, None) => return Err(no_faces())
        };

        dice.name = self.name;
        dice.values = self.values;
        dice.face_names = self.names;

        let rules = [self.success, self.failure, self.boon, self.complication];
        for (category, rule) in Category::ALL.into_iter().zip(rules) {
            if let Some(rule) = rule {
                dice = dice.with_natural(category, &rule.op, rule.value.into_atoms())
                    .map_err(|source| RegistryError::Rule { code: code.into(), source })?;
            }
        }

        let crits = [self.crit_success, self.crit_failure, self.crit_boon, self.crit_complication];
        for (category, crit) in Category::ALL.into_iter().zip(crits) {
            if let Some(crit) = crit {
                dice = dice.with_natural_crit(category, crit.into_atoms());
            }
        }

        Ok(dice)
    }
}
