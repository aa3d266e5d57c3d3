//! Feature descriptors
//!
//! Two layers live here. The `*Def` types are plain data: they are what the
//! built-in tables are written in and what an external TOML table
//! deserializes into. Compiling a [`FeatureDef`] validates it and produces an
//! immutable [`Feature`] tree with regexes ready for matching.

use crate::types::{BodyType, EngineError, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// A literal or regex matcher as written in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherDef {
    /// Exact string equality
    Literal(String),
    /// Regular expression that must match the whole text
    Pattern(String),
}

/// Shorthand for a literal matcher definition
pub fn lit(text: &str) -> MatcherDef {
    MatcherDef::Literal(text.to_string())
}

/// Shorthand for a regex matcher definition
pub fn pat(source: &str) -> MatcherDef {
    MatcherDef::Pattern(source.to_string())
}

/// A `(key matcher, value matcher)` pair as written in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub key: MatcherDef,
    pub value: MatcherDef,
}

impl ParameterDef {
    pub fn new(key: MatcherDef, value: MatcherDef) -> Self {
        Self { key, value }
    }
}

/// The line-shape part of a feature, shared by roots and children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDef {
    pub sequence_type: String,
    pub level: usize,
    #[serde(default)]
    pub body_type: Option<BodyType>,
    #[serde(default)]
    pub command: Option<MatcherDef>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub children: Vec<PatternDef>,
    /// The child cursor may step over this pattern when it does not match
    #[serde(default)]
    pub optional: bool,
    /// Array-style: keeps matching successive lines until one fails
    #[serde(default)]
    pub repeat: bool,
}

impl PatternDef {
    pub fn new(sequence_type: &str, level: usize) -> Self {
        Self {
            sequence_type: sequence_type.to_string(),
            level,
            body_type: None,
            command: None,
            parameters: Vec::new(),
            children: Vec::new(),
            optional: false,
            repeat: false,
        }
    }

    pub fn body(mut self, body_type: BodyType) -> Self {
        self.body_type = Some(body_type);
        self
    }

    pub fn command(mut self, command: MatcherDef) -> Self {
        self.command = Some(command);
        self
    }

    pub fn param(mut self, key: MatcherDef, value: MatcherDef) -> Self {
        self.parameters.push(ParameterDef::new(key, value));
        self
    }

    pub fn child(mut self, child: PatternDef) -> Self {
        self.children.push(child);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    fn compile(self) -> Result<Pattern> {
        if self.sequence_type.trim().is_empty() {
            return Err(EngineError::InvalidFeature(
                "sequence_type must not be empty".to_string(),
            ));
        }

        let mut children = Vec::with_capacity(self.children.len());
        for child in self.children {
            if child.level != self.level + 1 {
                return Err(EngineError::InvalidFeature(format!(
                    "child of '{}' at level {} must be at level {}, found {}",
                    self.sequence_type,
                    self.level,
                    self.level + 1,
                    child.level
                )));
            }
            children.push(child.compile()?);
        }

        let parameters = self
            .parameters
            .into_iter()
            .map(|parameter| {
                Ok(ParameterMatcher {
                    key: Matcher::compile(parameter.key)?,
                    value: Matcher::compile(parameter.value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Pattern {
            sequence_type: self.sequence_type,
            level: self.level,
            body_type: self.body_type,
            command: self.command.map(Matcher::compile).transpose()?,
            parameters,
            children,
            optional: self.optional,
            repeat: self.repeat,
        })
    }
}

/// A complete feature as written in a table: a state plus its root pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDef<S> {
    pub state: S,
    #[serde(flatten)]
    pub pattern: PatternDef,
}

impl<S> FeatureDef<S> {
    pub fn new(state: S, pattern: PatternDef) -> Self {
        Self { state, pattern }
    }

    /// Validate and compile into an immutable feature tree
    pub fn compile(self) -> Result<Feature<S>> {
        if self.pattern.level != 0 {
            return Err(EngineError::InvalidFeature(format!(
                "root pattern '{}' must be at level 0, found {}",
                self.pattern.sequence_type, self.pattern.level
            )));
        }

        Ok(Feature {
            state: self.state,
            root: self.pattern.compile()?,
        })
    }
}

/// Compiled literal or regex matcher
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    /// Anchored regex; `source` keeps the text as written
    Pattern { source: String, regex: Regex },
}

impl Matcher {
    pub fn literal(text: impl Into<String>) -> Self {
        Matcher::Literal(text.into())
    }

    /// Compile a regex that must match the whole text
    pub fn pattern(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|error| {
            EngineError::InvalidPattern {
                pattern: source.to_string(),
                source: error,
            }
        })?;

        Ok(Matcher::Pattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn compile(def: MatcherDef) -> Result<Self> {
        match def {
            MatcherDef::Literal(text) => Ok(Matcher::Literal(text)),
            MatcherDef::Pattern(source) => Matcher::pattern(&source),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Literal(expected) => expected == text,
            Matcher::Pattern { regex, .. } => regex.is_match(text),
        }
    }

    /// Match the text and return its capture groups
    ///
    /// `None` on mismatch. Literals and group-less regexes yield an empty list.
    /// Groups that did not participate in the match are skipped.
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        match self {
            Matcher::Literal(expected) => (expected == text).then(Vec::new),
            Matcher::Pattern { regex, .. } => regex.captures(text).map(|caps| group_values(&caps)),
        }
    }

    /// The matcher text as written
    pub fn as_str(&self) -> &str {
        match self {
            Matcher::Literal(text) => text,
            Matcher::Pattern { source, .. } => source,
        }
    }
}

fn group_values(caps: &Captures<'_>) -> Vec<String> {
    caps.iter()
        .skip(1)
        .flatten()
        .map(|group| group.as_str().to_string())
        .collect()
}

/// Compiled `(key, value)` matcher pair
#[derive(Debug, Clone)]
pub struct ParameterMatcher {
    pub key: Matcher,
    pub value: Matcher,
}

/// Compiled line pattern with its ordered children
#[derive(Debug, Clone)]
pub struct Pattern {
    pub sequence_type: String,
    pub level: usize,
    pub body_type: Option<BodyType>,
    pub command: Option<Matcher>,
    pub parameters: Vec<ParameterMatcher>,
    pub children: Vec<Pattern>,
    pub optional: bool,
    pub repeat: bool,
}

impl Pattern {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether the child at `index` keeps matching successive lines
    ///
    /// The last child of a list always repeats.
    pub fn child_repeats(&self, index: usize) -> bool {
        index + 1 == self.children.len()
            || self.children.get(index).map(|child| child.repeat).unwrap_or(false)
    }
}

/// An immutable, validated feature
#[derive(Debug, Clone)]
pub struct Feature<S> {
    pub state: S,
    pub root: Pattern,
}
