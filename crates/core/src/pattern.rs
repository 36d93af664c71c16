use crate::token::{Bindings, Token};
use crate::tokenizer::{tokenize, Segment, SyntaxError, DELIMITER};
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

const ATTR_SELECT: &str = "s";
const ATTR_LAZY: &str = "?";
const ATTR_DIGITS: &str = "n";
const ATTR_LETTERS: &str = "a";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("only alphanumerics are allowed for placeholder names: |{0}|")]
    IllegalName(String),
    #[error("placeholder name is used more than once: |{0}|")]
    DuplicateName(String),
    #[error("unrecognized attribute for |{name}|: {attributes}")]
    UnrecognizedAttribute { name: String, attributes: String },
    #[error("the escape placeholder || does not take attributes: |{0}|")]
    EscapeWithAttributes(String),
    #[error("failed to compile pattern \"{pattern}\": {reason}")]
    Compile { pattern: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharClass {
    pub digits: bool,
    pub letters: bool,
}

impl CharClass {
    fn to_regex(self) -> String {
        if !self.digits && !self.letters {
            return ".".to_string();
        }
        let mut class = String::from("[");
        if self.digits {
            class.push_str("0-9");
        }
        if self.letters {
            class.push_str("a-zA-Z");
        }
        class.push(']');
        class
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Exact(usize),
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSpec {
    pub name: String,
    pub class: CharClass,
    pub quantifier: Quantifier,
    pub greedy: bool,
    pub selected: bool,
}

impl PlaceholderSpec {
    /// Parses the inside of `|NAME:attr:attr|`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let mut pieces = raw.split(':');
        let name = pieces.next().unwrap_or_default().to_string();
        if name.is_empty() || !name.chars().all(char::is_alphanumeric) {
            return Err(PatternError::IllegalName(name));
        }

        let mut spec = PlaceholderSpec {
            name,
            class: CharClass::default(),
            quantifier: Quantifier::Star,
            greedy: true,
            selected: false,
        };
        let mut unrecognized = Vec::new();
        for attr in pieces {
            match attr {
                "" => {}
                ATTR_SELECT => spec.selected = true,
                ATTR_LAZY => spec.greedy = false,
                ATTR_DIGITS => spec.class.digits = true,
                ATTR_LETTERS => spec.class.letters = true,
                count if count.chars().all(|c| c.is_ascii_digit()) => match count.parse() {
                    Ok(n) => spec.quantifier = Quantifier::Exact(n),
                    Err(_) => unrecognized.push(count.to_string()),
                },
                other => unrecognized.push(other.to_string()),
            }
        }
        if !unrecognized.is_empty() {
            return Err(PatternError::UnrecognizedAttribute {
                name: spec.name,
                attributes: unrecognized.join(", "),
            });
        }
        Ok(spec)
    }

    fn to_regex(&self, group: &str) -> String {
        let lazy = if self.greedy { "" } else { "?" };
        let quantifier = match self.quantifier {
            Quantifier::Exact(n) => format!("{{{n}}}"),
            Quantifier::Star => "*".to_string(),
        };
        format!(
            "(?P<{group}>{}{quantifier}{lazy})",
            self.class.to_regex()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Literal(String),
    Escape,
    Placeholder(PlaceholderSpec),
}

/// A compiled `--pattern` template.
#[derive(Debug, Clone)]
pub struct SelectionPattern {
    source: String,
    segments: Vec<PatternSegment>,
    regex: Regex,
    /// Synthetic capture-group name for every placeholder segment, by segment index.
    groups: Vec<Option<String>>,
}

impl SelectionPattern {
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let segments = parse_segments(template)?;

        let mut names = HashSet::new();
        let mut groups = Vec::with_capacity(segments.len());
        let mut expr = String::from(r"\A(?:");
        for (index, segment) in segments.iter().enumerate() {
            match segment {
                PatternSegment::Literal(text) => {
                    expr.push_str(&regex::escape(text));
                    groups.push(None);
                }
                PatternSegment::Escape => {
                    expr.push_str(&regex::escape(&DELIMITER.to_string()));
                    groups.push(None);
                }
                PatternSegment::Placeholder(spec) => {
                    if !names.insert(spec.name.clone()) {
                        return Err(PatternError::DuplicateName(spec.name.clone()));
                    }
                    // user names may start with a digit, which capture groups may not
                    let group = format!("p{index}");
                    expr.push_str(&spec.to_regex(&group));
                    groups.push(Some(group));
                }
            }
        }
        expr.push_str(r")\z");

        debug!(pattern = template, regex = %expr, "compiled selection pattern");
        let regex = Regex::new(&expr).map_err(|err| PatternError::Compile {
            pattern: template.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            source: template.to_string(),
            segments,
            regex,
            groups,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Decomposes `token` according to the pattern.
    ///
    /// Without a match the token comes back unselected. With a match every
    /// resulting token carries the captured bindings; if no placeholder is
    /// marked `s`, the whole text stays one selected token.
    pub fn parse_token(&self, token: &Token) -> Vec<Token> {
        let Some(captures) = self.regex.captures(&token.text) else {
            return vec![Token::unselected(token.text.clone())];
        };

        let mut bindings = Bindings::new();
        let mut captured = Vec::with_capacity(self.segments.len());
        for (segment, group) in self.segments.iter().zip(&self.groups) {
            match (segment, group) {
                (PatternSegment::Placeholder(spec), Some(group)) => {
                    let text = captures
                        .name(group)
                        .map(|m| m.as_str())
                        .unwrap_or_default()
                        .to_string();
                    bindings.insert(spec.name.clone(), text.clone());
                    captured.push(Some(text));
                }
                _ => captured.push(None),
            }
        }

        let any_selected = self
            .segments
            .iter()
            .any(|s| matches!(s, PatternSegment::Placeholder(spec) if spec.selected));
        if !any_selected {
            debug!(token = %token.text, ?bindings, "pattern matched whole token");
            return vec![Token::selected(token.text.clone()).with_bindings(bindings)];
        }

        self.segments
            .iter()
            .zip(captured)
            .map(|(segment, text)| {
                let token = match segment {
                    PatternSegment::Literal(literal) => Token::unselected(literal.clone()),
                    PatternSegment::Escape => Token::unselected(DELIMITER.to_string()),
                    PatternSegment::Placeholder(spec) => {
                        Token::new(text.unwrap_or_default(), spec.selected)
                    }
                };
                token.with_bindings(bindings.clone())
            })
            .collect()
    }
}

fn parse_segments(template: &str) -> Result<Vec<PatternSegment>, PatternError> {
    tokenize(template, DELIMITER, false)?
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(text) => Ok(PatternSegment::Literal(text)),
            Segment::Placeholder(raw) if raw.is_empty() => Ok(PatternSegment::Escape),
            Segment::Placeholder(raw) if raw.starts_with(':') => {
                Err(PatternError::EscapeWithAttributes(raw))
            }
            Segment::Placeholder(raw) => {
                PlaceholderSpec::parse(&raw).map(PatternSegment::Placeholder)
            }
        })
        .collect()
}
