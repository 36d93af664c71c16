use crate::pattern::{PatternError, SelectionPattern};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("--index cannot be combined with the index range options")]
    IndexCombination,
    #[error("the index range can have only one '{0}' bound (left or right)")]
    ConflictingIndexBounds(&'static str),
    #[error("indexes start at 1")]
    ZeroIndex,
    #[error("--text cannot be combined with the text range options")]
    TextCombination,
    #[error("the text range can have only one '{0}' bound (inclusive or exclusive)")]
    ConflictingTextBounds(&'static str),
    #[error("selection text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("{}: selection is empty", .0.display())]
    EmptySelection(PathBuf),
    #[error("{}: tokens do not add up to the file name: {tokens}", .path.display())]
    NameMismatch { path: PathBuf, tokens: String },
}

/// Stage 1: which part of `<stem>.<ext>` to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePart {
    Stem,
    Extension,
    ExtensionWithDot,
}

/// Stage 4: character predicate used for run-length segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharPredicate {
    Digit,
    NonDigit,
    Alpha,
    NonAlpha,
    Alnum,
    NonAlnum,
    Upper,
    Lower,
}

impl CharPredicate {
    pub fn matches(self, ch: char) -> bool {
        match self {
            CharPredicate::Digit => ch.is_numeric(),
            CharPredicate::NonDigit => !ch.is_numeric(),
            CharPredicate::Alpha => ch.is_alphabetic(),
            CharPredicate::NonAlpha => !ch.is_alphabetic(),
            CharPredicate::Alnum => ch.is_alphanumeric(),
            CharPredicate::NonAlnum => !ch.is_alphanumeric(),
            CharPredicate::Upper => ch.is_uppercase(),
            CharPredicate::Lower => ch.is_lowercase(),
        }
    }
}

/// Stage 2 options. All positions are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub single: Option<usize>,
    pub from: Option<usize>,
    pub to: Option<usize>,
    pub right_from: Option<usize>,
    pub right_to: Option<usize>,
}

/// Stage 3 options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOptions {
    pub split: Option<String>,
    pub from: Option<String>,
    pub from_exclusive: Option<String>,
    pub to: Option<String>,
    pub to_exclusive: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOptions {
    pub name_part: Option<NamePart>,
    pub index: IndexOptions,
    pub text: TextOptions,
    pub char_class: Option<CharPredicate>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Left(usize),
    Right(usize),
}

impl Bound {
    fn resolve(self, len: usize) -> usize {
        match self {
            Bound::Left(n) => (n - 1).min(len),
            Bound::Right(n) => len.saturating_sub(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    From,
    FromExclusive,
    To,
    ToExclusive,
}

#[derive(Debug, Clone)]
enum Selector {
    NamePart(NamePart),
    Index(usize),
    IndexRange {
        from: Option<Bound>,
        to: Option<Bound>,
    },
    Split(String),
    Boundary {
        literal: String,
        kind: BoundaryKind,
    },
    Chars(CharPredicate),
    Pattern(SelectionPattern),
}

impl Selector {
    fn apply(&self, token: &Token) -> Vec<Token> {
        match self {
            Selector::NamePart(part) => select_name_part(&token.text, *part),
            Selector::Index(index) => select_index(&token.text, *index),
            Selector::IndexRange { from, to } => select_index_range(&token.text, *from, *to),
            Selector::Split(literal) => split_on_text(&token.text, literal),
            Selector::Boundary { literal, kind } => select_boundary(&token.text, literal, *kind),
            Selector::Chars(predicate) => select_chars(&token.text, *predicate),
            Selector::Pattern(pattern) => pattern.parse_token(token),
        }
    }
}

/// The five selection stages in their fixed order:
/// name part, index, text, character class, pattern.
#[derive(Debug, Clone, Default)]
pub struct SelectionPipeline {
    selectors: Vec<Selector>,
}

impl SelectionPipeline {
    pub fn new(options: &SelectionOptions) -> Result<Self, SelectionError> {
        let mut selectors = Vec::new();

        if let Some(part) = options.name_part {
            selectors.push(Selector::NamePart(part));
        }
        if let Some(selector) = index_selector(&options.index)? {
            selectors.push(selector);
        }
        selectors.extend(text_selectors(&options.text)?);
        if let Some(predicate) = options.char_class {
            selectors.push(Selector::Chars(predicate));
        }
        if let Some(template) = options.pattern.as_deref() {
            selectors.push(Selector::Pattern(SelectionPattern::compile(template)?));
        }

        Ok(Self { selectors })
    }

    /// Refines `name` through every configured stage.
    pub fn select(&self, name: &str) -> Vec<Token> {
        let mut tokens = vec![Token::selected(name)];
        for (level, selector) in self.selectors.iter().enumerate() {
            tokens = tokens
                .into_iter()
                .flat_map(|token| {
                    if token.selected {
                        selector.apply(&token)
                    } else {
                        vec![token]
                    }
                })
                .collect();
            debug!(level = level + 1, tokens = %describe(&tokens), "selection stage");
        }
        tokens
    }

    /// Same as [`select`](Self::select), rejecting selections that collapsed to nothing.
    pub fn select_file(&self, path: &Path, name: &str) -> Result<Vec<Token>, SelectionError> {
        let tokens = self.select(name);
        if tokens.iter().any(|t| t.selected && t.text.is_empty()) {
            return Err(SelectionError::EmptySelection(path.to_path_buf()));
        }
        Ok(tokens)
    }
}

fn index_selector(options: &IndexOptions) -> Result<Option<Selector>, SelectionError> {
    let positions = [
        options.single,
        options.from,
        options.to,
        options.right_from,
        options.right_to,
    ];
    if positions.iter().flatten().any(|&n| n == 0) {
        return Err(SelectionError::ZeroIndex);
    }

    let has_range = options.from.is_some()
        || options.to.is_some()
        || options.right_from.is_some()
        || options.right_to.is_some();
    if let Some(index) = options.single {
        if has_range {
            return Err(SelectionError::IndexCombination);
        }
        return Ok(Some(Selector::Index(index)));
    }
    if !has_range {
        return Ok(None);
    }

    let from = match (options.from, options.right_from) {
        (Some(_), Some(_)) => return Err(SelectionError::ConflictingIndexBounds("from")),
        (Some(n), None) => Some(Bound::Left(n)),
        (None, Some(n)) => Some(Bound::Right(n)),
        (None, None) => None,
    };
    let to = match (options.to, options.right_to) {
        (Some(_), Some(_)) => return Err(SelectionError::ConflictingIndexBounds("to")),
        (Some(n), None) => Some(Bound::Left(n)),
        (None, Some(n)) => Some(Bound::Right(n)),
        (None, None) => None,
    };
    Ok(Some(Selector::IndexRange { from, to }))
}

fn text_selectors(options: &TextOptions) -> Result<Vec<Selector>, SelectionError> {
    let all = [
        &options.split,
        &options.from,
        &options.from_exclusive,
        &options.to,
        &options.to_exclusive,
    ];
    if all.iter().any(|o| o.as_deref() == Some("")) {
        return Err(SelectionError::EmptyText);
    }

    let has_boundary = all[1..].iter().any(|o| o.is_some());
    if let Some(literal) = &options.split {
        if has_boundary {
            return Err(SelectionError::TextCombination);
        }
        return Ok(vec![Selector::Split(literal.clone())]);
    }

    let mut selectors = Vec::new();
    let from = boundary(
        &options.from,
        &options.from_exclusive,
        BoundaryKind::From,
        BoundaryKind::FromExclusive,
    )
    .ok_or(SelectionError::ConflictingTextBounds("from"))?;
    let to = boundary(
        &options.to,
        &options.to_exclusive,
        BoundaryKind::To,
        BoundaryKind::ToExclusive,
    )
    .ok_or(SelectionError::ConflictingTextBounds("to"))?;
    selectors.extend(from);
    selectors.extend(to);
    Ok(selectors)
}

/// `None` when both forms are set; `Some(None)` when neither is.
fn boundary(
    inclusive: &Option<String>,
    exclusive: &Option<String>,
    inclusive_kind: BoundaryKind,
    exclusive_kind: BoundaryKind,
) -> Option<Option<Selector>> {
    match (inclusive, exclusive) {
        (Some(_), Some(_)) => None,
        (Some(literal), None) => Some(Some(Selector::Boundary {
            literal: literal.clone(),
            kind: inclusive_kind,
        })),
        (None, Some(literal)) => Some(Some(Selector::Boundary {
            literal: literal.clone(),
            kind: exclusive_kind,
        })),
        (None, None) => Some(None),
    }
}

/// Splits a file name into stem and extension (with dot) the way most shells
/// see it: a leading dot or a trailing dot does not start an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 && i < name.len() - 1 => name.split_at(i),
        _ => (name, ""),
    }
}

fn unchanged(text: &str) -> Vec<Token> {
    vec![Token::unselected(text)]
}

/// Builds `[before][selected][after]`, dropping empty unselected parts.
fn around(before: &str, selected: &str, after: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(3);
    if !before.is_empty() {
        tokens.push(Token::unselected(before));
    }
    tokens.push(Token::selected(selected));
    if !after.is_empty() {
        tokens.push(Token::unselected(after));
    }
    tokens
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn select_name_part(text: &str, part: NamePart) -> Vec<Token> {
    let (stem, ext) = split_extension(text);
    match part {
        NamePart::Stem => around("", stem, ext),
        _ if ext.is_empty() => unchanged(text),
        NamePart::Extension => vec![
            Token::unselected(stem),
            Token::unselected("."),
            Token::selected(&ext[1..]),
        ],
        NamePart::ExtensionWithDot => around(stem, ext, ""),
    }
}

fn select_index(text: &str, index: usize) -> Vec<Token> {
    let len = text.chars().count();
    if index > len {
        return unchanged(text);
    }
    let start = byte_offset(text, index - 1);
    let end = byte_offset(text, index);
    around(&text[..start], &text[start..end], &text[end..])
}

fn select_index_range(text: &str, from: Option<Bound>, to: Option<Bound>) -> Vec<Token> {
    let len = text.chars().count();
    let start = from.map(|b| b.resolve(len)).unwrap_or(0);
    let end = to.map(|b| b.resolve(len)).unwrap_or(len);
    if start >= end {
        return unchanged(text);
    }
    let (start, end) = (byte_offset(text, start), byte_offset(text, end));
    around(&text[..start], &text[start..end], &text[end..])
}

fn split_on_text(text: &str, literal: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (i, remainder) in text.split(literal).enumerate() {
        if i > 0 {
            tokens.push(Token::selected(literal));
        }
        tokens.push(Token::unselected(remainder));
    }
    tokens
}

fn select_boundary(text: &str, literal: &str, kind: BoundaryKind) -> Vec<Token> {
    let Some(pos) = text.find(literal) else {
        return unchanged(text);
    };
    let after = pos + literal.len();
    let (split_at, select_tail) = match kind {
        BoundaryKind::From => (pos, true),
        BoundaryKind::FromExclusive => (after, true),
        BoundaryKind::To => (after, false),
        BoundaryKind::ToExclusive => (pos, false),
    };
    let (head, tail) = text.split_at(split_at);
    if select_tail {
        around(head, tail, "")
    } else {
        around("", head, tail)
    }
}

fn select_chars(text: &str, predicate: CharPredicate) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for ch in text.chars() {
        let selected = predicate.matches(ch);
        match tokens.last_mut() {
            Some(run) if run.selected == selected => run.text.push(ch),
            _ => tokens.push(Token::new(ch.to_string(), selected)),
        }
    }
    if tokens.is_empty() {
        tokens.push(Token::unselected(""));
    }
    tokens
}

fn describe(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.selected {
                format!("[{}]", t.text)
            } else {
                t.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
