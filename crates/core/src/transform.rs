use crate::placeholder::{resolve_text, ResolveError};
use crate::renamer::Renamer;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("the fill character must be exactly one character long: \"{0}\"")]
    FillChar(String),
    #[error("the swap separator must not be empty")]
    EmptySeparator,
    #[error("{}: the new file name is empty", .0.display())]
    EmptyName(PathBuf),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingOptions {
    pub start: i64,
    pub step: i64,
    /// Zero-padding width; derived from the batch when `None`.
    pub width: Option<usize>,
    pub reset_per_directory: bool,
    pub at_end: bool,
    pub replace: bool,
    pub before: String,
    pub after: String,
}

impl Default for NumberingOptions {
    fn default() -> Self {
        Self {
            start: 1,
            step: 1,
            width: None,
            reset_per_directory: true,
            at_end: false,
            replace: false,
            before: String::new(),
            after: String::new(),
        }
    }
}

/// What to do with the selected part of each name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    Test { show_placeholders: bool },
    Add { text: String, at_end: bool },
    Remove,
    Replace { text: String },
    Lowercase,
    Uppercase,
    Camelcase,
    Sentencecase,
    Fill {
        fill: String,
        width: Option<usize>,
        at_end: bool,
    },
    Swap {
        separator: String,
        side: Option<SwapSide>,
    },
    Number(NumberingOptions),
    Cut { count: usize, at_end: bool },
    Keep { count: usize, at_end: bool },
    Dir { target: String },
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Test { .. } => "test",
            Transform::Add { .. } => "add",
            Transform::Remove => "remove",
            Transform::Replace { .. } => "replace",
            Transform::Lowercase => "lowercase",
            Transform::Uppercase => "uppercase",
            Transform::Camelcase => "camelcase",
            Transform::Sentencecase => "sentencecase",
            Transform::Fill { .. } => "fill",
            Transform::Swap { .. } => "swap",
            Transform::Number(_) => "number",
            Transform::Cut { .. } => "cut",
            Transform::Keep { .. } => "keep",
            Transform::Dir { .. } => "dir",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Transform::Test { .. })
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        match self {
            Transform::Fill { fill, .. } if fill.chars().count() != 1 => {
                Err(TransformError::FillChar(fill.clone()))
            }
            Transform::Swap { separator, .. } if separator.is_empty() => {
                Err(TransformError::EmptySeparator)
            }
            _ => Ok(()),
        }
    }

    /// Applies the transform to every renamer of a sorted batch.
    pub fn apply_to_batch(&self, renamers: &mut [Renamer]) -> Result<(), TransformError> {
        self.validate()?;

        let fill_width = match self {
            Transform::Fill { width: Some(w), .. } => *w,
            Transform::Fill { width: None, .. } => auto_fill_width(renamers),
            _ => 0,
        };
        let mut numbering = match self {
            Transform::Number(options) => Some(Numbering::new(options.clone(), renamers)),
            _ => None,
        };

        for renamer in renamers.iter_mut() {
            self.apply(renamer, fill_width, numbering.as_mut())?;
            if renamer.new_name().is_empty() {
                return Err(TransformError::EmptyName(renamer.path().to_path_buf()));
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        renamer: &mut Renamer,
        fill_width: usize,
        numbering: Option<&mut Numbering>,
    ) -> Result<(), TransformError> {
        match self {
            Transform::Test { .. } => Ok(()),
            Transform::Add { text, at_end } => map_selected(renamer, |r, t| {
                let value = resolve_text(text, r, t)?;
                Ok(if *at_end {
                    format!("{}{value}", t.text)
                } else {
                    format!("{value}{}", t.text)
                })
            }),
            Transform::Remove => map_selected(renamer, |_, _| Ok(String::new())),
            Transform::Replace { text } => {
                map_selected(renamer, |r, t| Ok(resolve_text(text, r, t)?))
            }
            Transform::Lowercase => map_selected(renamer, |_, t| Ok(t.text.to_lowercase())),
            Transform::Uppercase => map_selected(renamer, |_, t| Ok(t.text.to_uppercase())),
            Transform::Camelcase => map_selected(renamer, |_, t| Ok(capitalize_words(&t.text))),
            Transform::Sentencecase => map_selected(renamer, |_, t| Ok(capitalize(&t.text))),
            Transform::Fill { fill, at_end, .. } => {
                let ch = fill.chars().next().unwrap_or(' ');
                map_first_selected(renamer, |_, t| Ok(pad(&t.text, ch, fill_width, *at_end)))
            }
            Transform::Swap { separator, side } => {
                map_selected(renamer, |_, t| Ok(swap(&t.text, separator, *side)))
            }
            Transform::Number(_) => match numbering {
                Some(numbering) => numbering.apply(renamer),
                None => Ok(()),
            },
            Transform::Cut { count, at_end } => {
                map_selected(renamer, |_, t| Ok(cut(&t.text, *count, *at_end)))
            }
            Transform::Keep { count, at_end } => {
                map_selected(renamer, |_, t| Ok(keep(&t.text, *count, *at_end)))
            }
            Transform::Dir { target } => apply_dir(renamer, target),
        }
    }
}

fn map_selected<F>(renamer: &mut Renamer, mut f: F) -> Result<(), TransformError>
where
    F: FnMut(&Renamer, &Token) -> Result<String, TransformError>,
{
    let updates = renamer
        .tokens()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.selected)
        .map(|(i, t)| f(renamer, t).map(|text| (i, text)))
        .collect::<Result<Vec<_>, _>>()?;
    let tokens = renamer.tokens_mut();
    for (i, text) in updates {
        tokens[i].text = text;
    }
    Ok(())
}

fn map_first_selected<F>(renamer: &mut Renamer, f: F) -> Result<(), TransformError>
where
    F: FnOnce(&Renamer, &Token) -> Result<String, TransformError>,
{
    let Some(index) = renamer.tokens().iter().position(|t| t.selected) else {
        return Ok(());
    };
    let text = f(renamer, &renamer.tokens()[index])?;
    renamer.tokens_mut()[index].text = text;
    Ok(())
}

fn apply_dir(renamer: &mut Renamer, target: &str) -> Result<(), TransformError> {
    let Some(token) = renamer.first_selected() else {
        return Ok(());
    };
    let target = if target.ends_with('/') {
        target.to_string()
    } else {
        format!("{target}/")
    };
    let prefix = resolve_text(&target, renamer, token)?;
    if let Some(first) = renamer.tokens_mut().first_mut() {
        first.prepend(&prefix);
    }
    Ok(())
}

fn auto_fill_width(renamers: &[Renamer]) -> usize {
    renamers
        .iter()
        .filter_map(|r| r.first_selected())
        .map(|t| t.text.chars().count())
        .max()
        .unwrap_or(0)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(&chars.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn pad(text: &str, ch: char, width: usize, at_end: bool) -> String {
    let missing = width.saturating_sub(text.chars().count());
    let padding: String = std::iter::repeat(ch).take(missing).collect();
    if at_end {
        format!("{text}{padding}")
    } else {
        format!("{padding}{text}")
    }
}

fn swap(text: &str, separator: &str, side: Option<SwapSide>) -> String {
    let Some((pre, post)) = text.split_once(separator) else {
        return text.to_string();
    };
    match side {
        Some(SwapSide::Left) => format!("{post}{pre}{separator}"),
        Some(SwapSide::Right) => format!("{separator}{post}{pre}"),
        None => format!("{post}{separator}{pre}"),
    }
}

fn cut(text: &str, count: usize, at_end: bool) -> String {
    let len = text.chars().count();
    if at_end {
        text.chars().take(len.saturating_sub(count)).collect()
    } else {
        text.chars().skip(count).collect()
    }
}

fn keep(text: &str, count: usize, at_end: bool) -> String {
    let len = text.chars().count();
    if at_end {
        text.chars().skip(len.saturating_sub(count)).collect()
    } else {
        text.chars().take(count).collect()
    }
}

/// Sequential counter threaded through a sorted batch.
#[derive(Debug, Clone)]
pub struct Numbering {
    options: NumberingOptions,
    width: usize,
    current: i64,
    current_dir: Option<PathBuf>,
}

impl Numbering {
    /// With a per-directory reset the width fits the largest directory, so
    /// every number in the batch is padded the same way.
    pub fn new(options: NumberingOptions, renamers: &[Renamer]) -> Self {
        let mut counts = BTreeMap::<PathBuf, usize>::new();
        for renamer in renamers.iter().filter(|r| r.has_selection()) {
            let key = if options.reset_per_directory {
                renamer.parent().to_path_buf()
            } else {
                PathBuf::new()
            };
            *counts.entry(key).or_default() += 1;
        }

        let width = options.width.unwrap_or_else(|| {
            counts
                .values()
                .map(|&count| auto_width(options.start, options.step, count))
                .max()
                .unwrap_or(1)
        });
        debug!(?counts, width, "numbering width");

        Self {
            current: options.start,
            options,
            width,
            current_dir: None,
        }
    }

    /// Numbers the first selected token of `renamer`.
    pub fn apply(&mut self, renamer: &mut Renamer) -> Result<(), TransformError> {
        let dir = renamer.parent().to_path_buf();
        if self.options.reset_per_directory && self.current_dir.as_ref() != Some(&dir) {
            if self.current_dir.is_some() {
                self.current = self.options.start;
            }
            self.current_dir = Some(dir.clone());
        }

        let Some(index) = renamer.tokens().iter().position(|t| t.selected) else {
            return Ok(());
        };
        let token = &renamer.tokens()[index];
        let number = format!(
            "{}{}{}",
            resolve_text(&self.options.before, renamer, token)?,
            format_number(self.current, self.width),
            resolve_text(&self.options.after, renamer, token)?,
        );

        let token = &mut renamer.tokens_mut()[index];
        if self.options.replace {
            token.text = number;
        } else if self.options.at_end {
            token.append(&number);
        } else {
            token.prepend(&number);
        }
        self.current += self.options.step;
        Ok(())
    }
}

fn format_number(value: i64, width: usize) -> String {
    if value < 0 {
        format!("-{:0width$}", value.unsigned_abs(), width = width.saturating_sub(1))
    } else {
        format!("{value:0width$}")
    }
}

fn digits(value: i64) -> usize {
    let sign = usize::from(value < 0);
    sign + value.unsigned_abs().to_string().len()
}

/// Width large enough for every value the counter reaches over `count` files.
fn auto_width(start: i64, step: i64, count: usize) -> usize {
    if count == 0 {
        return 1;
    }
    let last = start.saturating_add(step.saturating_mul(count as i64 - 1));
    digits(start).max(digits(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{SelectionOptions, SelectionPipeline, TextOptions};
    use crate::token::join_text;

    fn batch(paths: &[&str], options: &SelectionOptions) -> Vec<Renamer> {
        let pipeline = SelectionPipeline::new(options).expect("pipeline");
        paths
            .iter()
            .map(|p| {
                let path = PathBuf::from(p);
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .expect("name")
                    .to_string();
                let tokens = pipeline.select(&name);
                Renamer::new(path, tokens).expect("renamer")
            })
            .collect()
    }

    fn stems(paths: &[&str]) -> Vec<Renamer> {
        batch(
            paths,
            &SelectionOptions {
                name_part: Some(crate::selection::NamePart::Stem),
                ..Default::default()
            },
        )
    }

    fn names(renamers: &[Renamer]) -> Vec<String> {
        renamers.iter().map(|r| r.new_name()).collect()
    }

    #[test]
    fn add_prepends_or_appends_resolved_text() {
        let mut renamers = stems(&["/music/Stones/a.txt"]);
        Transform::Add {
            text: "|f0| - ".into(),
            at_end: false,
        }
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["Stones - a.txt"]);

        let mut renamers = stems(&["/tmp/a.txt"]);
        Transform::Add {
            text: "_x".into(),
            at_end: true,
        }
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["a_x.txt"]);
    }

    #[test]
    fn replace_uses_pattern_bindings() {
        let mut renamers = batch(
            &["/tmp/IMG_20180122 - one.jpg"],
            &SelectionOptions {
                name_part: Some(crate::selection::NamePart::Stem),
                pattern: Some("IMG_|Y:4||M:2||D:2| - |T|".into()),
                ..Default::default()
            },
        );
        Transform::Replace {
            text: "|Y|-|M|-|D| |T|".into(),
        }
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["2018-01-22 one.jpg"]);
    }

    #[test]
    fn removing_everything_is_rejected() {
        let mut renamers = batch(&["/tmp/a.txt"], &SelectionOptions::default());
        let err = Transform::Remove
            .apply_to_batch(&mut renamers)
            .expect_err("must fail");
        assert!(matches!(err, TransformError::EmptyName(_)));
    }

    #[test]
    fn case_transforms() {
        let mut renamers = stems(&["/tmp/the  QUICK fox.TXT"]);
        Transform::Camelcase
            .apply_to_batch(&mut renamers)
            .expect("apply");
        assert_eq!(names(&renamers), vec!["The Quick Fox.TXT"]);

        let mut renamers = stems(&["/tmp/the QUICK fox.TXT"]);
        Transform::Sentencecase
            .apply_to_batch(&mut renamers)
            .expect("apply");
        assert_eq!(names(&renamers), vec!["The quick fox.TXT"]);

        let mut renamers = stems(&["/tmp/MiXed.txt"]);
        Transform::Lowercase
            .apply_to_batch(&mut renamers)
            .expect("apply");
        assert_eq!(names(&renamers), vec!["mixed.txt"]);
    }

    #[test]
    fn fill_pads_to_longest_selection() {
        let mut renamers = stems(&["/tmp/1.txt", "/tmp/22.txt", "/tmp/333.txt"]);
        Transform::Fill {
            fill: "0".into(),
            width: None,
            at_end: false,
        }
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["001.txt", "022.txt", "333.txt"]);

        let mut renamers = stems(&["/tmp/a.txt"]);
        Transform::Fill {
            fill: "_".into(),
            width: Some(3),
            at_end: true,
        }
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["a__.txt"]);

        let err = Transform::Fill {
            fill: "ab".into(),
            width: None,
            at_end: false,
        }
        .apply_to_batch(&mut renamers)
        .expect_err("must fail");
        assert!(matches!(err, TransformError::FillChar(_)));
    }

    #[test]
    fn swap_moves_separator_by_side() {
        assert_eq!(swap("artist - title", " - ", None), "title - artist");
        assert_eq!(swap("a,b", ",", Some(SwapSide::Left)), "ba,");
        assert_eq!(swap("a,b", ",", Some(SwapSide::Right)), ",ba");
        assert_eq!(swap("ab", ",", None), "ab");
    }

    #[test]
    fn cut_and_keep_count_characters() {
        assert_eq!(cut("abcdef", 2, false), "cdef");
        assert_eq!(cut("abcdef", 2, true), "abcd");
        assert_eq!(cut("abcdef", 0, true), "abcdef");
        assert_eq!(cut("ab", 5, true), "");
        assert_eq!(keep("abcdef", 2, false), "ab");
        assert_eq!(keep("abcdef", 2, true), "ef");
        assert_eq!(keep("ab", 5, true), "ab");
    }

    #[test]
    fn dir_prefixes_selected_files_only() {
        let mut renamers = batch(
            &["/music/in/a.mp3", "/music/in/b.txt"],
            &SelectionOptions {
                text: TextOptions {
                    from: Some(".mp3".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        Transform::Dir {
            target: "../|e|".into(),
        }
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(renamers[0].destination(), PathBuf::from("/music/mp3/a.mp3"));
        assert_eq!(renamers[1].destination(), PathBuf::from("/music/in/b.txt"));
    }

    #[test]
    fn numbering_width_accounts_for_step() {
        let mut renamers = stems(&["/tmp/a.txt", "/tmp/b.txt", "/tmp/c.txt"]);
        Transform::Number(NumberingOptions {
            start: 35,
            step: 33,
            replace: true,
            ..Default::default()
        })
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["035.txt", "068.txt", "101.txt"]);
    }

    #[test]
    fn numbering_resets_per_directory() {
        let paths = ["/x/a/1.txt", "/x/a/2.txt", "/x/b/3.txt"];
        let mut renamers = stems(&paths);
        Transform::Number(NumberingOptions {
            before: "n".into(),
            after: "_".into(),
            ..Default::default()
        })
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["n1_1.txt", "n2_2.txt", "n1_3.txt"]);

        let mut renamers = stems(&paths);
        Transform::Number(NumberingOptions {
            reset_per_directory: false,
            at_end: true,
            width: Some(2),
            ..Default::default()
        })
        .apply_to_batch(&mut renamers)
        .expect("apply");
        assert_eq!(names(&renamers), vec!["101.txt", "202.txt", "303.txt"]);
    }

    #[test]
    fn numbering_width_fits_the_largest_directory() {
        let mut paths: Vec<String> = (0..10).map(|i| format!("/x/a/{i}.txt")).collect();
        paths.push("/x/b/z.txt".to_string());
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        let mut renamers = stems(&paths);
        Transform::Number(NumberingOptions {
            replace: true,
            ..Default::default()
        })
        .apply_to_batch(&mut renamers)
        .expect("apply");

        let names = names(&renamers);
        assert_eq!(names[0], "01.txt");
        assert_eq!(names[9], "10.txt");
        assert_eq!(names[10], "01.txt");
    }

    #[test]
    fn numbering_skips_files_without_selection() {
        let mut renamers = batch(
            &["/tmp/a-1.txt", "/tmp/b.txt", "/tmp/c-2.txt"],
            &SelectionOptions {
                text: TextOptions {
                    to_exclusive: Some("-".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        Transform::Number(NumberingOptions::default())
            .apply_to_batch(&mut renamers)
            .expect("apply");
        assert_eq!(names(&renamers), vec!["1a-1.txt", "b.txt", "2c-2.txt"]);
        assert_eq!(join_text(renamers[1].tokens()), "b.txt");
    }

    #[test]
    fn auto_width_handles_edges() {
        assert_eq!(auto_width(1, 1, 0), 1);
        assert_eq!(auto_width(1, 1, 9), 1);
        assert_eq!(auto_width(1, 1, 10), 2);
        assert_eq!(auto_width(10, -5, 3), 2);
        assert_eq!(format_number(-3, 3), "-03");
    }
}
