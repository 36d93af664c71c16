use crate::renamer::Renamer;
use crate::selection::split_extension;
use crate::token::Token;
use crate::tokenizer::{tokenize, Segment, SyntaxError, DELIMITER};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("{}: cannot resolve placeholder {placeholder}", .path.display())]
    Unresolved { placeholder: String, path: PathBuf },
}

/// Placeholders every file can offer, with a short description.
pub const BUILTIN_PLACEHOLDERS: &[(&str, &str)] = &[
    ("|f|", "file name"),
    ("|b|", "file name without extension"),
    ("|e|", "extension without dot"),
    ("|s|", "selected text"),
    ("|f0|", "parent folder"),
    ("|f-1|", "grandparent folder"),
    ("|f-2|", "great-grandparent folder"),
    ("|f-3|", "great-great-grandparent folder"),
    ("|m|", "modification date (yyyy-mm-dd)"),
    ("|m:yyyy|", "modification year"),
    ("|m:mm|", "modification month"),
    ("|m:dd|", "modification day"),
    ("||", "literal |"),
];

pub const AUDIO_PLACEHOLDERS: &[(&str, &str)] = &[
    ("|artist|", "artist"),
    ("|album|", "album"),
    ("|track|", "track title"),
    ("|no|", "track number"),
];

/// Substitutes every placeholder in `text` for `token` of `renamer`.
pub fn resolve_text(text: &str, renamer: &Renamer, token: &Token) -> Result<String, ResolveError> {
    let mut out = String::with_capacity(text.len());
    for segment in tokenize(text, DELIMITER, true)? {
        match segment {
            Segment::Literal(literal) => out.push_str(&literal),
            Segment::Placeholder(placeholder) => {
                out.push_str(&resolve_placeholder(&placeholder, renamer, token)?)
            }
        }
    }
    Ok(out)
}

/// `placeholder` includes its delimiters, e.g. `|f0|`.
pub fn resolve_placeholder(
    placeholder: &str,
    renamer: &Renamer,
    token: &Token,
) -> Result<String, ResolveError> {
    lookup(placeholder, renamer, token).ok_or_else(|| ResolveError::Unresolved {
        placeholder: placeholder.to_string(),
        path: renamer.path().to_path_buf(),
    })
}

/// Like [`resolve_placeholder`], but hands the placeholder back when it cannot be resolved.
pub fn probe(placeholder: &str, renamer: &Renamer, token: &Token) -> String {
    lookup(placeholder, renamer, token).unwrap_or_else(|| placeholder.to_string())
}

/// Every placeholder applicable to `token`, paired with its probed value.
pub fn available_placeholders(renamer: &Renamer, token: &Token) -> Vec<(String, String)> {
    let mut names: Vec<String> = BUILTIN_PLACEHOLDERS
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    names.extend(token.bindings.keys().map(|k| format!("{DELIMITER}{k}{DELIMITER}")));
    if renamer.audio_tags().is_some() {
        names.extend(AUDIO_PLACEHOLDERS.iter().map(|(name, _)| name.to_string()));
    }
    names
        .into_iter()
        .map(|name| {
            let value = probe(&name, renamer, token);
            (name, value)
        })
        .collect()
}

fn lookup(placeholder: &str, renamer: &Renamer, token: &Token) -> Option<String> {
    let name = placeholder
        .strip_prefix(DELIMITER)
        .and_then(|p| p.strip_suffix(DELIMITER))
        .unwrap_or(placeholder);

    builtin(name, renamer, token)
        .or_else(|| token.bindings.get(name).cloned())
        .or_else(|| renamer.audio_tags().and_then(|tags| tags.field(name)))
}

fn builtin(name: &str, renamer: &Renamer, token: &Token) -> Option<String> {
    let (stem, ext) = split_extension(renamer.source_name());
    match name {
        "" => Some(DELIMITER.to_string()),
        "f" => Some(renamer.source_name().to_string()),
        "b" => Some(stem.to_string()),
        "e" => Some(ext.trim_start_matches('.').to_string()),
        "s" => Some(token.text.clone()),
        "f0" => ancestor_name(renamer.path(), 1),
        "f-1" => ancestor_name(renamer.path(), 2),
        "f-2" => ancestor_name(renamer.path(), 3),
        "f-3" => ancestor_name(renamer.path(), 4),
        "m" => renamer.modified().map(|m| m.format("%Y-%m-%d").to_string()),
        "m:yyyy" => renamer.modified().map(|m| m.format("%Y").to_string()),
        "m:mm" => renamer.modified().map(|m| m.format("%m").to_string()),
        "m:dd" => renamer.modified().map(|m| m.format("%d").to_string()),
        _ => None,
    }
}

fn ancestor_name(path: &Path, depth: usize) -> Option<String> {
    let ancestor = path.ancestors().nth(depth)?;
    Some(
        ancestor
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Bindings;
    use chrono::{TimeZone, Utc};
    use std::fs::File;
    use std::fs;

    fn renamer(path: &str) -> Renamer {
        let name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name")
            .to_string();
        Renamer::new(PathBuf::from(path), vec![Token::selected(name)]).expect("renamer")
    }

    #[test]
    fn resolves_name_parts_and_folders() {
        let r = renamer("/music/Stones/Beggars/01 intro.mp3");
        let token = Token::selected("intro");
        let resolved = resolve_text("|f-1| - |f0| - |b| (|e|) |s|", &r, &token).expect("resolve");
        assert_eq!(resolved, "Stones - Beggars - 01 intro (mp3) intro");
        assert_eq!(resolve_text("|f|", &r, &token).expect("resolve"), "01 intro.mp3");
        assert_eq!(resolve_text("|f-2|", &r, &token).expect("resolve"), "music");
    }

    #[test]
    fn escape_and_bindings() {
        let r = renamer("/tmp/a.txt");
        let mut bindings = Bindings::new();
        bindings.insert("Y".to_string(), "2018".to_string());
        let token = Token::selected("a").with_bindings(bindings);
        assert_eq!(
            resolve_text("x||y_|Y|", &r, &token).expect("resolve"),
            "x|y_2018"
        );
    }

    #[test]
    fn unknown_placeholder_fails_but_probe_echoes_it() {
        let r = renamer("/tmp/a.txt");
        let token = Token::selected("a");
        let err = resolve_text("|nope|", &r, &token).expect_err("must fail");
        assert!(matches!(err, ResolveError::Unresolved { ref placeholder, .. } if placeholder == "|nope|"));
        assert_eq!(probe("|nope|", &r, &token), "|nope|");
        assert_eq!(probe("|artist|", &r, &token), "|artist|");

        let err = resolve_text("|a", &r, &token).expect_err("must fail");
        assert!(matches!(err, ResolveError::Syntax(_)));
    }

    #[test]
    fn modification_date_is_read_in_utc() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a.txt");
        fs::write(&path, b"x").expect("write");
        let mtime = Utc
            .with_ymd_and_hms(2024, 1, 1, 23, 30, 0)
            .single()
            .expect("timestamp");
        File::options()
            .write(true)
            .open(&path)
            .expect("open")
            .set_modified(mtime.into())
            .expect("set mtime");

        let r = Renamer::new(path, vec![Token::selected("a.txt")]).expect("renamer");
        let token = Token::selected("a.txt");
        assert_eq!(r.modified(), Some(mtime));
        assert_eq!(resolve_text("|m|", &r, &token).expect("resolve"), "2024-01-01");
        assert_eq!(
            resolve_text("|m:yyyy|-|m:mm|-|m:dd|", &r, &token).expect("resolve"),
            "2024-01-01"
        );
    }

    #[test]
    fn available_placeholders_include_bindings() {
        let r = renamer("/tmp/dir/a.txt");
        let mut bindings = Bindings::new();
        bindings.insert("T".to_string(), "one".to_string());
        let token = Token::selected("a").with_bindings(bindings);
        let listed = available_placeholders(&r, &token);
        assert!(listed.contains(&("|f0|".to_string(), "dir".to_string())));
        assert!(listed.contains(&("|T|".to_string(), "one".to_string())));
        assert!(!listed.iter().any(|(name, _)| name == "|artist|"));
    }
}
