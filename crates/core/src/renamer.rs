use crate::audio::{is_audio_file, read_audio_tags, AudioTags};
use crate::selection::SelectionError;
use crate::token::{join_text, Token};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::OnceCell;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// One file of a batch together with the token sequence describing its name.
#[derive(Debug, Serialize)]
pub struct Renamer {
    path: PathBuf,
    source_name: String,
    tokens: Vec<Token>,
    #[serde(skip)]
    committed: bool,
    #[serde(skip)]
    audio: OnceCell<Option<AudioTags>>,
    #[serde(skip)]
    modified: OnceCell<Option<DateTime<Utc>>>,
}

impl Renamer {
    /// `path` must be absolute; `tokens` must add up to its file name.
    pub fn new(path: PathBuf, tokens: Vec<Token>) -> Result<Self, SelectionError> {
        let joined = join_text(&tokens);
        let source_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        match source_name {
            Some(name) if name == joined => Ok(Self {
                path,
                source_name: name,
                tokens,
                committed: false,
                audio: OnceCell::new(),
                modified: OnceCell::new(),
            }),
            _ => Err(SelectionError::NameMismatch {
                path,
                tokens: joined,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn has_selection(&self) -> bool {
        self.tokens.iter().any(|t| t.selected)
    }

    pub fn first_selected(&self) -> Option<&Token> {
        self.tokens.iter().find(|t| t.selected)
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub fn new_name(&self) -> String {
        join_text(&self.tokens)
    }

    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Target path; the new name may move the file into another directory.
    pub fn destination(&self) -> PathBuf {
        normalize_path(&self.parent().join(self.new_name()))
    }

    /// Modification time in UTC.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        *self.modified.get_or_init(|| {
            let time = fs::metadata(&self.path).ok()?.modified().ok()?;
            Some(DateTime::from(time))
        })
    }

    /// Tags of a supported audio file; `None` for other files or unreadable tags.
    pub fn audio_tags(&self) -> Option<&AudioTags> {
        self.audio
            .get_or_init(|| {
                if !is_audio_file(&self.path) {
                    return None;
                }
                match read_audio_tags(&self.path) {
                    Ok(tags) => Some(tags),
                    Err(err) => {
                        warn!("{err:#}");
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Resolves `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_tokens_that_do_not_spell_the_name() {
        let err = Renamer::new(
            PathBuf::from("/tmp/a.txt"),
            vec![Token::selected("b.txt")],
        )
        .expect_err("must fail");
        assert!(matches!(err, SelectionError::NameMismatch { .. }));
    }

    #[test]
    fn destination_follows_token_text() {
        let mut renamer = Renamer::new(
            PathBuf::from("/music/in/a.txt"),
            vec![Token::selected("a"), Token::unselected(".txt")],
        )
        .expect("renamer");
        assert_eq!(renamer.destination(), PathBuf::from("/music/in/a.txt"));

        renamer.tokens_mut()[0].prepend("../out/");
        assert_eq!(renamer.new_name(), "../out/a.txt");
        assert_eq!(renamer.destination(), PathBuf::from("/music/out/a.txt"));
        assert!(!renamer.is_committed());
    }

    #[test]
    fn non_audio_files_have_no_tags() {
        let renamer =
            Renamer::new(PathBuf::from("/tmp/a.txt"), vec![Token::selected("a.txt")])
                .expect("renamer");
        assert!(renamer.audio_tags().is_none());
        assert!(renamer.first_selected().is_some());
    }

    #[test]
    fn normalize_path_is_lexical() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("../x/./y")), PathBuf::from("../x/y"));
    }
}
