use serde::Serialize;
use std::collections::BTreeMap;

/// Named captures produced by a selection pattern, keyed by placeholder name.
pub type Bindings = BTreeMap<String, String>;

/// A contiguous span of a file name.
///
/// Concatenating the `text` of every token of a file yields the file name
/// before a transform runs and the new file name after it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    pub selected: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: Bindings,
}

impl Token {
    pub fn new(text: impl Into<String>, selected: bool) -> Self {
        Self {
            text: text.into(),
            selected,
            bindings: Bindings::new(),
        }
    }

    pub fn selected(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    pub fn unselected(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn prepend(&mut self, value: &str) {
        self.text.insert_str(0, value);
    }

    pub fn append(&mut self, value: &str) {
        self.text.push_str(value);
    }
}

pub fn join_text(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_reconstructs_name() {
        let tokens = vec![
            Token::unselected("IMG_"),
            Token::selected("2020"),
            Token::unselected(".jpg"),
        ];
        assert_eq!(join_text(&tokens), "IMG_2020.jpg");
    }

    #[test]
    fn prepend_and_append_edit_in_place() {
        let mut token = Token::selected("cd");
        token.prepend("AB");
        token.append("!");
        assert_eq!(token.text, "ABcd!");
        assert!(token.bindings.is_empty());
    }
}
