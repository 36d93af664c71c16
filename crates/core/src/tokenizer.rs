use thiserror::Error;

/// Delimiter shared by selection patterns and replacement texts.
pub const DELIMITER: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Literal(text) | Segment::Placeholder(text) => text,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Segment::Placeholder(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("syntax error: unbalanced '{delimiter}' in \"{input}\"")]
    Unbalanced { input: String, delimiter: char },
}

/// Splits `input` into literal and placeholder segments.
///
/// Placeholders are enclosed by `delimiter`; a doubled delimiter is an empty
/// placeholder, which callers treat as an escaped delimiter character:
///
/// - `"a|b"` fails (odd delimiter count)
/// - `"ab|c|"` yields `ab` + `c`
/// - `"ab||c"` yields `ab` + `` + `c`
///
/// With `keep_delimiters` the placeholder text retains its enclosing delimiters
/// (`|c|`, `||`), which is what inline resolution of free text wants.
pub fn tokenize(
    input: &str,
    delimiter: char,
    keep_delimiters: bool,
) -> Result<Vec<Segment>, SyntaxError> {
    if input.matches(delimiter).count() % 2 == 1 {
        return Err(SyntaxError::Unbalanced {
            input: input.to_string(),
            delimiter,
        });
    }

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut placeholder: Option<String> = None;

    for ch in input.chars() {
        if ch == delimiter {
            match placeholder.take() {
                Some(name) => segments.push(Segment::Placeholder(name)),
                None => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    placeholder = Some(String::new());
                }
            }
        } else if let Some(name) = placeholder.as_mut() {
            name.push(ch);
        } else {
            literal.push(ch);
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    if keep_delimiters {
        for segment in &mut segments {
            if let Segment::Placeholder(name) = segment {
                *name = format!("{delimiter}{name}{delimiter}");
            }
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.to_string())
    }

    fn ph(s: &str) -> Segment {
        Segment::Placeholder(s.to_string())
    }

    #[test]
    fn odd_delimiter_count_is_a_syntax_error() {
        let err = tokenize("a|b", '|', false).expect_err("must fail");
        assert!(matches!(err, SyntaxError::Unbalanced { .. }));

        let err = tokenize("|b||", '|', true).expect_err("must fail");
        assert!(matches!(err, SyntaxError::Unbalanced { .. }));
    }

    #[test]
    fn splits_literals_and_placeholders() {
        let segments = tokenize("ab|c|", '|', false).expect("must parse");
        assert_eq!(segments, vec![lit("ab"), ph("c")]);

        let segments = tokenize("IMG_|Y:4||M:2| - |T|", '|', false).expect("must parse");
        assert_eq!(
            segments,
            vec![lit("IMG_"), ph("Y:4"), ph("M:2"), lit(" - "), ph("T")]
        );
    }

    #[test]
    fn doubled_delimiter_is_an_empty_placeholder() {
        let segments = tokenize("ab||c", '|', false).expect("must parse");
        assert_eq!(segments, vec![lit("ab"), ph(""), lit("c")]);

        let segments = tokenize("|1||||2|", '|', false).expect("must parse");
        assert_eq!(segments, vec![ph("1"), ph(""), ph("2")]);
    }

    #[test]
    fn keeps_delimiters_on_request() {
        let segments = tokenize("x|b|_||", '|', true).expect("must parse");
        assert_eq!(segments, vec![lit("x"), ph("|b|"), lit("_"), ph("||")]);
        assert!(segments[1].is_placeholder());
        assert_eq!(segments[2].text(), "_");
    }

    #[test]
    fn input_without_delimiters_is_one_literal() {
        assert_eq!(
            tokenize("plain.txt", '|', false).expect("must parse"),
            vec![lit("plain.txt")]
        );
        assert!(tokenize("", '|', false).expect("must parse").is_empty());
    }
}
