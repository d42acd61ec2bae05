//! Formula tokenizer

use crate::error::{CalcError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// Function names, constants and the word operators
    Ident(String),
    /// `$name` or `$name.property`
    Variable {
        name: String,
        property: Option<String>,
    },
    Op(&'static str),
    LParen,
    RParen,
}

/// Token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

const OPERATORS: [&str; 13] = [
    "==", "!=", ">=", "<=", "<<", ">>", ">", "<", "+", "-", "*", "/", "^",
];

pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i + 1)) {
            let (number, end) = scan_number(source, &chars, i)?;
            i = end;
            Token::Number(number)
        } else if c == '$' {
            let (name, end) = scan_name(&chars, i + 1);
            if name.is_empty() {
                return Err(CalcError::syntax(position, "expected variable name after '$'"));
            }
            i = end;
            let property = if chars.get(i).map(|(_, c)| *c) == Some('.') {
                let (property, end) = scan_name(&chars, i + 1);
                if property.is_empty() {
                    return Err(CalcError::syntax(position, "expected property after '.'"));
                }
                i = end;
                Some(property)
            } else {
                None
            };
            Token::Variable { name, property }
        } else if c.is_alphabetic() || c == '_' {
            let (ident, end) = scan_name(&chars, i);
            i = end;
            Token::Ident(ident)
        } else if c == '(' {
            i += 1;
            Token::LParen
        } else if c == ')' {
            i += 1;
            Token::RParen
        } else {
            let rest = &source[position..];
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(*op))
                .ok_or_else(|| CalcError::syntax(position, format!("unexpected '{}'", c)))?;
            i += op.len();
            Token::Op(op)
        };
        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

fn next_is_digit(chars: &[(usize, char)], i: usize) -> bool {
    chars.get(i).is_some_and(|(_, c)| c.is_ascii_digit())
}

fn scan_name(chars: &[(usize, char)], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && (chars[end].1.is_alphanumeric() || chars[end].1 == '_') {
        end += 1;
    }
    (chars[start..end].iter().map(|(_, c)| *c).collect(), end)
}

/// digits [. digits] [(e|E) [+|-] digits]
fn scan_number(source: &str, chars: &[(usize, char)], start: usize) -> Result<(f64, usize)> {
    let mut end = start;
    while end < chars.len() && chars[end].1.is_ascii_digit() {
        end += 1;
    }
    if end < chars.len() && chars[end].1 == '.' {
        end += 1;
        while end < chars.len() && chars[end].1.is_ascii_digit() {
            end += 1;
        }
    }
    if end < chars.len() && matches!(chars[end].1, 'e' | 'E') {
        let sign = usize::from(matches!(chars.get(end + 1), Some((_, '+' | '-'))));
        if next_is_digit(chars, end + 1 + sign) {
            end += 1 + sign;
            while end < chars.len() && chars[end].1.is_ascii_digit() {
                end += 1;
            }
        }
    }

    let from = chars[start].0;
    let to = chars.get(end).map_or(source.len(), |(p, _)| *p);
    let text = &source[from..to];
    text.parse()
        .map(|n| (n, end))
        .map_err(|_| CalcError::syntax(from, format!("invalid number '{}'", text)))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_variables_and_properties() {
        assert_eq!(
            kinds("$TEMP_1.old_value+$P"),
            vec![
                Token::Variable {
                    name: "TEMP_1".into(),
                    property: Some("old_value".into())
                },
                Token::Op("+"),
                Token::Variable {
                    name: "P".into(),
                    property: None
                },
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1.5e3 .5 2E"),
            vec![
                Token::Number(1500.0),
                Token::Number(0.5),
                Token::Number(2.0),
                Token::Ident("E".into())
            ]
        );
    }

    #[test]
    fn test_two_char_operators_win() {
        assert_eq!(
            kinds("1<<2>=3"),
            vec![
                Token::Number(1.0),
                Token::Op("<<"),
                Token::Number(2.0),
                Token::Op(">="),
                Token::Number(3.0)
            ]
        );
    }

    #[test]
    fn test_rejects_stray_characters() {
        assert!(matches!(
            tokenize("1 # 2"),
            Err(CalcError::Syntax { position: 2, .. })
        ));
        assert!(tokenize("$").is_err());
    }
}
