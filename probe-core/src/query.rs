//! Filter expressions for free-form artifact lookups.
//!
//! Accepted form: `[WHERE] column = value [AND column = value]...` with
//! integer columns `obj_id`, `artifact_id`, `artifact_type_id` and the quoted
//! string column `artifact_type_name`.

use std::str::FromStr;

use crate::domain::Artifact;
use crate::error::{ProbeError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactQuery {
    pub file_id: Option<u64>,
    pub artifact_id: Option<u64>,
    pub type_id: Option<i32>,
    pub type_name: Option<String>,
}

impl ArtifactQuery {
    pub fn for_file(file_id: u64) -> Self {
        Self {
            file_id: Some(file_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, a: &Artifact) -> bool {
        self.file_id.is_none_or(|id| a.file_id == id)
            && self.artifact_id.is_none_or(|id| a.artifact_id == id)
            && self.type_id.is_none_or(|id| a.type_id == id)
            && self.type_name.as_ref().is_none_or(|n| a.type_name == *n)
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Int(i64),
    Str(String),
    Eq,
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut it = s.chars().peekable();
    while let Some(&c) = it.peek() {
        if c.is_whitespace() {
            it.next();
        } else if c == '=' {
            it.next();
            out.push(Token::Eq);
        } else if c == '\'' {
            it.next();
            let mut lit = String::new();
            loop {
                match it.next() {
                    Some('\'') if it.peek() == Some(&'\'') => {
                        it.next();
                        lit.push('\'');
                    }
                    Some('\'') => break,
                    Some(ch) => lit.push(ch),
                    None => return Err(ProbeError::Query("unterminated string".into())),
                }
            }
            out.push(Token::Str(lit));
        } else if c.is_ascii_digit() || c == '-' {
            let mut num = String::new();
            num.push(c);
            it.next();
            while let Some(&d) = it.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                num.push(d);
                it.next();
            }
            let v = num
                .parse::<i64>()
                .map_err(|e| ProbeError::Query(format!("bad number {num:?}: {e}")))?;
            out.push(Token::Int(v));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(&d) = it.peek() {
                if !(d.is_ascii_alphanumeric() || d == '_') {
                    break;
                }
                word.push(d);
                it.next();
            }
            out.push(Token::Word(word.to_ascii_lowercase()));
        } else {
            return Err(ProbeError::Query(format!("unexpected character {c:?}")));
        }
    }
    Ok(out)
}

fn int_value<T: TryFrom<i64>>(column: &str, tok: Option<Token>) -> Result<T> {
    match tok {
        Some(Token::Int(v)) => T::try_from(v)
            .map_err(|_| ProbeError::Query(format!("{column} out of range: {v}"))),
        other => Err(ProbeError::Query(format!(
            "{column} expects an integer, got {other:?}"
        ))),
    }
}

impl FromStr for ArtifactQuery {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        let mut q = ArtifactQuery::default();
        let mut toks = tokenize(s)?.into_iter().peekable();
        if matches!(toks.peek(), Some(Token::Word(w)) if w == "where") {
            toks.next();
        }
        let mut first = true;
        while toks.peek().is_some() {
            if !first {
                match toks.next() {
                    Some(Token::Word(w)) if w == "and" => {}
                    other => {
                        return Err(ProbeError::Query(format!("expected AND, got {other:?}")));
                    }
                }
            }
            first = false;

            let column = match toks.next() {
                Some(Token::Word(w)) => w,
                other => return Err(ProbeError::Query(format!("expected column, got {other:?}"))),
            };
            if toks.next() != Some(Token::Eq) {
                return Err(ProbeError::Query(format!("expected '=' after {column}")));
            }
            match column.as_str() {
                "obj_id" => q.file_id = Some(int_value(&column, toks.next())?),
                "artifact_id" => q.artifact_id = Some(int_value(&column, toks.next())?),
                "artifact_type_id" => q.type_id = Some(int_value(&column, toks.next())?),
                "artifact_type_name" => match toks.next() {
                    Some(Token::Str(v)) => q.type_name = Some(v),
                    other => {
                        return Err(ProbeError::Query(format!(
                            "artifact_type_name expects a quoted string, got {other:?}"
                        )));
                    }
                },
                _ => return Err(ProbeError::Query(format!("unknown column {column}"))),
            }
        }
        Ok(q)
    }
}
