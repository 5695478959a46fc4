//! DIMACS CNF text format.
//!
//! ```text
//! c comment
//! p cnf <variables> <clauses>
//! 1 -3 0
//! 2 3 -1 0
//! ```
//!
//! Clauses are whitespace-separated integer literals terminated by `0` and may
//! span several lines. A line starting with `%` ends the input (as in the
//! SATLIB benchmark files). Errors report the 1-based line and column of the
//! offending token.

use crate::cnf::Cnf;
use crate::error::{ParseError, ParseErrorKind};

/// Splits a line into tokens, each with its 1-based column.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut result = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in line.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                result.push((s, &line[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        result.push((s, &line[s..]));
    }
    result
        .into_iter()
        .map(|(s, tok)| (line[..s].chars().count() + 1, tok))
        .collect()
}

struct Header {
    num_vars: usize,
    num_clauses: usize,
    vars_at: (usize, usize),
    clauses_at: (usize, usize),
}

fn parse_count(token: &str, line: usize, column: usize) -> Result<usize, ParseError> {
    token.parse().map_err(|_| {
        ParseError::new(
            line,
            column,
            ParseErrorKind::InvalidToken {
                token: token.to_string(),
                expected: "a non-negative integer",
            },
        )
    })
}

fn parse_header(fields: &[(usize, &str)], line: usize) -> Result<Header, ParseError> {
    let (p_col, _) = fields[0];
    if fields.len() != 4 {
        return Err(ParseError::new(line, p_col, ParseErrorKind::MalformedProblemLine));
    }
    let (fmt_col, fmt) = fields[1];
    if fmt != "cnf" {
        return Err(ParseError::new(
            line,
            fmt_col,
            ParseErrorKind::InvalidToken {
                token: fmt.to_string(),
                expected: "`cnf`",
            },
        ));
    }
    let (vars_col, vars) = fields[2];
    let (clauses_col, clauses) = fields[3];
    Ok(Header {
        num_vars: parse_count(vars, line, vars_col)?,
        num_clauses: parse_count(clauses, line, clauses_col)?,
        vars_at: (line, vars_col),
        clauses_at: (line, clauses_col),
    })
}

/// Parses DIMACS CNF text.
pub fn parse(input: &str) -> Result<Cnf, ParseError> {
    let mut header: Option<Header> = None;
    let mut clauses: Vec<Vec<i32>> = Vec::new();
    let mut current: Vec<i32> = Vec::new();
    let mut max_var = 0usize;
    let mut last_token = (1, 1);

    for (i, line) in input.lines().enumerate() {
        let lineno = i + 1;
        let fields = tokens(line);
        let Some(&(col, first)) = fields.first() else {
            continue;
        };
        if first.starts_with('c') {
            continue;
        }
        if first.starts_with('%') {
            break;
        }
        if first == "p" {
            if header.is_some() {
                return Err(ParseError::new(lineno, col, ParseErrorKind::DuplicateProblemLine));
            }
            header = Some(parse_header(&fields, lineno)?);
            continue;
        }
        for &(col, token) in &fields {
            if header.is_none() {
                return Err(ParseError::new(lineno, col, ParseErrorKind::ClauseBeforeProblemLine));
            }
            let lit: i32 = token.parse().map_err(|_| {
                ParseError::new(
                    lineno,
                    col,
                    ParseErrorKind::InvalidToken {
                        token: token.to_string(),
                        expected: "an integer literal",
                    },
                )
            })?;
            last_token = (lineno, col);
            if lit == 0 {
                clauses.push(std::mem::take(&mut current));
            } else {
                max_var = max_var.max(lit.unsigned_abs() as usize);
                current.push(lit);
            }
        }
    }

    if !current.is_empty() {
        let (line, column) = last_token;
        return Err(ParseError::new(line, column, ParseErrorKind::UnterminatedClause));
    }
    let header = header.ok_or_else(|| ParseError::new(1, 1, ParseErrorKind::MissingProblemLine))?;
    if max_var > header.num_vars {
        let (line, column) = header.vars_at;
        return Err(ParseError::new(
            line,
            column,
            ParseErrorKind::VariableCountMismatch {
                declared: header.num_vars,
                used: max_var,
            },
        ));
    }
    if clauses.len() != header.num_clauses {
        let (line, column) = header.clauses_at;
        return Err(ParseError::new(
            line,
            column,
            ParseErrorKind::ClauseCountMismatch {
                declared: header.num_clauses,
                parsed: clauses.len(),
            },
        ));
    }
    Ok(Cnf::new(header.num_vars, clauses))
}
