//! Line-oriented parser for the shorthand fault tree notation.
//!
//! Each statement occupies one line: the fault tree name, a gate
//! definition `name := formula`, a probability `p(name) = number` or a
//! house state `s(name) = true|false`. Whitespace is insignificant
//! except for separating tokens, and names are case-insensitive.
//! A formula mixes no infix operators: `a | b & c` is a parsing error;
//! parentheses are only recognized around a whole formula.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, FaultTreeError, ParseError};
use crate::fault_tree::FaultTree;
use crate::gate::{Operator, RawFormula};
use crate::name::fold;

const NAME: &str = r"[A-Za-z]\w*(?:-\w+)*";

struct Patterns {
    ft_name: Regex,
    prob: Regex,
    state: Regex,
    gate: Regex,
    or: Regex,
    xor: Regex,
    and: Regex,
    vote: Regex,
    not: Regex,
    null: Regex,
}

impl Patterns {
    fn compile() -> Self {
        let literal = format!(r"~?\s*{NAME}");
        Patterns {
            ft_name: Regex::new(&format!(r"^({NAME})$")).unwrap(),
            prob: Regex::new(&format!(r"^p\(\s*({NAME})\s*\)\s*=\s*(\S+)$")).unwrap(),
            state: Regex::new(&format!(r"^s\(\s*({NAME})\s*\)\s*=\s*(true|false)$")).unwrap(),
            gate: Regex::new(&format!(r"^({NAME})\s*:=\s*(.+)$")).unwrap(),
            or: Regex::new(&format!(r"^({literal}(?:\s*\|\s*{literal})+)$")).unwrap(),
            xor: Regex::new(&format!(r"^({literal}\s*\^\s*{literal})$")).unwrap(),
            and: Regex::new(&format!(r"^({literal}(?:\s*&\s*{literal})+)$")).unwrap(),
            vote: Regex::new(&format!(
                r"^@\(\s*(\d+)\s*,\s*\[(\s*{literal}(?:\s*,\s*{literal}\s*){{2,}})\]\s*\)$"
            ))
            .unwrap(),
            not: Regex::new(&format!(r"^~\s*({NAME})$")).unwrap(),
            null: Regex::new(&format!(r"^({NAME})$")).unwrap(),
        }
    }
}

/// Parses a shorthand description into a populated fault tree.
pub fn parse_str(text: &str, multi_top: bool) -> Result<FaultTree, Error> {
    let patterns = Patterns::compile();
    let mut fault_tree = FaultTree::new("");
    let mut ft_name: Option<String> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_num = index + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = patterns.gate.captures(line) {
            let gate_name = caps.get(1).expect("gate name group").as_str();
            let formula_text = caps.get(2).expect("formula group").as_str().trim();
            let raw = get_formula(&patterns, formula_text, line_num, line)?;
            fault_tree
                .add_gate_raw(gate_name, raw)
                .map_err(|source| locate(line_num, line, source))?;
        } else if let Some(caps) = patterns.prob.captures(line) {
            let event_name = caps.get(1).expect("event name group").as_str();
            let number = caps.get(2).expect("probability group").as_str();
            let prob: f64 = number.parse().map_err(|_| {
                ParseError::parsing(line_num, line, format!("cannot read the number: {number}"))
            })?;
            fault_tree
                .add_basic_event(event_name, crate::expression::Expr::Float(prob))
                .map_err(|source| locate(line_num, line, source))?;
        } else if let Some(caps) = patterns.state.captures(line) {
            let event_name = caps.get(1).expect("event name group").as_str();
            let state = caps.get(2).expect("state group").as_str() == "true";
            fault_tree
                .add_house_event(event_name, state)
                .map_err(|source| locate(line_num, line, source))?;
        } else if let Some(caps) = patterns.ft_name.captures(line) {
            let name = caps.get(1).expect("name group").as_str();
            if let Some(existing) = &ft_name {
                return Err(ParseError::format(
                    line_num,
                    line,
                    format!("redefinition of the fault tree name: {existing} to {name}"),
                )
                .into());
            }
            ft_name = Some(name.to_owned());
        } else {
            return Err(ParseError::parsing(line_num, line, "cannot interpret the line").into());
        }
    }

    let name = ft_name
        .ok_or_else(|| ParseError::format(0, "", "the fault tree name is not given"))?;
    fault_tree.name = name;
    fault_tree.multi_top = multi_top;
    fault_tree.populate(false)?;
    Ok(fault_tree)
}

/// Parses a shorthand file; errors carry the 1-based line number.
pub fn parse_file(path: impl AsRef<Path>, multi_top: bool) -> Result<FaultTree, Error> {
    let text = fs::read_to_string(path)?;
    parse_str(&text, multi_top)
}

fn locate(line: usize, text: &str, source: FaultTreeError) -> Error {
    Error::FaultTreeInLine {
        line,
        text: text.to_owned(),
        source,
    }
}

/// Interprets one formula. Exactly one operator kind per line; the only
/// recognized parentheses wrap the whole formula.
fn get_formula(
    patterns: &Patterns,
    text: &str,
    line_num: usize,
    line: &str,
) -> Result<RawFormula, Error> {
    if text.matches('(').count() != text.matches(')').count() {
        return Err(ParseError::format(line_num, line, "mismatched parentheses").into());
    }
    let mut formula_text = text;
    while let Some(inner) = strip_outer_parens(formula_text) {
        formula_text = inner.trim();
    }

    if let Some(caps) = patterns.or.captures(formula_text) {
        let arguments = get_arguments(&caps[1], '|', line_num, line)?;
        Ok(RawFormula::from_names(Operator::Or, arguments, None))
    } else if let Some(caps) = patterns.xor.captures(formula_text) {
        let arguments = get_arguments(&caps[1], '^', line_num, line)?;
        Ok(RawFormula::from_names(Operator::Xor, arguments, None))
    } else if let Some(caps) = patterns.and.captures(formula_text) {
        let arguments = get_arguments(&caps[1], '&', line_num, line)?;
        Ok(RawFormula::from_names(Operator::And, arguments, None))
    } else if let Some(caps) = patterns.vote.captures(formula_text) {
        let k_num: usize = caps[1].parse().map_err(|_| {
            ParseError::parsing(line_num, line, "cannot read the combination minimum")
        })?;
        let arguments = get_arguments(&caps[2], ',', line_num, line)?;
        if k_num < 2 || k_num >= arguments.len() {
            return Err(locate(
                line_num,
                line,
                FaultTreeError::InvalidKofN {
                    k: k_num,
                    n: arguments.len(),
                },
            ));
        }
        Ok(RawFormula::from_names(
            Operator::Atleast,
            arguments,
            Some(k_num),
        ))
    } else if let Some(caps) = patterns.not.captures(formula_text) {
        Ok(RawFormula::from_names(
            Operator::Not,
            vec![caps[1].to_owned()],
            None,
        ))
    } else if let Some(caps) = patterns.null.captures(formula_text) {
        Ok(RawFormula::from_names(
            Operator::Null,
            vec![caps[1].to_owned()],
            None,
        ))
    } else {
        Err(ParseError::parsing(line_num, line, "cannot interpret the formula").into())
    }
}

/// The inner text when the whole formula is wrapped in one pair of
/// parentheses.
fn strip_outer_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') || !text.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    for (offset, character) in text.char_indices() {
        match character {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return (offset == text.len() - 1).then(|| &text[1..text.len() - 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits formula arguments and rejects case-insensitive repetition.
fn get_arguments(
    text: &str,
    splitter: char,
    line_num: usize,
    line: &str,
) -> Result<Vec<String>, Error> {
    let arguments: Vec<String> = text
        .split(splitter)
        .map(|argument| argument.split_whitespace().collect::<Vec<_>>().join(""))
        .collect();
    let mut seen = Vec::new();
    for argument in &arguments {
        let key = fold(argument);
        if seen.contains(&key) {
            return Err(locate(
                line_num,
                line,
                FaultTreeError::RepeatedArguments(text.trim().to_owned()),
            ));
        }
        seen.push(key);
    }
    Ok(arguments)
}
