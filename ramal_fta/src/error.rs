use std::fmt;

use thiserror::Error;

/// What went wrong while reading a shorthand line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    /// A token or formula that cannot be interpreted.
    Parsing,
    /// A structural problem: missing or duplicate fault tree name,
    /// mismatched parentheses.
    Format,
}

impl fmt::Display for ParseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseKind::Parsing => write!(f, "parsing"),
            ParseKind::Format => write!(f, "format"),
        }
    }
}

/// Shorthand input error with the offending line attached.
#[derive(Debug, Error)]
#[error("{kind} error in line {line}:\n{text}\n{message}")]
pub struct ParseError {
    pub kind: ParseKind,
    pub line: usize,
    pub text: String,
    pub message: String,
}

impl ParseError {
    pub fn parsing(line: usize, text: &str, message: impl Into<String>) -> Self {
        ParseError {
            kind: ParseKind::Parsing,
            line,
            text: text.to_owned(),
            message: message.into(),
        }
    }

    pub fn format(line: usize, text: &str, message: impl Into<String>) -> Self {
        ParseError {
            kind: ParseKind::Format,
            line,
            text: text.to_owned(),
            message: message.into(),
        }
    }
}

/// Semantic problems in the fault tree itself.
#[derive(Debug, Error)]
pub enum FaultTreeError {
    #[error("redefinition of a node: {0}")]
    Redefinition(String),
    #[error("repeated arguments: {0}")]
    RepeatedArguments(String),
    #[error("invalid k/n for the combination formula: {k}/{n}")]
    InvalidKofN { k: usize, n: usize },
    #[error("operator {operator} of gate {gate} cannot take {n} arguments")]
    InvalidArity {
        gate: String,
        operator: String,
        n: usize,
    },
    #[error("detected a cycle: {}", .0.join("->"))]
    Cycle(Vec<String>),
    #[error("detected detached gates that may be in a cycle: {}", detached_message(.names, .cycle))]
    DetachedGates {
        names: Vec<String>,
        cycle: Option<Vec<String>>,
    },
    #[error("no top gate is detected")]
    NoTopGate,
    #[error("detected multiple top gates: {}", .0.join(", "))]
    MultipleTopGates(Vec<String>),
    #[error("undefined reference: {0}")]
    UndefinedReference(String),
    #[error("reference to {0} is not an event or a gate")]
    InvalidReference(String),
    #[error("invalid probability {value} for {name}")]
    InvalidProbability { name: String, value: f64 },
    #[error("unresolved parameter: {0}")]
    UnresolvedParameter(String),
    #[error("cyclic parameter definition: {0}")]
    ParameterCycle(String),
    #[error("invalid CCF group {name}: {reason}")]
    CcfFactors { name: String, reason: String },
    #[error("gate {gate} cannot be written in the Aralia format: {reason}")]
    UnsupportedAralia { gate: String, reason: String },
}

fn detached_message(names: &[String], cycle: &Option<Vec<String>>) -> String {
    let mut out = names.join(", ");
    if let Some(path) = cycle {
        out.push_str("\ndetected a cycle: ");
        out.push_str(&path.join("->"));
    }
    out
}

/// Malformed Open-PSA MEF input.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml syntax error at byte {position}: {source}")]
    Syntax {
        position: usize,
        source: quick_xml::Error,
    },
    #[error("unexpected element <{element}> at byte {position}")]
    UnexpectedElement { element: String, position: usize },
    #[error("missing attribute {attribute} on <{element}>")]
    MissingAttribute { element: String, attribute: String },
    #[error("invalid value {value:?} for {what}")]
    InvalidValue { what: String, value: String },
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("unexpected end of document")]
    UnexpectedEof,
}

/// Any error the toolkit surfaces.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    FaultTree(#[from] FaultTreeError),
    #[error("fault tree error in line {line}:\n{text}\n{source}")]
    FaultTreeInLine {
        line: usize,
        text: String,
        source: FaultTreeError,
    },
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
