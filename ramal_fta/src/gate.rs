//! Gates and the Boolean formulas they carry.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use crate::event::{BasicEventId, HouseEventId, Node, UndefinedEventId};

index_vec::define_index_type! {
    pub struct GateId = usize;
}

/// Boolean operator of a gate or an inline formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Atleast,
    Not,
    Xor,
    Null,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Atleast => "atleast",
            Operator::Not => "not",
            Operator::Xor => "xor",
            Operator::Null => "null",
        }
    }

    /// The smallest legal argument count for the operator.
    pub fn min_args(&self) -> usize {
        match self {
            Operator::And | Operator::Or | Operator::Xor => 2,
            Operator::Atleast => 3,
            Operator::Not | Operator::Null => 1,
        }
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(input: &str) -> Result<Operator, Self::Err> {
        match input {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            "atleast" => Ok(Operator::Atleast),
            "not" => Ok(Operator::Not),
            "xor" => Ok(Operator::Xor),
            "null" => Ok(Operator::Null),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved argument of a formula: a typed reference into the
/// container arenas, or a nested anonymous formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Basic(BasicEventId),
    House(HouseEventId),
    Gate(GateId),
    Undefined(UndefinedEventId),
    Formula(Box<Formula>),
}

/// Operator, optional K for ATLEAST, and the ordered argument list.
/// A gate's own body and a nested anonymous formula share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub operator: Operator,
    pub k_num: Option<usize>,
    pub args: Vec<Arg>,
}

impl Formula {
    pub fn new(operator: Operator, k_num: Option<usize>) -> Self {
        Formula {
            operator,
            k_num,
            args: Vec::new(),
        }
    }

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    /// All gate references in the formula, including the ones inside
    /// nested formulas. Walks with an explicit stack; input nesting must
    /// not be able to exhaust the host stack.
    pub fn gate_args(&self) -> Vec<GateId> {
        let mut out = Vec::new();
        let mut pending = vec![self];
        while let Some(formula) = pending.pop() {
            for arg in &formula.args {
                match arg {
                    Arg::Gate(id) => out.push(*id),
                    Arg::Formula(nested) => pending.push(nested),
                    _ => {}
                }
            }
        }
        out
    }

    /// Direct gate references only, in argument order.
    pub fn direct_gate_args(&self) -> impl Iterator<Item = GateId> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Gate(id) => Some(*id),
            _ => None,
        })
    }

    pub fn basic_args(&self) -> impl Iterator<Item = BasicEventId> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Basic(id) => Some(*id),
            _ => None,
        })
    }

    pub fn house_args(&self) -> impl Iterator<Item = HouseEventId> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            Arg::House(id) => Some(*id),
            _ => None,
        })
    }

    pub fn undefined_args(&self) -> impl Iterator<Item = UndefinedEventId> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Undefined(id) => Some(*id),
            _ => None,
        })
    }

    pub fn formula_args(&self) -> impl Iterator<Item = &Formula> {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Formula(nested) => Some(nested.as_ref()),
            _ => None,
        })
    }
}

/// Parse-time argument: a name to be resolved later, or a nested formula.
/// Late binding permits forward references in the input.
#[derive(Debug, Clone)]
pub enum RawArg {
    Ref(String),
    Formula(Box<RawFormula>),
}

/// Unresolved counterpart of [`Formula`], produced by the parsers.
#[derive(Debug, Clone)]
pub struct RawFormula {
    pub operator: Operator,
    pub k_num: Option<usize>,
    pub args: Vec<RawArg>,
}

impl RawFormula {
    pub fn new(operator: Operator, k_num: Option<usize>) -> Self {
        RawFormula {
            operator,
            k_num,
            args: Vec::new(),
        }
    }

    /// Builds a flat formula from argument names. A leading `~` on a name
    /// denotes a complement and becomes a nested NOT formula.
    pub fn from_names(
        operator: Operator,
        arguments: Vec<String>,
        k_num: Option<usize>,
    ) -> Self {
        let mut formula = RawFormula::new(operator, k_num);
        for argument in arguments {
            if let Some(stripped) = argument.strip_prefix('~') {
                let mut complement = RawFormula::new(Operator::Not, None);
                complement.args.push(RawArg::Ref(stripped.to_owned()));
                formula.args.push(RawArg::Formula(Box::new(complement)));
            } else {
                formula.args.push(RawArg::Ref(argument));
            }
        }
        formula
    }
}

/// Traversal state of a gate. Every algorithm that marks gates resets
/// them to `Clear` on all of its exit paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    #[default]
    Clear,
    Temp,
    Perm,
}

/// An internal node combining arguments through a Boolean operator.
#[derive(Debug, Clone)]
pub struct Gate {
    pub name: String,
    pub formula: Formula,
    /// Argument names waiting for resolution; consumed by `populate`.
    pub(crate) raw: Option<RawFormula>,
    pub parents: Vec<GateId>,
    pub(crate) mark: Cell<Mark>,
}

impl Gate {
    pub fn new(name: impl Into<String>, raw: RawFormula) -> Self {
        let formula = Formula::new(raw.operator, raw.k_num);
        Gate {
            name: name.into(),
            formula,
            raw: Some(raw),
            parents: Vec::new(),
            mark: Cell::new(Mark::Clear),
        }
    }

    /// A gate constructed directly with typed arguments, no late binding.
    pub fn with_formula(name: impl Into<String>, formula: Formula) -> Self {
        Gate {
            name: name.into(),
            formula,
            raw: None,
            parents: Vec::new(),
            mark: Cell::new(Mark::Clear),
        }
    }

    pub fn operator(&self) -> Operator {
        self.formula.operator
    }

    pub fn num_arguments(&self) -> usize {
        match &self.raw {
            Some(raw) => raw.args.len(),
            None => self.formula.num_args(),
        }
    }

    pub(crate) fn mark(&self) -> Mark {
        self.mark.get()
    }

    pub(crate) fn set_mark(&self, mark: Mark) {
        self.mark.set(mark);
    }
}

impl Node for Gate {
    fn name(&self) -> &str {
        &self.name
    }

    fn parents(&self) -> &[GateId] {
        &self.parents
    }

    fn parents_mut(&mut self) -> &mut Vec<GateId> {
        &mut self.parents
    }
}
