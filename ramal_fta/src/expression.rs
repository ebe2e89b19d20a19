//! Numeric expressions for event probabilities and model parameters.

use std::collections::HashMap;

use crate::error::FaultTreeError;
use crate::name::fold;

/// A numeric expression tree in the MEF subset the toolkit understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Float(f64),
    Bool(bool),
    /// Reference to a `define-parameter` by name.
    Param(String),
    Neg(Box<Expr>),
    Add(Vec<Expr>),
    Sub(Vec<Expr>),
    Mul(Vec<Expr>),
    Div(Vec<Expr>),
}

impl Expr {
    /// Evaluates the expression against the parameter table.
    /// Parameter references are resolved by their case-insensitive key.
    pub fn eval(&self, params: &HashMap<String, Expr>) -> Result<f64, FaultTreeError> {
        let mut seen = Vec::new();
        self.eval_inner(params, &mut seen)
    }

    fn eval_inner(
        &self,
        params: &HashMap<String, Expr>,
        seen: &mut Vec<String>,
    ) -> Result<f64, FaultTreeError> {
        match self {
            Expr::Float(v) => Ok(*v),
            Expr::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Expr::Param(name) => {
                let key = fold(name);
                if seen.contains(&key) {
                    return Err(FaultTreeError::ParameterCycle(name.clone()));
                }
                let target = params
                    .get(&key)
                    .ok_or_else(|| FaultTreeError::UnresolvedParameter(name.clone()))?;
                seen.push(key);
                let value = target.eval_inner(params, seen)?;
                seen.pop();
                Ok(value)
            }
            Expr::Neg(arg) => Ok(-arg.eval_inner(params, seen)?),
            Expr::Add(args) => fold_args(args, params, seen, |acc, v| acc + v),
            Expr::Sub(args) => fold_args(args, params, seen, |acc, v| acc - v),
            Expr::Mul(args) => fold_args(args, params, seen, |acc, v| acc * v),
            Expr::Div(args) => fold_args(args, params, seen, |acc, v| acc / v),
        }
    }

    /// The literal value, if the expression is a plain number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Expr::Float(v) => Some(*v),
            _ => None,
        }
    }
}

fn fold_args(
    args: &[Expr],
    params: &HashMap<String, Expr>,
    seen: &mut Vec<String>,
    op: impl Fn(f64, f64) -> f64,
) -> Result<f64, FaultTreeError> {
    let mut iter = args.iter();
    let mut acc = match iter.next() {
        Some(first) => first.eval_inner(params, seen)?,
        None => return Ok(0.0),
    };
    for arg in iter {
        acc = op(acc, arg.eval_inner(params, seen)?);
    }
    Ok(acc)
}

/// A named expression from `define-parameter`.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub expr: Expr,
}
