//! The Aralia output: the compact infix textual form of a fault tree.

use std::io::Write;

use itertools::Itertools;

use crate::error::{Error, FaultTreeError};
use crate::fault_tree::FaultTree;
use crate::gate::{Arg, GateId, Operator};

impl FaultTree {
    /// Streams the fault tree in the Aralia shorthand: the name, one
    /// line per gate in topological order, then probabilities and house
    /// states. Undefined and complement arguments have no spelling in
    /// this format and are reported as errors.
    pub fn to_aralia<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        let order = self.toposort();
        let mut lines = Vec::with_capacity(order.len());
        for gid in order {
            lines.push(format!(
                "{} := {}",
                self.gates[gid].name,
                self.format_gate(gid)?
            ));
        }

        writeln!(out, "{}", self.name)?;
        writeln!(out)?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;
        let table = self.parameter_table();
        for event in &self.basic_events {
            let value = event.prob.eval(&table)?;
            writeln!(out, "p({}) = {}", event.name, value)?;
        }
        for event in &self.house_events {
            writeln!(out, "s({}) = {}", event.name, event.state)?;
        }
        Ok(())
    }

    fn format_gate(&self, gid: GateId) -> Result<String, FaultTreeError> {
        let gate = &self.gates[gid];
        let names: Vec<&str> = gate
            .formula
            .args
            .iter()
            .map(|arg| self.argument_name(gid, arg))
            .try_collect()?;
        Ok(match gate.operator() {
            Operator::And => names.join(" & "),
            Operator::Or => names.join(" | "),
            Operator::Xor => names.join(" ^ "),
            Operator::Atleast => format!(
                "@({}, [{}])",
                gate.formula.k_num.unwrap_or_default(),
                names.join(", ")
            ),
            Operator::Not => format!("~{}", names.join("")),
            Operator::Null => names.join(""),
        })
    }

    fn argument_name(&self, gid: GateId, arg: &Arg) -> Result<&str, FaultTreeError> {
        match arg {
            Arg::Basic(id) => Ok(self.basic_events[*id].name.as_str()),
            Arg::House(id) => Ok(self.house_events[*id].name.as_str()),
            Arg::Gate(id) => Ok(self.gates[*id].name.as_str()),
            Arg::Undefined(_) => Err(FaultTreeError::UnsupportedAralia {
                gate: self.gates[gid].name.clone(),
                reason: "undefined argument".to_owned(),
            }),
            Arg::Formula(_) => Err(FaultTreeError::UnsupportedAralia {
                gate: self.gates[gid].name.clone(),
                reason: "complement or nested argument".to_owned(),
            }),
        }
    }
}
