//! XML comment blocks describing the generation setup and the metrics
//! of the resulting tree.

use std::io::{self, Write};

use itertools::Itertools;
use ramal_fta::event::Node;
use ramal_fta::fault_tree::FaultTree;
use ramal_fta::gate::Operator;

use crate::factors::Factors;

/// Writes the setup of the generation as an XML comment.
pub fn write_info<W: Write>(
    out: &mut W,
    fault_tree: &FaultTree,
    factors: &Factors,
    seed: u64,
) -> io::Result<()> {
    let root_name = fault_tree
        .top_gate()
        .map(|gid| fault_tree.gates[gid].name.as_str())
        .unwrap_or_default();
    writeln!(out, "<!--")?;
    writeln!(
        out,
        "This is a description of the auto-generated fault tree\n\
         with the following parameters:\n"
    )?;
    writeln!(out, "The fault tree name: {}", fault_tree.name)?;
    writeln!(out, "The root gate name: {root_name}")?;
    writeln!(out)?;
    writeln!(out, "The seed of the random number generator: {seed}")?;
    writeln!(out, "The number of basic events: {}", factors.num_basic)?;
    writeln!(out, "The number of house events: {}", factors.num_house)?;
    writeln!(out, "The number of CCF groups: {}", factors.num_ccf)?;
    writeln!(
        out,
        "The average number of gate arguments: {}",
        factors.num_args
    )?;
    writeln!(
        out,
        "The weights of gate types [AND, OR, K/N, NOT, XOR]: {:?}",
        factors.gate_weights()
    )?;
    writeln!(
        out,
        "Percentage of common basic events per gate: {}",
        factors.common_b
    )?;
    writeln!(
        out,
        "Percentage of common gates per gate: {}",
        factors.common_g
    )?;
    writeln!(
        out,
        "The avg. number of parents for common basic events: {}",
        factors.parents_b
    )?;
    writeln!(
        out,
        "The avg. number of parents for common gates: {}",
        factors.parents_g
    )?;
    writeln!(out, "Maximum probability for basic events: {}", factors.max_prob)?;
    writeln!(out, "Minimum probability for basic events: {}", factors.min_prob)?;
    writeln!(out, "-->")
}

/// Writes the size and complexity metrics as an XML comment.
pub fn write_summary<W: Write>(out: &mut W, fault_tree: &FaultTree) -> io::Result<()> {
    writeln!(out, "<!--")?;
    writeln!(out, "The generated fault tree has the following metrics:\n")?;
    write_size_summary(out, fault_tree)?;
    write_complexity_summary(out, fault_tree)?;
    writeln!(out, "-->")?;
    writeln!(out)
}

fn write_size_summary<W: Write>(out: &mut W, fault_tree: &FaultTree) -> io::Result<()> {
    let count_op = |operator: Operator| {
        fault_tree
            .gates
            .iter()
            .filter(|gate| gate.operator() == operator)
            .count()
    };
    writeln!(
        out,
        "The number of basic events: {}",
        fault_tree.basic_events.len()
    )?;
    writeln!(
        out,
        "The number of house events: {}",
        fault_tree.house_events.len()
    )?;
    writeln!(
        out,
        "The number of CCF groups: {}",
        fault_tree.ccf_groups.len()
    )?;
    writeln!(out, "The number of gates: {}", fault_tree.gates.len())?;
    writeln!(out, "    AND gates: {}", count_op(Operator::And))?;
    writeln!(out, "    OR gates: {}", count_op(Operator::Or))?;
    writeln!(out, "    K/N gates: {}", count_op(Operator::Atleast))?;
    writeln!(out, "    NOT gates: {}", count_op(Operator::Not))?;
    writeln!(out, "    XOR gates: {}", count_op(Operator::Xor))
}

/// Fractions of basic-event arguments and of common arguments per gate,
/// averaged over the gates that have such arguments.
pub fn calculate_complexity_factors(fault_tree: &FaultTree) -> (f64, f64, f64) {
    let mut frac_b = 0.0;
    let mut common_b = 0.0;
    let mut common_g = 0.0;
    let mut gates_with_b = 0usize;
    let mut gates_with_g = 0usize;
    let mut gates_with_args = 0usize;
    for gate in &fault_tree.gates {
        let num_b = gate.formula.basic_args().count();
        let num_g = gate.formula.direct_gate_args().count();
        if num_b + num_g > 0 {
            frac_b += num_b as f64 / (num_b + num_g) as f64;
            gates_with_args += 1;
        }
        if num_b > 0 {
            let num_common = gate
                .formula
                .basic_args()
                .filter(|&id| fault_tree.basic_events[id].is_common())
                .count();
            common_b += num_common as f64 / num_b as f64;
            gates_with_b += 1;
        }
        if num_g > 0 {
            let num_common = gate
                .formula
                .direct_gate_args()
                .filter(|&id| fault_tree.gates[id].is_common())
                .count();
            common_g += num_common as f64 / num_g as f64;
            gates_with_g += 1;
        }
    }
    if gates_with_args > 0 {
        frac_b /= gates_with_args as f64;
    }
    if gates_with_b > 0 {
        common_b /= gates_with_b as f64;
    }
    if gates_with_g > 0 {
        common_g /= gates_with_g as f64;
    }
    (frac_b, common_b, common_g)
}

fn write_complexity_summary<W: Write>(out: &mut W, fault_tree: &FaultTree) -> io::Result<()> {
    let (frac_b, common_b, common_g) = calculate_complexity_factors(fault_tree);
    let num_gates = fault_tree.gates.len();
    let shared_b = fault_tree
        .basic_events
        .iter()
        .filter(|event| event.is_common())
        .collect_vec();
    let shared_g = fault_tree
        .gates
        .iter()
        .filter(|gate| gate.is_common())
        .collect_vec();
    writeln!(
        out,
        "Basic events to gates ratio: {:.6}",
        fault_tree.basic_events.len() as f64 / num_gates as f64
    )?;
    writeln!(
        out,
        "The average number of gate arguments: {:.6}",
        fault_tree
            .gates
            .iter()
            .map(|gate| gate.formula.num_args())
            .sum::<usize>() as f64
            / num_gates as f64
    )?;
    writeln!(out, "The number of common basic events: {}", shared_b.len())?;
    writeln!(out, "The number of common gates: {}", shared_g.len())?;
    writeln!(
        out,
        "Percentage of common basic events per gate: {common_b:.6}"
    )?;
    writeln!(out, "Percentage of common gates per gate: {common_g:.6}")?;
    writeln!(
        out,
        "Percentage of arguments that are basic events per gate: {frac_b:.6}"
    )?;
    if !shared_b.is_empty() {
        writeln!(
            out,
            "The avg. number of parents for common basic events: {:.6}",
            shared_b.iter().map(|event| event.num_parents()).sum::<usize>() as f64
                / shared_b.len() as f64
        )?;
    }
    if !shared_g.is_empty() {
        writeln!(
            out,
            "The avg. number of parents for common gates: {:.6}",
            shared_g.iter().map(|gate| gate.num_parents()).sum::<usize>() as f64
                / shared_g.len() as f64
        )?;
    }
    Ok(())
}
