//! The structured JSON report consumed by the quantification engine.

use itertools::Itertools;
use serde_json::{json, Value};

use crate::event::Node;
use crate::fault_tree::FaultTree;
use crate::gate::Operator;

/// Gathers size and complexity metrics of a populated fault tree.
pub fn json_report(fault_tree: &FaultTree) -> Value {
    let count_op = |operator: Operator| {
        fault_tree
            .gates
            .iter()
            .filter(|gate| gate.operator() == operator)
            .count()
    };
    let num_gates = fault_tree.gates.len();
    let num_basic = fault_tree.basic_events.len();

    let avg_args = if num_gates > 0 {
        fault_tree
            .gates
            .iter()
            .map(|gate| gate.formula.num_args())
            .sum::<usize>() as f64
            / num_gates as f64
    } else {
        0.0
    };

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

    json!({
        "name": fault_tree.name,
        "top_gates": fault_tree
            .top_gates
            .iter()
            .map(|&gid| fault_tree.gates[gid].name.clone())
            .collect_vec(),
        "num_basic_events": num_basic,
        "num_house_events": fault_tree.house_events.len(),
        "num_undefined_events": fault_tree.undefined_events.len(),
        "num_ccf_groups": fault_tree.ccf_groups.len(),
        "num_gates": num_gates,
        "gate_types": {
            "and": count_op(Operator::And),
            "or": count_op(Operator::Or),
            "atleast": count_op(Operator::Atleast),
            "not": count_op(Operator::Not),
            "xor": count_op(Operator::Xor),
            "null": count_op(Operator::Null),
        },
        "basic_to_gate_ratio": if num_gates > 0 {
            num_basic as f64 / num_gates as f64
        } else {
            0.0
        },
        "avg_gate_arguments": avg_args,
        "num_common_basic_events": shared_b.len(),
        "num_common_gates": shared_g.len(),
        "avg_parents_common_basic": average(shared_b.iter().map(|event| event.num_parents())),
        "avg_parents_common_gate": average(shared_g.iter().map(|gate| gate.num_parents())),
    })
}

fn average(counts: impl Iterator<Item = usize>) -> Value {
    let (sum, len) = counts.fold((0usize, 0usize), |(sum, len), count| {
        (sum + count, len + 1)
    });
    if len == 0 {
        Value::Null
    } else {
        json!(sum as f64 / len as f64)
    }
}
