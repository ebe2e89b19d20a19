//! Breadth-first constrained growth of random fault trees.
//!
//! The tree starts at the top gate and grows through a work queue.
//! Every argument slot draws gate-vs-basic and fresh-vs-common in a
//! fixed order, so a seed fully determines the result.

use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use ramal_fta::error::FaultTreeError;
use ramal_fta::event::{BasicEventId, CcfModel, HouseEventId, Node};
use ramal_fta::expression::Expr;
use ramal_fta::fault_tree::FaultTree;
use ramal_fta::gate::{Arg, GateId, Operator};
use tracing::warn;

use crate::factors::Factors;

/// Generates a fault tree whose shape follows the configured factors.
/// The result has exactly `num_basic` basic events, a single root, and
/// no cycles; gate count approximates the derived estimate.
pub fn generate_fault_tree(
    factors: &Factors,
    ft_name: &str,
    root_name: &str,
    rng: &mut StdRng,
) -> Result<FaultTree, FaultTreeError> {
    let mut fault_tree = FaultTree::new(ft_name);
    construct_top_gate(&mut fault_tree, factors, root_name, rng)?;

    let num_gate = factors.expected_num_gate();
    let common_basics: Vec<BasicEventId> = (0..factors.num_common_basics(num_gate))
        .map(|_| construct_basic_event(&mut fault_tree, factors, rng))
        .collect::<Result<_, _>>()?;
    let common_gates: Vec<GateId> = (0..factors.num_common_gates(num_gate))
        .map(|_| construct_gate(&mut fault_tree, factors, rng))
        .collect::<Result<_, _>>()?;

    let mut gates_queue = VecDeque::new();
    gates_queue.push_back(fault_tree.top_gates[0]);
    drain_queue(
        &mut fault_tree,
        factors,
        &mut gates_queue,
        &common_basics,
        &common_gates,
        rng,
    )?;

    // Pool members that never got picked would be left as detached
    // orphans; attach them the way the exhaustion correction does.
    let unused: Vec<GateId> = common_gates
        .iter()
        .copied()
        .filter(|&gid| fault_tree.gates[gid].is_orphan())
        .collect();
    for gate in unused {
        let candidates: Vec<GateId> = fault_tree
            .gates
            .indices()
            .filter(|&gid| {
                let operator = fault_tree.gates[gid].operator();
                operator != Operator::Not
                    && operator != Operator::Xor
                    && !common_gates.contains(&gid)
            })
            .collect();
        let &target = candidates
            .choose(rng)
            .expect("the top gate can always take another argument");
        fault_tree.add_gate_argument(target, Arg::Gate(gate));
        gates_queue.push_back(gate);
    }
    drain_queue(
        &mut fault_tree,
        factors,
        &mut gates_queue,
        &common_basics,
        &common_gates,
        rng,
    )?;

    debug_assert!(fault_tree
        .basic_events
        .iter()
        .all(|event| !event.is_orphan()));

    distribute_house_events(&mut fault_tree, factors, rng)?;
    generate_ccf_groups(&mut fault_tree, factors, rng)?;
    Ok(fault_tree)
}

fn drain_queue(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    gates_queue: &mut VecDeque<GateId>,
    common_basics: &[BasicEventId],
    common_gates: &[GateId],
    rng: &mut StdRng,
) -> Result<(), FaultTreeError> {
    while let Some(gate) = gates_queue.pop_front() {
        init_gate(
            fault_tree,
            factors,
            gate,
            gates_queue,
            common_basics,
            common_gates,
            rng,
        )?;
    }
    Ok(())
}

/// The root must not be degenerate, so XOR and NOT are rejected.
fn construct_top_gate(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    root_name: &str,
    rng: &mut StdRng,
) -> Result<(), FaultTreeError> {
    let mut operator = factors.random_operator(rng);
    while operator == Operator::Xor || operator == Operator::Not {
        operator = factors.random_operator(rng);
    }
    let top = fault_tree.new_gate(root_name, operator, None)?;
    fault_tree.top_gates = vec![top];
    Ok(())
}

fn construct_gate(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    rng: &mut StdRng,
) -> Result<GateId, FaultTreeError> {
    let name = format!("G{}", fault_tree.gates.len() + 1);
    fault_tree.new_gate(&name, factors.random_operator(rng), None)
}

fn construct_basic_event(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    rng: &mut StdRng,
) -> Result<BasicEventId, FaultTreeError> {
    let name = format!("B{}", fault_tree.basic_events.len() + 1);
    let prob = rng.gen_range(factors.min_prob..=factors.max_prob);
    fault_tree.add_basic_event(&name, Expr::Float(prob))
}

fn construct_house_event(
    fault_tree: &mut FaultTree,
    rng: &mut StdRng,
) -> Result<HouseEventId, FaultTreeError> {
    let name = format!("H{}", fault_tree.house_events.len() + 1);
    fault_tree.add_house_event(&name, rng.gen_bool(0.5))
}

/// Initializes one gate from the queue: samples the argument count,
/// then fills every slot with a fresh or common gate or basic event.
#[allow(clippy::too_many_arguments)]
fn init_gate(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    gate: GateId,
    gates_queue: &mut VecDeque<GateId>,
    common_basics: &[BasicEventId],
    common_gates: &[GateId],
    rng: &mut StdRng,
) -> Result<(), FaultTreeError> {
    let (num_arguments, k_num) =
        factors.sample_num_args(fault_tree.gates[gate].operator(), rng);
    if k_num.is_some() {
        fault_tree.gates[gate].formula.k_num = k_num;
    }

    // Ancestors are computed lazily, once per gate under construction.
    let mut ancestors: Option<HashSet<GateId>> = None;
    let max_tries = common_gates.len();
    let mut num_trials = 0usize;

    while fault_tree.gates[gate].formula.num_args() < num_arguments {
        let s_percent: f64 = rng.gen();
        let mut s_common: f64 = rng.gen();
        if fault_tree.basic_events.len() == factors.num_basic {
            s_common = 0.0; // only common nodes from here on
        }

        if s_percent < factors.percent_gate() {
            if s_common < factors.common_g && num_trials < max_tries {
                if ancestors.is_none() {
                    ancestors = Some(fault_tree.gate_ancestors(gate));
                }
                let ancestors = ancestors.as_ref().expect("ancestors are computed");
                for candidate in candidate_gates(fault_tree, common_gates, rng) {
                    num_trials += 1;
                    if num_trials >= max_tries {
                        break;
                    }
                    let repeated = candidate == gate
                        || fault_tree.gates[gate]
                            .formula
                            .direct_gate_args()
                            .any(|existing| existing == candidate);
                    if repeated {
                        continue;
                    }
                    // A candidate without gate arguments cannot reach
                    // back; otherwise it must not be an ancestor.
                    if fault_tree.gates[candidate].formula.gate_args().is_empty()
                        || !ancestors.contains(&candidate)
                    {
                        if fault_tree.gates[candidate].is_orphan() {
                            gates_queue.push_back(candidate);
                        }
                        fault_tree.add_gate_argument(gate, Arg::Gate(candidate));
                        break;
                    }
                }
            } else {
                let new_gate = construct_gate(fault_tree, factors, rng)?;
                fault_tree.add_gate_argument(gate, Arg::Gate(new_gate));
                gates_queue.push_back(new_gate);
            }
        } else {
            match choose_basic_event(fault_tree, factors, gate, s_common, common_basics, rng)? {
                Some(event) => fault_tree.add_gate_argument(gate, Arg::Basic(event)),
                None => break, // no distinct basic event remains for this gate
            }
        }
    }

    correct_for_exhaustion(fault_tree, factors, gates_queue, common_gates, rng)
}

/// Candidates for common gates: orphans first, then single-parent, then
/// multi-parent, each bucket shuffled.
fn candidate_gates(
    fault_tree: &FaultTree,
    common_gates: &[GateId],
    rng: &mut StdRng,
) -> Vec<GateId> {
    let mut bucket = |predicate: &dyn Fn(usize) -> bool| {
        let mut gates: Vec<GateId> = common_gates
            .iter()
            .copied()
            .filter(|&gid| predicate(fault_tree.gates[gid].num_parents()))
            .collect();
        gates.shuffle(rng);
        gates
    };
    let mut candidates = bucket(&|parents| parents == 0);
    candidates.extend(bucket(&|parents| parents == 1));
    candidates.extend(bucket(&|parents| parents > 1));
    candidates
}

/// Creates a new basic event or reuses a common one, preferring
/// orphans, then single-parent events. Events already in the gate's
/// arguments are never returned.
fn choose_basic_event(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    gate: GateId,
    s_common: f64,
    common_basics: &[BasicEventId],
    rng: &mut StdRng,
) -> Result<Option<BasicEventId>, FaultTreeError> {
    let in_arguments = |fault_tree: &FaultTree, id: BasicEventId| {
        fault_tree.gates[gate]
            .formula
            .basic_args()
            .any(|existing| existing == id)
    };

    if s_common < factors.common_b && !common_basics.is_empty() {
        let available: Vec<BasicEventId> = common_basics
            .iter()
            .copied()
            .filter(|&id| !in_arguments(fault_tree, id))
            .collect();
        let orphans: Vec<BasicEventId> = available
            .iter()
            .copied()
            .filter(|&id| fault_tree.basic_events[id].is_orphan())
            .collect();
        if let Some(&chosen) = orphans.choose(rng) {
            return Ok(Some(chosen));
        }
        let single_parent: Vec<BasicEventId> = available
            .iter()
            .copied()
            .filter(|&id| fault_tree.basic_events[id].num_parents() == 1)
            .collect();
        if let Some(&chosen) = single_parent.choose(rng) {
            return Ok(Some(chosen));
        }
        if let Some(&chosen) = available.choose(rng) {
            return Ok(Some(chosen));
        }
    }
    if fault_tree.basic_events.len() < factors.num_basic {
        return Ok(Some(construct_basic_event(fault_tree, factors, rng)?));
    }
    // The target is met and commons are exhausted; reuse any distinct
    // basic event so the count stays exact.
    let fallback: Vec<BasicEventId> = fault_tree
        .basic_events
        .indices()
        .filter(|&id| !in_arguments(fault_tree, id))
        .collect();
    Ok(fallback.choose(rng).copied())
}

/// When the queue drains before enough basic events exist, a fresh gate
/// is attached at a random spot and growth resumes.
fn correct_for_exhaustion(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    gates_queue: &mut VecDeque<GateId>,
    common_gates: &[GateId],
    rng: &mut StdRng,
) -> Result<(), FaultTreeError> {
    if !gates_queue.is_empty() || fault_tree.basic_events.len() >= factors.num_basic {
        return Ok(());
    }
    let candidates: Vec<GateId> = fault_tree
        .gates
        .indices()
        .filter(|&gid| {
            let operator = fault_tree.gates[gid].operator();
            operator != Operator::Not
                && operator != Operator::Xor
                && !common_gates.contains(&gid)
        })
        .collect();
    if let Some(&random_gate) = candidates.choose(rng) {
        let new_gate = construct_gate(fault_tree, factors, rng)?;
        fault_tree.add_gate_argument(random_gate, Arg::Gate(new_gate));
        gates_queue.push_back(new_gate);
    }
    Ok(())
}

/// Scatters house events onto random non-root gates that are neither
/// NOT nor XOR.
fn distribute_house_events(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    rng: &mut StdRng,
) -> Result<(), FaultTreeError> {
    while fault_tree.house_events.len() < factors.num_house {
        let top = fault_tree.top_gate();
        let candidates: Vec<GateId> = fault_tree
            .gates
            .indices()
            .filter(|&gid| {
                let operator = fault_tree.gates[gid].operator();
                Some(gid) != top && operator != Operator::Not && operator != Operator::Xor
            })
            .collect();
        let Some(&target_gate) = candidates.choose(rng) else {
            warn!("no gate can take house events; skipping the rest");
            break;
        };
        let house = construct_house_event(fault_tree, rng)?;
        fault_tree.add_gate_argument(target_gate, Arg::House(house));
    }
    Ok(())
}

/// Partitions a shuffled subset of basic events into MGL groups with
/// `levels - 1` factors drawn uniformly from [0.1, 1].
fn generate_ccf_groups(
    fault_tree: &mut FaultTree,
    factors: &Factors,
    rng: &mut StdRng,
) -> Result<(), FaultTreeError> {
    if factors.num_ccf == 0 {
        return Ok(());
    }
    let mut members: Vec<BasicEventId> = fault_tree.basic_events.indices().collect();
    members.shuffle(rng);
    let max_size = (2.0 * factors.num_args - 2.0) as usize;
    let mut first_mem = 0usize;
    while fault_tree.ccf_groups.len() < factors.num_ccf {
        let group_size = rng.gen_range(2..=max_size.max(2));
        let last_mem = first_mem + group_size;
        if last_mem > members.len() {
            break;
        }
        let name = format!("CCF{}", fault_tree.ccf_groups.len() + 1);
        let prob = rng.gen_range(factors.min_prob..=factors.max_prob);
        let group_members = members[first_mem..last_mem].to_vec();
        let levels = rng.gen_range(2..=group_members.len());
        let group_factors = (0..levels - 1)
            .map(|_| rng.gen_range(0.1..=1.0))
            .collect();
        fault_tree.add_ccf_group(
            &name,
            CcfModel::Mgl,
            group_members,
            Expr::Float(prob),
            group_factors,
        )?;
        first_mem = last_mem;
    }
    Ok(())
}
