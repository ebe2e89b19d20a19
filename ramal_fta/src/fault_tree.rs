//! The fault tree container: sole custodian of gates, events, parameters
//! and CCF groups, with late-binding population and validation.

use std::collections::{HashMap, HashSet, VecDeque};

use index_vec::IndexVec;
use tracing::warn;

use crate::error::FaultTreeError;
use crate::event::{
    BasicEvent, BasicEventId, CcfGroup, CcfModel, HouseEvent, HouseEventId, Node, UndefinedEvent,
    UndefinedEventId,
};
use crate::expression::{Expr, Parameter};
use crate::gate::{Arg, Formula, Gate, GateId, Mark, Operator, RawArg, RawFormula};
use crate::name::fold;

/// A resolved occupant of the global name scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Gate(GateId),
    Basic(BasicEventId),
    House(HouseEventId),
    Undefined(UndefinedEventId),
    Param(usize),
    Ccf(usize),
}

/// The root container. Owns every entity; gate arguments and parent
/// back-edges are plain arena indices, so no reference cycles exist in
/// memory. Built once, populated, then frozen for analysis.
#[derive(Debug)]
pub struct FaultTree {
    pub name: String,
    pub gates: IndexVec<GateId, Gate>,
    pub basic_events: IndexVec<BasicEventId, BasicEvent>,
    pub house_events: IndexVec<HouseEventId, HouseEvent>,
    pub undefined_events: IndexVec<UndefinedEventId, UndefinedEvent>,
    pub ccf_groups: Vec<CcfGroup>,
    pub parameters: Vec<Parameter>,
    pub top_gates: Vec<GateId>,
    pub multi_top: bool,
    lookup: HashMap<String, Symbol>,
}

impl FaultTree {
    pub fn new(name: impl Into<String>) -> Self {
        FaultTree {
            name: name.into(),
            gates: IndexVec::new(),
            basic_events: IndexVec::new(),
            house_events: IndexVec::new(),
            undefined_events: IndexVec::new(),
            ccf_groups: Vec::new(),
            parameters: Vec::new(),
            top_gates: Vec::new(),
            multi_top: false,
            lookup: HashMap::new(),
        }
    }

    /// The single root in default mode.
    pub fn top_gate(&self) -> Option<GateId> {
        self.top_gates.first().copied()
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.lookup.get(&fold(name)).copied()
    }

    fn check_redefinition(&self, name: &str) -> Result<(), FaultTreeError> {
        if self.lookup.contains_key(&fold(name)) {
            return Err(FaultTreeError::Redefinition(name.to_owned()));
        }
        Ok(())
    }

    /// Creates and adds a new basic event into the fault tree.
    pub fn add_basic_event(
        &mut self,
        name: &str,
        prob: Expr,
    ) -> Result<BasicEventId, FaultTreeError> {
        self.check_redefinition(name)?;
        let id = self.basic_events.push(BasicEvent::new(name, prob));
        self.lookup.insert(fold(name), Symbol::Basic(id));
        Ok(id)
    }

    /// Creates and adds a new house event into the fault tree.
    pub fn add_house_event(
        &mut self,
        name: &str,
        state: bool,
    ) -> Result<HouseEventId, FaultTreeError> {
        self.check_redefinition(name)?;
        let id = self.house_events.push(HouseEvent::new(name, state));
        self.lookup.insert(fold(name), Symbol::House(id));
        Ok(id)
    }

    /// Creates and adds a new gate with late-bound argument names.
    /// A leading `~` on an argument denotes a complement.
    pub fn add_gate(
        &mut self,
        name: &str,
        operator: Operator,
        arguments: Vec<String>,
        k_num: Option<usize>,
    ) -> Result<GateId, FaultTreeError> {
        self.add_gate_raw(name, RawFormula::from_names(operator, arguments, k_num))
    }

    /// Creates and adds a new gate from an unresolved formula tree.
    pub fn add_gate_raw(
        &mut self,
        name: &str,
        raw: RawFormula,
    ) -> Result<GateId, FaultTreeError> {
        self.check_redefinition(name)?;
        if raw.operator == Operator::Atleast {
            let k = raw.k_num.unwrap_or(0);
            let n = raw.args.len();
            if k < 2 || k >= n {
                return Err(FaultTreeError::InvalidKofN { k, n });
            }
        }
        let id = self.gates.push(Gate::new(name, raw));
        self.lookup.insert(fold(name), Symbol::Gate(id));
        Ok(id)
    }

    pub fn add_parameter(&mut self, name: &str, expr: Expr) -> Result<(), FaultTreeError> {
        self.check_redefinition(name)?;
        let index = self.parameters.len();
        self.parameters.push(Parameter {
            name: name.to_owned(),
            expr,
        });
        self.lookup.insert(fold(name), Symbol::Param(index));
        Ok(())
    }

    pub fn add_ccf_group(
        &mut self,
        name: &str,
        model: CcfModel,
        members: Vec<BasicEventId>,
        prob: Expr,
        factors: Vec<f64>,
    ) -> Result<(), FaultTreeError> {
        self.check_redefinition(name)?;
        if members.len() < 2 {
            return Err(FaultTreeError::CcfFactors {
                name: name.to_owned(),
                reason: format!("{} members; at least 2 are required", members.len()),
            });
        }
        let index = self.ccf_groups.len();
        self.ccf_groups.push(CcfGroup {
            name: name.to_owned(),
            model,
            members,
            prob,
            factors,
        });
        self.lookup.insert(fold(name), Symbol::Ccf(index));
        Ok(())
    }

    /// A gate constructed directly with typed arguments; used by flows
    /// that do not need late binding, like the generator.
    pub fn new_gate(
        &mut self,
        name: &str,
        operator: Operator,
        k_num: Option<usize>,
    ) -> Result<GateId, FaultTreeError> {
        self.check_redefinition(name)?;
        let id = self
            .gates
            .push(Gate::with_formula(name, Formula::new(operator, k_num)));
        self.lookup.insert(fold(name), Symbol::Gate(id));
        Ok(id)
    }

    /// Appends a typed argument to a gate and maintains parent back-edges.
    pub fn add_gate_argument(&mut self, gate: GateId, arg: Arg) {
        self.link_parents(gate, &arg);
        self.gates[gate].formula.args.push(arg);
    }

    fn link_parents(&mut self, owner: GateId, arg: &Arg) {
        match arg {
            Arg::Basic(id) => self.basic_events[*id].add_parent(owner),
            Arg::House(id) => self.house_events[*id].add_parent(owner),
            Arg::Gate(id) => self.gates[*id].add_parent(owner),
            Arg::Undefined(id) => self.undefined_events[*id].add_parent(owner),
            Arg::Formula(nested) => {
                let mut refs = Vec::new();
                let mut pending: Vec<&Formula> = vec![nested.as_ref()];
                while let Some(formula) = pending.pop() {
                    for inner in &formula.args {
                        match inner {
                            Arg::Formula(next) => pending.push(next.as_ref()),
                            other => refs.push(other.clone()),
                        }
                    }
                }
                for reference in refs {
                    self.link_parents_flat(owner, &reference);
                }
            }
        }
    }

    fn link_parents_flat(&mut self, owner: GateId, arg: &Arg) {
        match arg {
            Arg::Basic(id) => self.basic_events[*id].add_parent(owner),
            Arg::House(id) => self.house_events[*id].add_parent(owner),
            Arg::Gate(id) => self.gates[*id].add_parent(owner),
            Arg::Undefined(id) => self.undefined_events[*id].add_parent(owner),
            Arg::Formula(_) => unreachable!("nested formulas are expanded by the caller"),
        }
    }

    /// Binds every gate's argument names to concrete entities, then runs
    /// the validation passes: arity, root detection, cycle detection,
    /// expression and CCF checks. Unresolved names become undefined
    /// events with a warning, or errors in the strict flow.
    pub fn populate(&mut self, strict: bool) -> Result<(), FaultTreeError> {
        let gate_ids: Vec<GateId> = self.gates.indices().collect();
        for gid in gate_ids {
            if let Some(raw) = self.gates[gid].raw.take() {
                let formula = self.resolve_formula(gid, raw, strict)?;
                self.gates[gid].formula = formula;
            }
        }
        self.validate_arity()?;
        for event in &self.basic_events {
            if event.is_orphan() {
                warn!("orphan basic event: {}", event.name);
            }
        }
        for event in &self.house_events {
            if event.is_orphan() {
                warn!("orphan house event: {}", event.name);
            }
        }
        self.detect_top()?;
        self.detect_cycles()?;
        self.validate_expressions()?;
        self.validate_ccf()?;
        Ok(())
    }

    fn resolve_formula(
        &mut self,
        owner: GateId,
        raw: RawFormula,
        strict: bool,
    ) -> Result<Formula, FaultTreeError> {
        struct Build {
            operator: Operator,
            k_num: Option<usize>,
            resolved: Vec<Arg>,
            names: Vec<String>,
            remaining: std::vec::IntoIter<RawArg>,
        }

        fn open(raw: RawFormula) -> Build {
            Build {
                operator: raw.operator,
                k_num: raw.k_num,
                resolved: Vec::new(),
                names: Vec::new(),
                remaining: raw.args.into_iter(),
            }
        }

        let mut stack = vec![open(raw)];
        loop {
            let next = stack
                .last_mut()
                .expect("the build stack cannot underflow")
                .remaining
                .next();
            match next {
                Some(RawArg::Ref(name)) => {
                    let arg = self.resolve_ref(owner, &name, strict)?;
                    let frame = stack.last_mut().expect("frame is alive");
                    frame.names.push(name);
                    frame.resolved.push(arg);
                }
                Some(RawArg::Formula(nested)) => stack.push(open(*nested)),
                None => {
                    let done = stack.pop().expect("frame is alive");
                    check_repeated(&done.names)?;
                    let formula = Formula {
                        operator: done.operator,
                        k_num: done.k_num,
                        args: done.resolved,
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.resolved.push(Arg::Formula(Box::new(formula))),
                        None => return Ok(formula),
                    }
                }
            }
        }
    }

    fn resolve_ref(
        &mut self,
        owner: GateId,
        name: &str,
        strict: bool,
    ) -> Result<Arg, FaultTreeError> {
        let key = fold(name);
        match self.lookup.get(&key).copied() {
            Some(Symbol::Gate(id)) => {
                self.gates[id].add_parent(owner);
                Ok(Arg::Gate(id))
            }
            Some(Symbol::Basic(id)) => {
                self.basic_events[id].add_parent(owner);
                Ok(Arg::Basic(id))
            }
            Some(Symbol::House(id)) => {
                self.house_events[id].add_parent(owner);
                Ok(Arg::House(id))
            }
            Some(Symbol::Undefined(id)) => {
                self.undefined_events[id].add_parent(owner);
                Ok(Arg::Undefined(id))
            }
            Some(Symbol::Param(_)) | Some(Symbol::Ccf(_)) => {
                Err(FaultTreeError::InvalidReference(name.to_owned()))
            }
            None => {
                if strict {
                    return Err(FaultTreeError::UndefinedReference(name.to_owned()));
                }
                warn!("unidentified node: {}", name);
                let id = self.undefined_events.push(UndefinedEvent::new(name));
                self.undefined_events[id].add_parent(owner);
                self.lookup.insert(key, Symbol::Undefined(id));
                Ok(Arg::Undefined(id))
            }
        }
    }

    fn validate_arity(&self) -> Result<(), FaultTreeError> {
        for gate in &self.gates {
            let mut pending = vec![&gate.formula];
            while let Some(formula) = pending.pop() {
                let n = formula.num_args();
                let valid = match formula.operator {
                    Operator::Not | Operator::Null => n == 1,
                    Operator::Xor => n == 2,
                    Operator::Atleast => {
                        let k = formula.k_num.unwrap_or(0);
                        n >= 3 && k >= 2 && k < n
                    }
                    Operator::And | Operator::Or => n >= 1,
                };
                if !valid {
                    if formula.operator == Operator::Atleast {
                        return Err(FaultTreeError::InvalidKofN {
                            k: formula.k_num.unwrap_or(0),
                            n,
                        });
                    }
                    return Err(FaultTreeError::InvalidArity {
                        gate: gate.name.clone(),
                        operator: formula.operator.as_str().to_owned(),
                        n,
                    });
                }
                pending.extend(formula.formula_args());
            }
        }
        Ok(())
    }

    /// Gates with no parents are root candidates. Zero candidates is an
    /// error (typically a cycle through the root); more than one is an
    /// error unless the container is multi-rooted.
    fn detect_top(&mut self) -> Result<(), FaultTreeError> {
        let orphans: Vec<GateId> = self
            .gates
            .indices()
            .filter(|&gid| self.gates[gid].is_orphan())
            .collect();
        if orphans.is_empty() {
            return Err(FaultTreeError::NoTopGate);
        }
        if orphans.len() > 1 && !self.multi_top {
            let names = orphans
                .iter()
                .map(|&gid| self.gates[gid].name.clone())
                .collect();
            return Err(FaultTreeError::MultipleTopGates(names));
        }
        self.top_gates = orphans;
        Ok(())
    }

    /// Three-colour depth-first search from every root. Marks are reset
    /// to clear on every exit path, including cycle reports.
    pub fn detect_cycles(&self) -> Result<(), FaultTreeError> {
        let result = self.run_cycle_detection();
        for gate in &self.gates {
            gate.set_mark(Mark::Clear);
        }
        result
    }

    fn run_cycle_detection(&self) -> Result<(), FaultTreeError> {
        for &top in &self.top_gates {
            if let Some(path) = self.visit_for_cycle(top) {
                return Err(FaultTreeError::Cycle(path));
            }
        }
        // Anything still unvisited is unreachable from the roots; its
        // ancestor chain cannot end in an orphan, so a cycle hides there.
        let detached: Vec<GateId> = self
            .gates
            .indices()
            .filter(|&gid| self.gates[gid].mark() == Mark::Clear)
            .collect();
        if detached.is_empty() {
            return Ok(());
        }
        let names = detached
            .iter()
            .map(|&gid| self.gates[gid].name.clone())
            .collect();
        let mut cycle = None;
        for &gid in &detached {
            if let Some(path) = self.visit_for_cycle(gid) {
                cycle = Some(path);
                break;
            }
        }
        Err(FaultTreeError::DetachedGates { names, cycle })
    }

    /// Iterative DFS; generated trees exceed any recursion limit.
    /// Returns the cycle path top-down, ending with the repeated name.
    fn visit_for_cycle(&self, root: GateId) -> Option<Vec<String>> {
        struct Frame {
            gate: GateId,
            children: Vec<GateId>,
            next: usize,
        }
        enum Step {
            Descend(GateId),
            Retreat,
            Done,
        }

        if self.gates[root].mark() != Mark::Clear {
            return None;
        }
        self.gates[root].set_mark(Mark::Temp);
        let mut stack = vec![Frame {
            gate: root,
            children: self.gates[root].formula.gate_args(),
            next: 0,
        }];
        loop {
            let step = match stack.last_mut() {
                None => Step::Done,
                Some(frame) => {
                    if frame.next == frame.children.len() {
                        Step::Retreat
                    } else {
                        let child = frame.children[frame.next];
                        frame.next += 1;
                        Step::Descend(child)
                    }
                }
            };
            match step {
                Step::Done => return None,
                Step::Retreat => {
                    let frame = stack.pop().expect("retreat from a live frame");
                    self.gates[frame.gate].set_mark(Mark::Perm);
                }
                Step::Descend(child) => match self.gates[child].mark() {
                    Mark::Clear => {
                        self.gates[child].set_mark(Mark::Temp);
                        stack.push(Frame {
                            gate: child,
                            children: self.gates[child].formula.gate_args(),
                            next: 0,
                        });
                    }
                    Mark::Temp => {
                        let start = stack
                            .iter()
                            .position(|frame| frame.gate == child)
                            .unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|frame| self.gates[frame.gate].name.clone())
                            .collect();
                        path.push(self.gates[child].name.clone());
                        return Some(path);
                    }
                    Mark::Perm => {}
                },
            }
        }
    }

    /// Reverse-postorder over the gate graph: the same three-colour DFS,
    /// pushing front at the permanent transition. Roots are visited in
    /// order, so independent subgraphs keep root order. Ends with every
    /// mark clear.
    pub fn toposort(&self) -> Vec<GateId> {
        let mut order = VecDeque::with_capacity(self.gates.len());
        for &top in &self.top_gates {
            self.visit_for_sort(top, &mut order);
        }
        for gate in &self.gates {
            gate.set_mark(Mark::Clear);
        }
        debug_assert_eq!(order.len(), self.gates.len());
        order.into_iter().collect()
    }

    fn visit_for_sort(&self, root: GateId, order: &mut VecDeque<GateId>) {
        struct Frame {
            gate: GateId,
            children: Vec<GateId>,
            next: usize,
        }
        enum Step {
            Descend(GateId),
            Retreat,
            Done,
        }

        debug_assert_ne!(self.gates[root].mark(), Mark::Temp);
        if self.gates[root].mark() != Mark::Clear {
            return;
        }
        self.gates[root].set_mark(Mark::Temp);
        let mut stack = vec![Frame {
            gate: root,
            children: self.gates[root].formula.gate_args(),
            next: 0,
        }];
        loop {
            let step = match stack.last_mut() {
                None => Step::Done,
                Some(frame) => {
                    if frame.next == frame.children.len() {
                        Step::Retreat
                    } else {
                        let child = frame.children[frame.next];
                        frame.next += 1;
                        Step::Descend(child)
                    }
                }
            };
            match step {
                Step::Done => return,
                Step::Retreat => {
                    let frame = stack.pop().expect("retreat from a live frame");
                    self.gates[frame.gate].set_mark(Mark::Perm);
                    order.push_front(frame.gate);
                }
                Step::Descend(child) => {
                    if self.gates[child].mark() == Mark::Clear {
                        self.gates[child].set_mark(Mark::Temp);
                        stack.push(Frame {
                            gate: child,
                            children: self.gates[child].formula.gate_args(),
                            next: 0,
                        });
                    }
                }
            }
        }
    }

    /// Every gate upward of the given one, following parent edges.
    pub fn gate_ancestors(&self, gate: GateId) -> HashSet<GateId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<GateId> = self.gates[gate].parents.clone();
        while let Some(parent) = stack.pop() {
            if seen.insert(parent) {
                stack.extend(self.gates[parent].parents.iter().copied());
            }
        }
        seen
    }

    /// Basic events outside every CCF group, in insertion order.
    pub fn non_ccf_events(&self) -> Vec<BasicEventId> {
        let grouped: HashSet<BasicEventId> = self
            .ccf_groups
            .iter()
            .flat_map(|group| group.members.iter().copied())
            .collect();
        self.basic_events
            .indices()
            .filter(|id| !grouped.contains(id))
            .collect()
    }

    /// Case-insensitive parameter table for expression evaluation.
    pub fn parameter_table(&self) -> HashMap<String, Expr> {
        self.parameters
            .iter()
            .map(|param| (fold(&param.name), param.expr.clone()))
            .collect()
    }

    fn validate_expressions(&self) -> Result<(), FaultTreeError> {
        let table = self.parameter_table();
        for event in &self.basic_events {
            let value = event.prob.eval(&table)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(FaultTreeError::InvalidProbability {
                    name: event.name.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    fn validate_ccf(&self) -> Result<(), FaultTreeError> {
        let table = self.parameter_table();
        for group in &self.ccf_groups {
            let value = group.prob.eval(&table)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(FaultTreeError::InvalidProbability {
                    name: group.name.clone(),
                    value,
                });
            }
            if group.factors.iter().any(|&factor| factor < 0.0) {
                return Err(FaultTreeError::CcfFactors {
                    name: group.name.clone(),
                    reason: "negative factor".to_owned(),
                });
            }
            if group.model == CcfModel::Phi {
                let sum: f64 = group.factors.iter().sum();
                if (sum - 1.0).abs() > 1e-6 {
                    return Err(FaultTreeError::CcfFactors {
                        name: group.name.clone(),
                        reason: format!("phi factors sum to {sum}, expected 1"),
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_repeated(names: &[String]) -> Result<(), FaultTreeError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(fold(name)) {
            return Err(FaultTreeError::RepeatedArguments(names.join(", ")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FaultTree {
        let mut ft = FaultTree::new("Sample");
        ft.add_gate("root", Operator::And, names(&["g1", "g2"]), None)
            .unwrap();
        ft.add_gate("g1", Operator::Or, names(&["a", "b"]), None)
            .unwrap();
        ft.add_gate("g2", Operator::Or, names(&["b", "c"]), None)
            .unwrap();
        ft.add_basic_event("a", Expr::Float(0.1)).unwrap();
        ft.add_basic_event("b", Expr::Float(0.2)).unwrap();
        ft.add_basic_event("c", Expr::Float(0.3)).unwrap();
        ft
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn marks_are_clear_after_toposort() {
        let mut ft = sample_tree();
        ft.populate(false).unwrap();
        let order = ft.toposort();
        assert_eq!(order.len(), ft.gates.len());
        assert!(ft.gates.iter().all(|gate| gate.mark() == Mark::Clear));
    }

    #[test]
    fn marks_are_clear_after_cycle_error() {
        let mut ft = FaultTree::new("Cyclic");
        ft.add_gate("top", Operator::And, names(&["g1", "e"]), None)
            .unwrap();
        ft.add_gate("g1", Operator::And, names(&["g2", "e"]), None)
            .unwrap();
        ft.add_gate("g2", Operator::And, names(&["g1", "e"]), None)
            .unwrap();
        let err = ft.populate(false).unwrap_err();
        assert!(matches!(err, FaultTreeError::Cycle(_)));
        assert!(ft.gates.iter().all(|gate| gate.mark() == Mark::Clear));
    }

    #[test]
    fn redefinition_is_case_insensitive() {
        let mut ft = FaultTree::new("Scope");
        ft.add_basic_event("Pump-A", Expr::Float(0.5)).unwrap();
        let err = ft.add_house_event("pump-a", true).unwrap_err();
        assert!(matches!(err, FaultTreeError::Redefinition(_)));
    }

    #[test]
    fn toposort_puts_gates_before_their_arguments() {
        let mut ft = sample_tree();
        ft.populate(false).unwrap();
        let order = ft.toposort();
        let position: HashMap<GateId, usize> = order
            .iter()
            .enumerate()
            .map(|(index, &gid)| (gid, index))
            .collect();
        for gid in ft.gates.indices() {
            for child in ft.gates[gid].formula.gate_args() {
                assert!(position[&gid] < position[&child]);
            }
        }
    }
}
