use ramal_fta::error::{Error, FaultTreeError, ParseKind};
use ramal_fta::event::Node;
use ramal_fta::fault_tree::Symbol;
use ramal_fta::gate::{Arg, Operator};
use ramal_fta::shorthand::parse_str;

fn parse(text: &str) -> Result<ramal_fta::FaultTree, Error> {
    parse_str(text, false)
}

fn assert_parsing_error(text: &str) {
    match parse(text) {
        Err(Error::Parse(error)) => assert_eq!(error.kind, ParseKind::Parsing),
        other => panic!("expected a parsing error, got {other:?}"),
    }
}

fn assert_format_error(text: &str) {
    match parse(text) {
        Err(Error::Parse(error)) => assert_eq!(error.kind, ParseKind::Format),
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn correct_overall_process() {
    let fault_tree = parse(
        "ValidFaultTree\n\
         \n\
         root := g1 | g2 | g3 | g4 | g7 | e1\n\
         g1 := e2 & g5 & g6\n\
         g2 := h1 & g6\n\
         g3 := (g6 ^ e2)\n\
         g4 := @(2, [g5, e3, e4])\n\
         g5 := ~e3\n\
         g6 := ((e3 | e4))\n\
         \n\
         g7 := g4\n\
         \n\
         p(e1) = 0.1\n\
         p(e2) = 0.2\n\
         p(e3) = 0.3\n\
         s(h1) = true\n\
         s(h2) = false\n",
    )
    .unwrap();
    assert_eq!(fault_tree.name, "ValidFaultTree");
    assert_eq!(fault_tree.gates.len(), 8);
    assert_eq!(fault_tree.basic_events.len(), 3);
    assert_eq!(fault_tree.house_events.len(), 2);
    // e4 is referenced but never declared.
    assert_eq!(fault_tree.undefined_events.len(), 1);
    assert_eq!(fault_tree.top_gates.len(), 1);
}

#[test]
fn smoke_example() {
    let fault_tree = parse(
        "Smoke\n\
         root := a & b\n\
         p(a) = 0.1\n\
         p(b) = 0.2\n",
    )
    .unwrap();
    assert_eq!(fault_tree.name, "Smoke");
    assert_eq!(fault_tree.gates.len(), 1);
    let root = fault_tree.top_gate().unwrap();
    assert_eq!(fault_tree.gates[root].name, "root");
    assert_eq!(fault_tree.gates[root].operator(), Operator::And);
    assert_eq!(fault_tree.gates[root].formula.num_args(), 2);
    assert_eq!(fault_tree.undefined_events.len(), 0);
    assert!(matches!(fault_tree.lookup("a"), Some(Symbol::Basic(_))));
    assert!(matches!(fault_tree.lookup("B"), Some(Symbol::Basic(_))));
}

#[test]
fn fault_tree_name_redefinition() {
    assert_format_error("FaultTreeName\nAnotherFaultTree\n");
}

#[test]
fn ncname_rules_for_the_fault_tree_name() {
    assert_parsing_error("Contains Whitespace Characters\n");
    assert_parsing_error("Peri.od\n");
    assert_parsing_error("EndWithDash-\n");
    assert_parsing_error("Double--Dash\n");
    assert_parsing_error("42StartWithNumbers\n");
    parse("Correct-Name_42\ng1 := e1 & e2\n").unwrap();
}

#[test]
fn missing_fault_tree_name() {
    assert_format_error("g1 := g2 & e1\ng2 := h1 & e1\n");
}

#[test]
fn arithmetic_operators_are_rejected() {
    assert_parsing_error("FT\ng1 := g2 + e1\n");
    assert_parsing_error("FT\ng1 := g2 * e1\n");
    assert_parsing_error("FT\ng1 := -e1\n");
    assert_parsing_error("FT\ng1 := g2 / e1\n");
}

#[test]
fn mixed_infix_operators_are_a_parse_error() {
    assert_parsing_error("FT\ng1 := a | b & c\n");
    assert_parsing_error("FT\ng1 := a ^ b ^ c\n");
    assert_parsing_error("FT\ng1 := a & b | c ^ d\n");
}

#[test]
fn repeated_arguments_are_case_insensitive() {
    let error = parse("FT\ng1 := g2 & e1\ng2 := E1 & e1\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTreeInLine {
            source: FaultTreeError::RepeatedArguments(_),
            line: 3,
            ..
        }
    ));
    let error = parse("FT\ng1 := e1 & e1\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTreeInLine {
            source: FaultTreeError::RepeatedArguments(_),
            ..
        }
    ));
}

#[test]
fn mismatched_parentheses() {
    assert_format_error("WrongParentheses\ng1 := (a | b & c\n");
    assert_format_error("WrongParentheses\ng1 := a | b) & c\n");
}

#[test]
fn combination_gate_requires_k_below_n() {
    let error = parse("FT\ng1 := @(3, [a, b, c])\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTreeInLine {
            source: FaultTreeError::InvalidKofN { k: 3, n: 3 },
            ..
        }
    ));
    let error = parse("FT\ng1 := @(4, [a, b, c])\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTreeInLine {
            source: FaultTreeError::InvalidKofN { k: 4, n: 3 },
            ..
        }
    ));
}

#[test]
fn null_gates_are_recognized() {
    let fault_tree = parse("FT\ng1 := a\n").unwrap();
    assert_eq!(fault_tree.gates.len(), 1);
    let root = fault_tree.top_gate().unwrap();
    assert_eq!(fault_tree.gates[root].operator(), Operator::Null);
    assert_eq!(fault_tree.gates[root].formula.num_args(), 1);
}

#[test]
fn complemented_arguments_become_nested_not_formulas() {
    let fault_tree = parse(
        "FT\n\
         g1 := a & ~b\n\
         p(a) = 0.1\n\
         p(b) = 0.2\n",
    )
    .unwrap();
    let root = fault_tree.top_gate().unwrap();
    let formula = &fault_tree.gates[root].formula;
    assert_eq!(formula.num_args(), 2);
    let nested = formula.formula_args().next().unwrap();
    assert_eq!(nested.operator, Operator::Not);
    assert!(matches!(nested.args[0], Arg::Basic(_)));
}

#[test]
fn double_negation_needs_no_support() {
    assert_parsing_error("FT\ng1 := ~~e1\n");
    assert_parsing_error("FT\ng1 := ~e1~a\n");
}

#[test]
fn no_top_gate_when_the_cycle_includes_the_root() {
    let error = parse("Cycle\ng1 := g2 & e1\ng2 := g1 & e1\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTree(FaultTreeError::NoTopGate)
    ));
}

#[test]
fn multiple_top_gates_are_rejected_by_default() {
    let input = "Multi\ng1 := a & b\ng2 := a | b\n";
    match parse(input).unwrap_err() {
        Error::FaultTree(FaultTreeError::MultipleTopGates(names)) => {
            assert_eq!(names, vec!["g1".to_owned(), "g2".to_owned()]);
        }
        other => panic!("expected multiple top gates, got {other:?}"),
    }
    let fault_tree = parse_str(input, true).unwrap();
    assert_eq!(fault_tree.top_gates.len(), 2);
}

#[test]
fn redefinition_across_scopes() {
    let error = parse("FT\ng1 := g2 & e1\ng2 := h1 & e1\ng2 := e2 & e1\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTreeInLine {
            source: FaultTreeError::Redefinition(_),
            ..
        }
    ));
    let error = parse("FT\ng1 := e1 & e2\np(G1) = 0.1\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTreeInLine {
            source: FaultTreeError::Redefinition(_),
            ..
        }
    ));
}

#[test]
fn orphan_events_only_warn() {
    let fault_tree = parse(
        "FT\n\
         g1 := g2 & e1\n\
         g2 := h1 & e1\n\
         p(e1) = 0.5\n\
         p(e2) = 0.1\n\
         s(h1) = false\n\
         s(h2) = true\n",
    )
    .unwrap();
    let orphan = fault_tree
        .basic_events
        .iter()
        .find(|event| event.name == "e2")
        .unwrap();
    assert!(orphan.is_orphan());
}

#[test]
fn cycle_path_is_reported_top_down() {
    let error = parse("FT\ng1 := g2 & e1\ng2 := g3 & e1\ng3 := g2 & e1\n").unwrap_err();
    match error {
        Error::FaultTree(FaultTreeError::Cycle(path)) => {
            assert_eq!(path, vec!["g2".to_owned(), "g3".to_owned(), "g2".to_owned()]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn detached_gates_are_reported() {
    let error = parse("FT\ng1 := e2 & e1\ng2 := g3 & e1\ng3 := g2 & e1\n").unwrap_err();
    match error {
        Error::FaultTree(FaultTreeError::DetachedGates { names, cycle }) => {
            assert!(names.contains(&"g2".to_owned()));
            assert!(names.contains(&"g3".to_owned()));
            let path = cycle.expect("the detached subgraph hides a cycle");
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected detached gates, got {other:?}"),
    }
}

#[test]
fn out_of_range_probability() {
    let error = parse("FT\ng1 := a & b\np(a) = 1.5\np(b) = 0.1\n").unwrap_err();
    assert!(matches!(
        error,
        Error::FaultTree(FaultTreeError::InvalidProbability { .. })
    ));
}

#[test]
fn whitespace_is_insignificant() {
    let fault_tree = parse(
        "FT\n\
         g1:=a&b\n\
         p( a ) = 0.1\n\
         p(b)=0.2\n",
    )
    .unwrap();
    let root = fault_tree.top_gate().unwrap();
    assert_eq!(fault_tree.gates[root].operator(), Operator::And);
    assert_eq!(fault_tree.basic_events.len(), 2);
}

#[test]
fn comments_are_not_recognized() {
    assert_parsing_error("FT\n# a comment\ng1 := a & b\n");
}

#[test]
fn parse_file_round() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.txt");
    std::fs::write(&path, "FT\ng1 := a & b\np(a) = 0.1\np(b) = 0.2\n").unwrap();
    let fault_tree = ramal_fta::shorthand::parse_file(&path, false).unwrap();
    assert_eq!(fault_tree.name, "FT");
    let missing = dir.path().join("missing.txt");
    assert!(matches!(
        ramal_fta::shorthand::parse_file(&missing, false),
        Err(Error::Io(_))
    ));
}
