use std::collections::HashMap;

use ramal_fta::error::FaultTreeError;
use ramal_fta::expression::Expr;
use ramal_fta::fault_tree::FaultTree;
use ramal_fta::gate::{Operator, RawFormula};
use ramal_fta::name::{fold, is_valid_name};

#[test]
fn name_rules() {
    assert!(is_valid_name("a"));
    assert!(is_valid_name("Pump-A_1"));
    assert!(is_valid_name("Correct-Name_42"));
    assert!(!is_valid_name(""));
    assert!(!is_valid_name("42start"));
    assert!(!is_valid_name("end-"));
    assert!(!is_valid_name("double--dash"));
    assert!(!is_valid_name("peri.od"));
    assert!(!is_valid_name("with space"));
    assert!(!is_valid_name("-lead"));
    assert_eq!(fold("Pump-A"), "pump-a");
}

#[test]
fn expression_evaluation() {
    let mut params = HashMap::new();
    params.insert(fold("Lambda1"), Expr::Float(0.2));
    params.insert(fold("twice"), Expr::Mul(vec![
        Expr::Float(2.0),
        Expr::Param("lambda1".to_owned()),
    ]));

    assert_eq!(Expr::Float(0.5).eval(&params).unwrap(), 0.5);
    assert_eq!(Expr::Bool(true).eval(&params).unwrap(), 1.0);
    assert_eq!(Expr::Param("LAMBDA1".to_owned()).eval(&params).unwrap(), 0.2);
    let value = Expr::Sub(vec![
        Expr::Param("twice".to_owned()),
        Expr::Float(0.1),
    ])
    .eval(&params)
    .unwrap();
    assert!((value - 0.3).abs() < 1e-12);
    let negated = Expr::Neg(Box::new(Expr::Float(0.25))).eval(&params).unwrap();
    assert_eq!(negated, -0.25);

    let missing = Expr::Param("nope".to_owned()).eval(&params).unwrap_err();
    assert!(matches!(missing, FaultTreeError::UnresolvedParameter(_)));
}

#[test]
fn parameter_cycles_are_detected() {
    let mut params = HashMap::new();
    params.insert(
        fold("a"),
        Expr::Add(vec![Expr::Param("b".to_owned()), Expr::Float(0.1)]),
    );
    params.insert(fold("b"), Expr::Param("a".to_owned()));
    let error = Expr::Param("a".to_owned()).eval(&params).unwrap_err();
    assert!(matches!(error, FaultTreeError::ParameterCycle(_)));
}

#[test]
fn arity_is_validated_at_population() {
    // A NOT formula with two arguments can only come from structured
    // input, not from the shorthand grammar.
    let mut ft = FaultTree::new("Arity");
    let raw = RawFormula::from_names(
        Operator::Not,
        vec!["a".to_owned(), "b".to_owned()],
        None,
    );
    ft.add_gate_raw("g1", raw).unwrap();
    ft.add_basic_event("a", Expr::Float(0.1)).unwrap();
    ft.add_basic_event("b", Expr::Float(0.2)).unwrap();
    let error = ft.populate(false).unwrap_err();
    assert!(matches!(error, FaultTreeError::InvalidArity { .. }));
}

#[test]
fn atleast_bounds_are_validated_at_insertion() {
    let mut ft = FaultTree::new("Arity");
    let raw = RawFormula::from_names(
        Operator::Atleast,
        vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
        Some(1),
    );
    let error = ft.add_gate_raw("g1", raw).unwrap_err();
    assert!(matches!(error, FaultTreeError::InvalidKofN { k: 1, n: 3 }));
}

#[test]
fn phi_factors_must_sum_to_one() {
    let mut ft = FaultTree::new("Ccf");
    let a = ft.add_basic_event("a", Expr::Float(0.1)).unwrap();
    let b = ft.add_basic_event("b", Expr::Float(0.2)).unwrap();
    ft.add_gate(
        "root",
        Operator::And,
        vec!["a".to_owned(), "b".to_owned()],
        None,
    )
    .unwrap();
    ft.add_ccf_group(
        "CCF1",
        ramal_fta::event::CcfModel::Phi,
        vec![a, b],
        Expr::Float(0.05),
        vec![0.5, 0.2],
    )
    .unwrap();
    let error = ft.populate(false).unwrap_err();
    assert!(matches!(error, FaultTreeError::CcfFactors { .. }));
}

#[test]
fn ccf_groups_share_the_name_scope() {
    let mut ft = FaultTree::new("Ccf");
    let a = ft.add_basic_event("a", Expr::Float(0.1)).unwrap();
    let b = ft.add_basic_event("b", Expr::Float(0.2)).unwrap();
    let error = ft
        .add_ccf_group(
            "A",
            ramal_fta::event::CcfModel::Mgl,
            vec![a, b],
            Expr::Float(0.05),
            vec![0.5],
        )
        .unwrap_err();
    assert!(matches!(error, FaultTreeError::Redefinition(_)));
}
