use rand::rngs::StdRng;
use rand::SeedableRng;
use ramal_fta::event::Node;
use ramal_fta::gate::Operator;
use ramal_fta::shorthand::parse_str;
use ramal_rft::factors::Factors;
use ramal_rft::generator::generate_fault_tree;
use ramal_rft::summary::calculate_complexity_factors;

fn default_factors(num_basic: usize) -> Factors {
    let mut factors = Factors::new();
    factors.set_min_max_prob(0.01, 0.1).unwrap();
    factors
        .set_common_event_factors(0.1, 0.1, 2.0, 2.0)
        .unwrap();
    factors.set_num_factors(3.0, num_basic, 0, 0).unwrap();
    factors
        .set_gate_weights(vec![1.0, 1.0, 0.0, 0.0, 0.0])
        .unwrap();
    factors.calculate();
    factors
}

fn generate(factors: &Factors, seed: u64) -> ramal_fta::FaultTree {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_fault_tree(factors, "Autogenerated", "root", &mut rng).unwrap()
}

fn to_xml_string(fault_tree: &ramal_fta::FaultTree) -> String {
    let mut buffer = Vec::new();
    fault_tree.to_xml(&mut buffer, 0).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[test]
fn generation_is_deterministic_for_a_fixed_seed() {
    let factors = default_factors(100);
    let first = to_xml_string(&generate(&factors, 123));
    let second = to_xml_string(&generate(&factors, 123));
    assert_eq!(first, second);
    let third = to_xml_string(&generate(&factors, 124));
    assert_ne!(first, third);
}

#[test]
fn basic_event_count_is_exact() {
    let factors = default_factors(100);
    let fault_tree = generate(&factors, 123);
    assert_eq!(fault_tree.basic_events.len(), 100);
    assert!(fault_tree.basic_events.iter().all(|event| !event.is_orphan()));
}

#[test]
fn generated_trees_validate() {
    let factors = default_factors(100);
    let fault_tree = generate(&factors, 123);
    assert_eq!(fault_tree.top_gates.len(), 1);
    fault_tree.detect_cycles().unwrap();
    let order = fault_tree.toposort();
    assert_eq!(order.len(), fault_tree.gates.len());
    // Only the root is an orphan gate.
    let orphans = fault_tree
        .gates
        .indices()
        .filter(|&gid| fault_tree.gates[gid].is_orphan())
        .count();
    assert_eq!(orphans, 1);
}

#[test]
fn gate_count_follows_the_derived_estimate() {
    let factors = default_factors(1000);
    let fault_tree = generate(&factors, 123);
    let expected = factors.expected_num_gate() as f64;
    let actual = fault_tree.gates.len() as f64;
    assert!(
        (1.0 - actual / expected).abs() < 0.1,
        "expected about {expected} gates, got {actual}"
    );
}

#[test]
fn constrained_gate_count_is_within_ten_percent() {
    let mut factors = Factors::new();
    factors.set_min_max_prob(0.01, 0.1).unwrap();
    factors
        .set_common_event_factors(0.1, 0.1, 2.0, 2.0)
        .unwrap();
    factors.set_num_factors(3.0, 200, 0, 0).unwrap();
    factors
        .set_gate_weights(vec![1.0, 1.0, 1.0, 0.1, 0.1])
        .unwrap();
    factors.constrain_num_gate(200).unwrap();
    factors.calculate();
    let fault_tree = generate(&factors, 123);
    let actual = fault_tree.gates.len() as f64;
    assert!(
        (1.0 - actual / 200.0).abs() < 0.1,
        "expected about 200 gates, got {actual}"
    );
}

#[test]
fn probabilities_stay_in_the_configured_range() {
    let factors = default_factors(100);
    let fault_tree = generate(&factors, 123);
    let table = fault_tree.parameter_table();
    for event in &fault_tree.basic_events {
        let value = event.prob.eval(&table).unwrap();
        assert!((0.01..=0.1).contains(&value), "{value} out of range");
    }
}

#[test]
fn house_events_land_on_interior_gates() {
    let mut factors = Factors::new();
    factors.set_min_max_prob(0.01, 0.1).unwrap();
    factors
        .set_common_event_factors(0.1, 0.1, 2.0, 2.0)
        .unwrap();
    factors.set_num_factors(3.0, 100, 10, 0).unwrap();
    factors
        .set_gate_weights(vec![1.0, 1.0, 0.0, 0.0, 0.0])
        .unwrap();
    factors.calculate();
    let fault_tree = generate(&factors, 123);
    assert_eq!(fault_tree.house_events.len(), 10);
    let top = fault_tree.top_gate().unwrap();
    assert_eq!(fault_tree.gates[top].formula.house_args().count(), 0);
}

#[test]
fn ccf_groups_partition_basic_events() {
    let mut factors = Factors::new();
    factors.set_min_max_prob(0.01, 0.1).unwrap();
    factors
        .set_common_event_factors(0.1, 0.1, 2.0, 2.0)
        .unwrap();
    factors.set_num_factors(3.0, 100, 0, 5).unwrap();
    factors
        .set_gate_weights(vec![1.0, 1.0, 0.0, 0.0, 0.0])
        .unwrap();
    factors.calculate();
    let fault_tree = generate(&factors, 123);
    assert_eq!(fault_tree.ccf_groups.len(), 5);
    let grouped: usize = fault_tree
        .ccf_groups
        .iter()
        .map(|group| group.members.len())
        .sum();
    for group in &fault_tree.ccf_groups {
        assert!(group.members.len() >= 2);
        assert!(group.members.len() <= 4);
        assert_eq!(group.factors.iter().filter(|&&f| f < 0.1).count(), 0);
    }
    assert_eq!(fault_tree.non_ccf_events().len(), 100 - grouped);
    let xml = to_xml_string(&fault_tree);
    assert!(xml.contains("<define-CCF-group name=\"CCF1\" model=\"MGL\">"));
}

#[test]
fn operator_mix_follows_the_weights() {
    let mut factors = Factors::new();
    factors.set_min_max_prob(0.01, 0.1).unwrap();
    factors
        .set_common_event_factors(0.1, 0.1, 2.0, 2.0)
        .unwrap();
    factors.set_num_factors(3.0, 500, 0, 0).unwrap();
    // AND and OR only.
    factors
        .set_gate_weights(vec![1.0, 1.0])
        .unwrap();
    factors.calculate();
    let fault_tree = generate(&factors, 7);
    assert!(fault_tree.gates.iter().all(|gate| {
        gate.operator() == Operator::And || gate.operator() == Operator::Or
    }));
}

#[test]
fn generated_aralia_parses_back() {
    let factors = default_factors(50);
    let fault_tree = generate(&factors, 123);
    let mut buffer = Vec::new();
    fault_tree.to_aralia(&mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let reparsed = parse_str(&text, false).unwrap();
    assert_eq!(reparsed.basic_events.len(), 50);
    assert_eq!(reparsed.gates.len(), fault_tree.gates.len());
    assert_eq!(reparsed.undefined_events.len(), 0);
}

#[test]
fn generated_xml_parses_back_strictly() {
    let factors = default_factors(50);
    let fault_tree = generate(&factors, 123);
    let xml = to_xml_string(&fault_tree);
    let reparsed = ramal_fta::xml::from_xml_str(&xml, false).unwrap();
    assert_eq!(reparsed.basic_events.len(), 50);
    assert_eq!(reparsed.gates.len(), fault_tree.gates.len());
}

#[test]
fn complexity_factors_are_sane() {
    let factors = default_factors(500);
    let fault_tree = generate(&factors, 123);
    let (frac_b, common_b, common_g) = calculate_complexity_factors(&fault_tree);
    assert!((0.0..=1.0).contains(&frac_b));
    assert!((0.0..=1.0).contains(&common_b));
    assert!((0.0..=1.0).contains(&common_g));
    assert!(frac_b > 0.3, "basic events dominate gate arguments");
}
