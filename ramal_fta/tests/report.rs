use ramal_fta::report::json_report;
use ramal_fta::shorthand::parse_str;

#[test]
fn report_counts_and_histogram() {
    let fault_tree = parse_str(
        "Report\n\
         root := g1 | g2 | b1\n\
         g1 := b1 & b2\n\
         g2 := ~g3\n\
         g3 := @(2, [b2, b3, h1])\n\
         p(b1) = 0.1\n\
         p(b2) = 0.2\n\
         p(b3) = 0.3\n\
         s(h1) = true\n",
        false,
    )
    .unwrap();
    let report = json_report(&fault_tree);
    assert_eq!(report["name"], "Report");
    assert_eq!(report["top_gates"][0], "root");
    assert_eq!(report["num_gates"], 4);
    assert_eq!(report["num_basic_events"], 3);
    assert_eq!(report["num_house_events"], 1);
    assert_eq!(report["gate_types"]["or"], 1);
    assert_eq!(report["gate_types"]["and"], 1);
    assert_eq!(report["gate_types"]["not"], 1);
    assert_eq!(report["gate_types"]["atleast"], 1);
    // b1 and b2 are shared between two gates.
    assert_eq!(report["num_common_basic_events"], 2);
}
