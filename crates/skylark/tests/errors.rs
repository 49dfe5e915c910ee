use pretty_assertions::assert_eq;
use skylark::ExcKind;

mod support;
use support::run_source;

#[test]
fn mutating_a_list_while_iterating_it_is_rejected() {
    let err = run_source(
        "
xs = [1, 2, 3]
for x in xs:
    xs.append(x)
",
    )
    .unwrap_err();
    assert_eq!(err.kind, ExcKind::Mutation);
}

#[test]
fn assigning_to_a_global_after_module_execution_would_fail_if_attempted_again() {
    // The module itself freezes only after its top-level statements finish,
    // so ordinary top-level assignment during execution is unaffected.
    let (m, _) = run_source("x = 1\nx = 2").unwrap();
    assert_eq!(m.lookup_by_name("x").unwrap().repr(), "2");
    assert!(m.frozen.get());
}

#[test]
fn attribute_assignment_is_a_type_error() {
    let err = run_source("x = []\nx.append = 1").unwrap_err();
    assert_eq!(err.kind, ExcKind::Type);
}

#[test]
fn dividing_by_zero_is_an_arithmetic_error() {
    assert_eq!(run_source("x = 1 // 0").unwrap_err().kind, ExcKind::Arithmetic);
    assert_eq!(run_source("x = 1 % 0").unwrap_err().kind, ExcKind::Arithmetic);
    assert_eq!(run_source("x = 1.0 / 0.0").unwrap_err().kind, ExcKind::Arithmetic);
}

#[test]
fn indexing_out_of_range_is_a_value_error() {
    assert_eq!(run_source("x = [1, 2][5]").unwrap_err().kind, ExcKind::Value);
    assert_eq!(run_source("x = 'ab'[9]").unwrap_err().kind, ExcKind::Value);
}

#[test]
fn unhashable_dict_key_is_a_type_error() {
    let err = run_source("d = {}\nd[[1, 2]] = 'x'").unwrap_err();
    assert_eq!(err.kind, ExcKind::Type);
}

#[test]
fn step_limit_aborts_long_running_programs() {
    use skylark::{Dialect, ResourceLimits, Thread};

    let mut printer = skylark::StdoutWriter;
    let limits = ResourceLimits { max_steps: Some(50), ..ResourceLimits::default() };
    let mut thread = Thread::new(Dialect::default(), limits, &mut printer);
    let err = skylark::run(&mut thread, "limited", "x = 0\nfor i in range(10000):\n    x += 1").unwrap_err();
    assert_eq!(err.kind, ExcKind::StepLimit);
}
