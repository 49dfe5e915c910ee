use pretty_assertions::assert_eq;
use skylark::{Dialect, ExcKind, ResourceLimits, StdoutWriter, Thread};

mod support;
use support::MapSource;

#[test]
fn load_binds_names_exported_by_another_module() {
    let mut source = MapSource::new(vec![("lib.sky", "VALUE = 42\ndef double(n):\n    return n * 2")]);
    let mut printer = StdoutWriter;
    let mut thread = Thread::new(Dialect::default(), ResourceLimits::default(), &mut printer).with_loader(&mut source);
    let m = skylark::run(
        &mut thread,
        "main",
        "load('lib.sky', 'VALUE', doubled = 'double')\nresult = doubled(VALUE)",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("result").unwrap().repr(), "84");
}

#[test]
fn loading_an_unknown_module_is_a_load_error() {
    let mut source = MapSource::new(vec![]);
    let mut printer = StdoutWriter;
    let mut thread = Thread::new(Dialect::default(), ResourceLimits::default(), &mut printer).with_loader(&mut source);
    let err = skylark::run(&mut thread, "main", "load('missing.sky', 'X')").unwrap_err();
    assert_eq!(err.kind, ExcKind::Load);
}

#[test]
fn loading_without_a_configured_loader_fails() {
    let mut printer = StdoutWriter;
    let mut thread = Thread::new(Dialect::default(), ResourceLimits::default(), &mut printer);
    let err = skylark::run(&mut thread, "main", "load('anything.sky', 'X')").unwrap_err();
    assert_eq!(err.kind, ExcKind::Load);
}
