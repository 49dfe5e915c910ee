use pretty_assertions::assert_eq;

mod support;
use support::run_source;

#[test]
fn arithmetic_follows_integer_and_float_rules() {
    let (m, _) = run_source(
        "
a = 7 // 2
b = 7 % 2
c = -7 // 2
d = -7 % 2
e = 2 ** 10
f = 1.5 + 1
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("a").unwrap().repr(), "3");
    assert_eq!(m.lookup_by_name("b").unwrap().repr(), "1");
    assert_eq!(m.lookup_by_name("c").unwrap().repr(), "-4");
    assert_eq!(m.lookup_by_name("d").unwrap().repr(), "1");
    assert_eq!(m.lookup_by_name("e").unwrap().repr(), "1024");
    assert_eq!(m.lookup_by_name("f").unwrap().repr(), "2.5");
}

#[test]
fn string_indexing_and_slicing_are_by_codepoint() {
    let (m, _) = run_source(
        "
s = 'hello'
first = s[0]
last = s[-1]
mid = s[1:3]
rev = s[::-1]
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("first").unwrap().to_display_string(), "h");
    assert_eq!(m.lookup_by_name("last").unwrap().to_display_string(), "o");
    assert_eq!(m.lookup_by_name("mid").unwrap().to_display_string(), "el");
    assert_eq!(m.lookup_by_name("rev").unwrap().to_display_string(), "olleh");
}

#[test]
fn list_and_dict_comprehensions() {
    let (m, _) = run_source(
        "
squares = [x * x for x in range(5) if x % 2 == 0]
by_parity = {x: x % 2 for x in range(4)}
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("squares").unwrap().repr(), "[0, 4, 16]");
    assert_eq!(m.lookup_by_name("by_parity").unwrap().repr(), "{0: 0, 1: 1, 2: 0, 3: 1}");
}

#[test]
fn closures_capture_enclosing_locals_by_reference_to_defining_value() {
    let (m, _) = run_source(
        "
def make_adder(n):
    def adder(x):
        return x + n
    return adder

add5 = make_adder(5)
result = add5(10)
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("result").unwrap().repr(), "15");
}

#[test]
fn default_dialect_rejects_recursion() {
    let err = run_source(
        "
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)

x = fact(5)
",
    )
    .unwrap_err();
    assert_eq!(err.kind, skylark::ExcKind::Recursion);
}

#[test]
fn argument_binding_distinguishes_missing_from_unexpected() {
    let missing = run_source("def f(a, b): return a + b\nf(1)").unwrap_err();
    assert_eq!(missing.kind, skylark::ExcKind::Argument);

    let unexpected = run_source("def f(a): return a\nf(1, extra = 2)").unwrap_err();
    assert_eq!(unexpected.kind, skylark::ExcKind::Argument);
}

#[test]
fn percent_formatting_supports_s_r_and_d() {
    let (m, _) = run_source(
        "
a = '%s and %r' % ('x', 'y')
b = '%d items' % (3,)
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("a").unwrap().to_display_string(), "x and \"y\"");
    assert_eq!(m.lookup_by_name("b").unwrap().to_display_string(), "3 items");
}

#[test]
fn percent_formatting_supports_octal_hex_and_char_conversions() {
    let (m, _) = run_source("r = '%d %o %x %c' % (65, 65, 65, 65)").unwrap();
    assert_eq!(m.lookup_by_name("r").unwrap().to_display_string(), "65 101 41 A");
}

#[test]
fn str_format_supports_repr_conversion_and_rejects_mixed_numbering() {
    let (m, _) = run_source("a = '{0!r} and {1}'.format('x', 'y')").unwrap();
    assert_eq!(m.lookup_by_name("a").unwrap().to_display_string(), "\"x\" and y");

    let err = run_source("b = '{}{0}'.format('x', 'y')").unwrap_err();
    assert_eq!(err.kind, skylark::ExcKind::Value);
}

#[test]
fn print_builtin_writes_to_the_host_printer() {
    let (_, lines) = run_source("print('hello', 'world')").unwrap();
    assert_eq!(lines, vec!["hello world"]);
}

#[test]
fn tuple_unpacking_in_for_loops() {
    let (m, _) = run_source(
        "
total = 0
for k, v in [(1, 10), (2, 20)]:
    total += k + v
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("total").unwrap().repr(), "33");
}
