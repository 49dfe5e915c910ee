use pretty_assertions::assert_eq;

mod support;
use support::run_source;

#[test]
fn dict_iterates_in_insertion_order_not_key_order() {
    let (m, _) = run_source(
        "
d = {}
d['z'] = 1
d['a'] = 2
d['m'] = 3
keys = list(d.keys())
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("keys").unwrap().repr(), "[\"z\", \"a\", \"m\"]");
}

#[test]
fn re_assigning_an_existing_key_preserves_its_original_position() {
    let (m, _) = run_source(
        "
d = {'a': 1, 'b': 2}
d['a'] = 99
keys = list(d.keys())
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("keys").unwrap().repr(), "[\"a\", \"b\"]");
    assert_eq!(m.lookup_by_name("d").unwrap().repr(), "{\"a\": 99, \"b\": 2}");
}

#[test]
fn set_preserves_insertion_order_and_dedupes() {
    let (m, _) = run_source(
        "
s = set()
s.add(3)
s.add(1)
s.add(3)
s.add(2)
items = list(s)
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("items").unwrap().repr(), "[3, 1, 2]");
}

#[test]
fn equal_ints_and_floats_hash_alike() {
    let (m, _) = run_source(
        "
d = {}
d[1] = 'int key'
d[1.0] = 'float key overwrites'
size = len(d)
v = d[1]
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("size").unwrap().repr(), "1");
    assert_eq!(m.lookup_by_name("v").unwrap().to_display_string(), "float key overwrites");
}

#[test]
fn sorted_is_stable_and_does_not_mutate_its_argument() {
    let (m, _) = run_source(
        "
original = [(1, 'b'), (1, 'a'), (0, 'c')]
ordered = sorted(original, key = lambda p: p[0])
",
    )
    .unwrap();
    assert_eq!(m.lookup_by_name("ordered").unwrap().repr(), "[(0, \"c\"), (1, \"b\"), (1, \"a\")]");
    assert_eq!(m.lookup_by_name("original").unwrap().repr(), "[(1, \"b\"), (1, \"a\"), (0, \"c\")]");
}
