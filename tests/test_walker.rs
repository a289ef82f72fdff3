use camino::Utf8Path;
use mutator::exclusion::ExclusionPolicy;
use mutator::operators::RuleTable;
use mutator::parser::PythonFrontend;
use mutator::{Error, MutationId, Mutator};

fn mutants_with(source: &str, rules: &RuleTable, policy: &ExclusionPolicy) -> Vec<String> {
    let frontend = PythonFrontend;
    let mutator = Mutator::new(&frontend, rules, policy);
    mutator
        .mutants(Utf8Path::new("test.py"), source)
        .unwrap()
        .map(|m| m.mutated_source)
        .collect()
}

fn mutants(source: &str) -> Vec<String> {
    mutants_with(source, &RuleTable::python(&[]), &ExclusionPolicy::new())
}

fn ids(source: &str) -> Vec<MutationId> {
    let frontend = PythonFrontend;
    let rules = RuleTable::python(&[]);
    let policy = ExclusionPolicy::new();
    Mutator::new(&frontend, &rules, &policy)
        .list_mutations(Utf8Path::new("test.py"), source)
        .unwrap()
}

// --- single rules ---

#[test]
fn binary_operator_mutates_each_operand_separately() {
    let result = mutants("1+1");
    assert_eq!(result, vec!["2+1", "1-1", "1+2"]);
    assert!(!result.contains(&"2-2".to_string()));
}

#[test]
fn comparison_is_becomes_is_not() {
    assert_eq!(mutants("x = a is b\n"), vec!["x = a is not b\n", "x = None\n"]);
}

#[test]
fn less_than_becomes_less_or_equal() {
    assert_eq!(mutants("a < b\n"), vec!["a <= b\n"]);
}

#[test]
fn and_becomes_or() {
    assert_eq!(mutants("a and b\n"), vec!["a or b\n"]);
}

#[test]
fn not_is_dropped() {
    assert_eq!(mutants("not x\n"), vec![" x\n"]);
}

#[test]
fn true_becomes_false_and_assignment_becomes_none() {
    assert_eq!(mutants("x = True\n"), vec!["x = False\n", "x = None\n"]);
}

#[test]
fn assignment_of_none_becomes_seven() {
    assert_eq!(mutants("x = None\n"), vec!["x = 7\n"]);
}

#[test]
fn augmented_assignment_flips_operator() {
    assert_eq!(mutants("x += 1\n"), vec!["x -= 1\n", "x += 2\n"]);
}

#[test]
fn string_is_wrapped() {
    assert_eq!(mutants("s = \"hello\"\n"), vec!["s = \"XXhelloXX\"\n", "s = None\n"]);
}

#[test]
fn break_becomes_continue() {
    assert_eq!(
        mutants("while x:\n    break\n"),
        vec!["while x:\n    continue\n"]
    );
}

#[test]
fn lambda_body_becomes_none() {
    assert_eq!(
        mutants("f = lambda: 0\n"),
        vec!["f = lambda: 1\n", "f = lambda: None\n", "f = None\n"]
    );
}

#[test]
fn decorator_is_removed() {
    assert_eq!(
        mutants("@decorator\ndef foo():\n    pass\n"),
        vec!["\ndef foo():\n    pass\n"]
    );
}

#[test]
fn subscript_index_becomes_none() {
    assert_eq!(mutants("x[y]\n"), vec!["x[None]\n"]);
}

#[test]
fn first_of_many_arguments_becomes_none() {
    assert_eq!(mutants("f(a, b, c)\n"), vec!["f(None, b, c)\n"]);
}

#[test]
fn deepcopy_becomes_copy() {
    assert_eq!(mutants("copy.deepcopy(x)\n"), vec!["copy.copy(x)\n"]);
}

#[test]
fn return_annotation_is_skipped_but_body_is_not() {
    assert_eq!(
        mutants("def f(a) -> int:\n    return a + 1\n"),
        vec![
            "def f(a) -> int:\n    return a - 1\n",
            "def f(a) -> int:\n    return a + 2\n",
        ]
    );
}

// --- dict keyword arguments ---

#[test]
fn dict_keywords_are_renamed_one_at_a_time() {
    assert_eq!(
        mutants("dict(a=b, c=d)"),
        vec!["dict(aXX=b, c=d)", "dict(a=b, cXX=d)"]
    );
}

#[test]
fn other_calls_keep_their_keywords() {
    assert!(mutants("NotADictSynonym(a=b)").is_empty());
    assert!(mutants("f(a=b)").is_empty());
}

#[test]
fn dict_synonyms_are_configurable() {
    let rules = RuleTable::python(&["Struct".to_string()]);
    let policy = ExclusionPolicy::new();
    assert_eq!(
        mutants_with("Struct(a=b)", &rules, &policy),
        vec!["Struct(aXX=b)"]
    );
    assert_eq!(
        mutants_with("dict(a=b)", &rules, &policy),
        vec!["dict(aXX=b)"]
    );
}

// --- nothing to mutate ---

#[test]
fn no_mutants_for_untouchable_code() {
    let sources = [
        "import os\n",
        "from copy import deepcopy\n",
        "\"\"\"docstring\"\"\"\n",
        "for x in y:\n    pass\n",
        "foo.bar\n",
        "a[None]\n",
        "a(None)\n",
        "x: int\n",
        "def f(*args, **kwargs): pass\n",
        "print(*args)\n",
        "",
    ];
    for source in sources {
        assert_eq!(mutants(source), Vec::<String>::new(), "source: {source:?}");
    }
}

#[test]
fn pragma_line_is_skipped() {
    assert!(mutants("x = 1  # pragma: no mutate\n").is_empty());
    assert_eq!(
        mutants("x = 1  # pragma: no mutate\ny = 2\n"),
        vec![
            "x = 1  # pragma: no mutate\ny = 3\n",
            "x = 1  # pragma: no mutate\ny = None\n",
        ]
    );
}

#[test]
fn dunder_metadata_is_skipped() {
    assert!(mutants("__version__ = '1.0'\n").is_empty());
    assert!(mutants("__all__ = ['a']\n").is_empty());
    assert_eq!(mutants("__secret__ = 1\n").len(), 2);
}

// --- identity ---

#[test]
fn ids_count_per_line() {
    let ids = ids("a = 1\nb = 2\n");
    assert_eq!(
        ids,
        vec![
            MutationId::new("a = 1", 0, 0),
            MutationId::new("a = 1", 1, 0),
            MutationId::new("b = 2", 0, 1),
            MutationId::new("b = 2", 1, 1),
        ]
    );
}

#[test]
fn ids_are_deterministic() {
    let source = "def f(a, b):\n    if a > b:\n        return a - b\n    return dict(x=a)\n";
    assert_eq!(ids(source), ids(source));
    assert!(!ids(source).is_empty());
}

#[test]
fn mutants_always_differ_from_source() {
    let source = "def f(a, b):\n    c = a * 2 ** b\n    return c if c else None\n";
    for mutated in mutants(source) {
        assert_ne!(mutated, source);
    }
}

#[test]
fn mutant_can_be_regenerated_from_its_id() {
    let frontend = PythonFrontend;
    let rules = RuleTable::python(&[]);
    let policy = ExclusionPolicy::new();
    let mutator = Mutator::new(&frontend, &rules, &policy);
    let source = "a = 1\nb = a + 2\n";
    let id = MutationId::new("b = a + 2", 1, 1);
    let mutant = mutator
        .mutant(Utf8Path::new("test.py"), source, &id)
        .unwrap()
        .unwrap();
    assert_eq!(mutant.mutated_source, "a = 1\nb = a + 3\n");

    let gone = MutationId::new("c = 3", 0, 2);
    assert!(mutator.mutant(Utf8Path::new("test.py"), source, &gone).unwrap().is_none());
}

#[test]
fn excluded_lines_leave_other_ids_alone() {
    let source = "a = 1\nb = 2\n";
    let rules = RuleTable::python(&[]);
    let frontend = PythonFrontend;
    let policy = ExclusionPolicy::with_filter(|_: &Utf8Path, line: usize| line == 2);
    let mutator = Mutator::new(&frontend, &rules, &policy);
    let filtered = mutator.list_mutations(Utf8Path::new("test.py"), source).unwrap();
    assert_eq!(
        filtered,
        vec![MutationId::new("b = 2", 0, 1), MutationId::new("b = 2", 1, 1)]
    );
    assert_eq!(filtered[..], ids(source)[2..]);
}

#[test]
fn filter_excluding_everything_yields_nothing() {
    let rules = RuleTable::python(&[]);
    let policy = ExclusionPolicy::with_filter(|_: &Utf8Path, _: usize| false);
    assert!(mutants_with("x = 1 + 2\n", &rules, &policy).is_empty());
}

#[test]
fn walking_counts_yielded_mutants() {
    let frontend = PythonFrontend;
    let rules = RuleTable::python(&[]);
    let policy = ExclusionPolicy::new();
    let mutator = Mutator::new(&frontend, &rules, &policy);
    let mut walk = mutator.mutants(Utf8Path::new("test.py"), "x = 1 + 2\n").unwrap();
    assert_eq!(walk.yielded(), 0);
    let all: Vec<_> = walk.by_ref().collect();
    assert_eq!(all.len(), 4);
    assert_eq!(walk.yielded(), 4);
}

#[test]
fn syntax_errors_are_reported() {
    let frontend = PythonFrontend;
    let rules = RuleTable::python(&[]);
    let policy = ExclusionPolicy::new();
    let mutator = Mutator::new(&frontend, &rules, &policy);
    let result = mutator.mutants(Utf8Path::new("bad.py"), "def (:\n");
    assert!(matches!(result, Err(Error::Syntax { .. })));
}
