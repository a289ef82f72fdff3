use mutator::operators::{
    RuleTable, keyword_mutation, name_mutation, number_mutation, operator_mutation, string_mutation,
};

// --- numbers ---

#[test]
fn decimal_numbers_gain_one() {
    assert_eq!(number_mutation("0").as_deref(), Some("1"));
    assert_eq!(number_mutation("41").as_deref(), Some("42"));
    assert_eq!(number_mutation("1_000").as_deref(), Some("1001"));
}

#[test]
fn other_bases_come_back_decimal() {
    assert_eq!(number_mutation("0x10").as_deref(), Some("17"));
    assert_eq!(number_mutation("0XfF").as_deref(), Some("256"));
    assert_eq!(number_mutation("0o17").as_deref(), Some("16"));
    assert_eq!(number_mutation("0b101").as_deref(), Some("6"));
    assert_eq!(number_mutation("017").as_deref(), Some("16"));
}

#[test]
fn floats_gain_one() {
    assert_eq!(number_mutation("1.5").as_deref(), Some("2.5"));
    assert_eq!(number_mutation(".5").as_deref(), Some("1.5"));
    assert_eq!(number_mutation("1e3").as_deref(), Some("1001.0"));
    assert_eq!(number_mutation("1e16").as_deref(), Some("1e+16"));
}

#[test]
fn suffix_is_kept() {
    assert_eq!(number_mutation("10j").as_deref(), Some("11j"));
    assert_eq!(number_mutation("1.5J").as_deref(), Some("2.5J"));
    assert_eq!(number_mutation("10L").as_deref(), Some("11L"));
}

#[test]
fn garbage_is_not_a_number() {
    assert_eq!(number_mutation("abc"), None);
    assert_eq!(number_mutation("0xZZ"), None);
}

// --- strings ---

#[test]
fn strings_are_wrapped_in_xx() {
    assert_eq!(string_mutation("'a'").as_deref(), Some("'XXaXX'"));
    assert_eq!(string_mutation("\"\"").as_deref(), Some("\"XXXX\""));
    assert_eq!(string_mutation("b'x'").as_deref(), Some("b'XXxXX'"));
    assert_eq!(string_mutation("rb\"\\d\"").as_deref(), Some("rb\"XX\\dXX\""));
}

#[test]
fn triple_quoted_strings_are_left_alone() {
    assert_eq!(string_mutation("\"\"\"doc\"\"\""), None);
    assert_eq!(string_mutation("'''doc'''"), None);
    assert_eq!(string_mutation("r'''doc'''"), None);
}

// --- keywords, operators, names ---

#[test]
fn keywords_swap() {
    assert_eq!(keyword_mutation("not").as_deref(), Some(""));
    assert_eq!(keyword_mutation("is").as_deref(), Some("is not"));
    assert_eq!(keyword_mutation("in").as_deref(), Some("not in"));
    assert_eq!(keyword_mutation("break").as_deref(), Some("continue"));
    assert_eq!(keyword_mutation("continue").as_deref(), Some("break"));
    assert_eq!(keyword_mutation("True").as_deref(), Some("False"));
    assert_eq!(keyword_mutation("False").as_deref(), Some("True"));
    assert_eq!(keyword_mutation("pass"), None);
    assert_eq!(keyword_mutation("None"), None);
}

#[test]
fn operators_swap() {
    let cases = [
        ("+", "-"),
        ("-", "+"),
        ("*", "/"),
        ("/", "*"),
        ("//", "/"),
        ("%", "/"),
        ("**", "*"),
        ("~", ""),
        ("<<", ">>"),
        ("&", "|"),
        ("^", "&"),
        ("+=", "-="),
        ("**=", "*="),
        ("<", "<="),
        (">=", ">"),
        ("==", "!="),
        ("!=", "=="),
        ("<>", "=="),
    ];
    for (from, to) in cases {
        assert_eq!(operator_mutation(from).as_deref(), Some(to), "operator {from}");
    }
    assert_eq!(operator_mutation("="), None);
    assert_eq!(operator_mutation("."), None);
    assert_eq!(operator_mutation("->"), None);
}

#[test]
fn names_swap() {
    assert_eq!(name_mutation("deepcopy").as_deref(), Some("copy"));
    assert_eq!(name_mutation("True").as_deref(), Some("False"));
    assert_eq!(name_mutation("copy"), None);
}

// --- table ---

#[test]
fn python_table_covers_token_categories() {
    let table = RuleTable::python(&[]);
    for kind in ["number", "string", "keyword", "operator", "name"] {
        assert!(!table.rules_for(kind).is_empty(), "no rules for {kind}");
    }
    for kind in [
        "boolean_operator",
        "lambda",
        "assignment",
        "decorator",
        "subscript",
        "argument_list",
        "keyword_argument",
    ] {
        assert!(!table.rules_for(kind).is_empty(), "no rules for {kind}");
    }
}
