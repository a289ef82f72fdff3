use std::collections::HashMap;

use crate::tree::{NodeId, Replacement, SyntaxTree};

/// Rewrites a leaf's scalar value. `None` means "no mutation here".
pub type ValueRule = fn(&str, &RuleContext<'_>) -> Option<String>;

/// Rewrites a composite node's child list.
pub type ChildrenRule = fn(&[NodeId], &RuleContext<'_>) -> Option<Vec<Replacement>>;

/// The node attribute a rule rewrites. Rules on one node run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    Children,
    Value,
}

#[derive(Clone, Copy)]
pub enum Rule {
    Children(ChildrenRule),
    Value(ValueRule),
}

impl Rule {
    pub fn attribute(&self) -> Attribute {
        match self {
            Rule::Children(_) => Attribute::Children,
            Rule::Value(_) => Attribute::Value,
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rule::{:?}", self.attribute())
    }
}

/// What a rule can see while it runs.
pub struct RuleContext<'a> {
    pub tree: &'a SyntaxTree,
    pub node: NodeId,
    /// Ancestors of `node`, outermost first, ending with `node` itself.
    pub stack: &'a [NodeId],
    /// Zero-based line the walker is on.
    pub line_number: usize,
    pub dict_synonyms: &'a [String],
}

impl RuleContext<'_> {
    /// Node `depth` levels up the stack; 0 is the node being mutated.
    pub fn ancestor(&self, depth: usize) -> Option<NodeId> {
        let len = self.stack.len();
        if depth >= len {
            return None;
        }
        Some(self.stack[len - 1 - depth])
    }

    pub fn ancestor_kind(&self, depth: usize) -> Option<&str> {
        self.ancestor(depth).map(|id| self.tree.kind(id))
    }

    pub fn parent_kind(&self) -> Option<&str> {
        self.ancestor_kind(1)
    }
}

/// Maps node types to their rewrite rules.
///
/// The walker only ever asks for `rules_for(kind)`, so a new grammar or a
/// new rule is a table entry, never a walker change.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, Vec<Rule>>,
    dict_synonyms: Vec<String>,
}

impl RuleTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The Python catalog. `dict` is always a dict synonym.
    pub fn python(dict_synonyms: &[String]) -> Self {
        let mut table = RuleTable::empty();
        table.set_dict_synonyms(dict_synonyms);

        table.insert("operator", Rule::Value(operator_rule));
        table.insert("keyword", Rule::Value(keyword_rule));
        table.insert("number", Rule::Value(|value, _| number_mutation(value)));
        table.insert("string", Rule::Value(|value, _| string_mutation(value)));
        table.insert("name", Rule::Value(|value, _| name_mutation(value)));

        table.insert("boolean_operator", Rule::Children(and_or_rule));
        table.insert("lambda", Rule::Children(lambda_rule));
        table.insert("assignment", Rule::Children(assignment_rule));
        table.insert("decorator", Rule::Children(decorator_rule));
        table.insert("subscript", Rule::Children(subscript_rule));
        table.insert("argument_list", Rule::Children(argument_list_rule));
        table.insert("keyword_argument", Rule::Children(dict_keyword_rule));
        table
    }

    /// Adds a rule, replacing any existing rule for the same attribute.
    pub fn insert(&mut self, kind: &str, rule: Rule) {
        let rules = self.rules.entry(kind.to_string()).or_default();
        rules.retain(|existing| existing.attribute() != rule.attribute());
        rules.push(rule);
        rules.sort_by_key(Rule::attribute);
    }

    pub fn rules_for(&self, kind: &str) -> &[Rule] {
        self.rules.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_dict_synonyms(&mut self, synonyms: &[String]) {
        let mut all = vec!["dict".to_string()];
        for synonym in synonyms {
            let synonym = synonym.trim();
            if !synonym.is_empty() && !all.iter().any(|s| s == synonym) {
                all.push(synonym.to_string());
            }
        }
        self.dict_synonyms = all;
    }

    pub fn dict_synonyms(&self) -> &[String] {
        &self.dict_synonyms
    }
}

// --- Leaf values ---

/// Adds one to a numeric literal, keeping its suffix. Non-decimal bases come
/// back in decimal.
pub fn number_mutation(value: &str) -> Option<String> {
    let (digits, suffix) = match value.char_indices().last() {
        Some((i, c)) if matches!(c, 'j' | 'J' | 'l' | 'L') => (&value[..i], &value[i..]),
        _ => (value, ""),
    };
    let cleaned = digits.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();

    let (radix, body) = if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1
        && lower.starts_with('0')
        && lower.bytes().all(|b| b.is_ascii_digit())
    {
        // Legacy octal, e.g. `0777`.
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    let mut result = match u128::from_str_radix(body, radix) {
        Ok(n) => n.checked_add(1)?.to_string(),
        Err(_) if radix == 10 => float_repr(body.parse::<f64>().ok()? + 1.0)?,
        Err(_) => return None,
    };
    if !result.ends_with(suffix) {
        result.push_str(suffix);
    }
    Some(result)
}

/// Shortest round-tripping float text, in the form Python prints it.
fn float_repr(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let repr = format!("{value:?}");
    let Some((mantissa, exponent)) = repr.split_once('e') else {
        return Some(repr);
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    Some(format!("{mantissa}e{sign}{digits:0>2}"))
}

/// Wraps a string literal's content in `XX`, keeping prefix characters.
/// Triple-quoted strings are left alone.
pub fn string_mutation(value: &str) -> Option<String> {
    let quote = value.find(['"', '\''])?;
    let (prefix, literal) = value.split_at(quote);
    if literal.starts_with("\"\"\"") || literal.starts_with("'''") || literal.len() < 2 {
        return None;
    }
    let delimiter = &literal[..1];
    let inner = &literal[1..literal.len() - 1];
    Some(format!("{prefix}{delimiter}XX{inner}XX{delimiter}"))
}

pub fn keyword_mutation(value: &str) -> Option<String> {
    let replacement = match value {
        "not" => "",
        "is" => "is not",
        "in" => "not in",
        "break" => "continue",
        "continue" => "break",
        "True" => "False",
        "False" => "True",
        _ => return None,
    };
    Some(replacement.to_string())
}

// Membership and identity tests are already covered by their compound
// form, and flipping `in` inside a `for` header breaks the syntax.
const KEYWORD_FROZEN_PARENTS: &[&str] = &["not in", "is not", "for_statement", "for_in_clause"];

fn keyword_rule(value: &str, ctx: &RuleContext<'_>) -> Option<String> {
    if matches!(value, "in" | "is")
        && ctx.parent_kind().is_some_and(|kind| KEYWORD_FROZEN_PARENTS.contains(&kind))
    {
        return None;
    }
    keyword_mutation(value)
}

pub fn operator_mutation(value: &str) -> Option<String> {
    let replacement = match value {
        "+" => "-",
        "-" => "+",
        "*" => "/",
        "/" => "*",
        "//" => "/",
        "%" => "/",
        "<<" => ">>",
        ">>" => "<<",
        "&" => "|",
        "|" => "&",
        "^" => "&",
        "**" => "*",
        "~" => "",
        "+=" => "-=",
        "-=" => "+=",
        "*=" => "/=",
        "/=" => "*=",
        "//=" => "/=",
        "%=" => "/=",
        "<<=" => ">>=",
        ">>=" => "<<=",
        "&=" => "|=",
        "|=" => "&=",
        "^=" => "&=",
        "**=" => "*=",
        "<" => "<=",
        "<=" => "<",
        ">" => ">=",
        ">=" => ">",
        "==" => "!=",
        "!=" => "==",
        "<>" => "==",
        _ => return None,
    };
    Some(replacement.to_string())
}

// Places where `*`, `**`, `/` or `|` are syntax rather than arithmetic.
const NON_ARITHMETIC_PARENTS: &[&str] = &[
    "parameters",
    "lambda_parameters",
    "list_splat",
    "dictionary_splat",
    "list_splat_pattern",
    "dictionary_splat_pattern",
    "splat_pattern",
    "keyword_separator",
    "positional_separator",
    "union_pattern",
    "wildcard_import",
    "import_from_statement",
];

fn operator_rule(value: &str, ctx: &RuleContext<'_>) -> Option<String> {
    if ctx
        .parent_kind()
        .is_some_and(|kind| NON_ARITHMETIC_PARENTS.contains(&kind))
    {
        return None;
    }
    operator_mutation(value)
}

pub fn name_mutation(value: &str) -> Option<String> {
    match value {
        "True" => Some("False".to_string()),
        "False" => Some("True".to_string()),
        "deepcopy" => Some("copy".to_string()),
        _ => None,
    }
}

// --- Child lists ---

fn keep_all_but(children: &[NodeId], target: NodeId, replacement: Replacement) -> Vec<Replacement> {
    let mut replacement = Some(replacement);
    children
        .iter()
        .map(|&child| match replacement.take_if(|_| child == target) {
            Some(new) => new,
            None => Replacement::Keep(child),
        })
        .collect()
}

fn and_or_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let tree = ctx.tree;
    let op = children.iter().copied().find(|&child| {
        tree.kind(child) == "keyword" && matches!(tree.value(child), Some("and" | "or"))
    })?;
    let swapped = if tree.value(op) == Some("and") { "or" } else { "and" };
    let leaf = Replacement::substitute(tree, op, "keyword", swapped);
    Some(keep_all_but(children, op, leaf))
}

fn lambda_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let body = *children.last()?;
    let (kind, value) = if ctx.tree.text(body) == "None" {
        ("number", "0")
    } else {
        ("keyword", "None")
    };
    let leaf = Replacement::substitute(ctx.tree, body, kind, value);
    Some(keep_all_but(children, body, leaf))
}

fn assignment_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let tree = ctx.tree;
    let equals = children
        .iter()
        .position(|&child| tree.kind(child) == "operator" && tree.value(child) == Some("="))?;
    let rhs = *children.get(equals + 1)?;
    let (kind, value) = if tree.text(rhs) == "None" {
        ("number", "7")
    } else {
        ("keyword", "None")
    };
    let leaf = Replacement::substitute(tree, rhs, kind, value);
    Some(keep_all_but(children, rhs, leaf))
}

/// Drops the decorator, keeping the whitespace in front of it so the
/// following line stays where it was.
fn decorator_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let first = *children.first()?;
    Some(vec![Replacement::substitute(ctx.tree, first, "decorator", "")])
}

fn subscript_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let tree = ctx.tree;
    let [_, open, index, close] = children else {
        return None;
    };
    if tree.value(*open) != Some("[") || tree.value(*close) != Some("]") {
        return None;
    }
    if tree.kind(*index) != "name" {
        return None;
    }
    let leaf = Replacement::substitute(tree, *index, "keyword", "None");
    Some(keep_all_but(children, *index, leaf))
}

/// `f(a, b, c)` becomes `f(None, b, c)` when the first argument is a bare
/// name and there are at least three arguments.
fn argument_list_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let tree = ctx.tree;
    let inner = match children {
        [open, inner @ .., close]
            if tree.value(*open) == Some("(") && tree.value(*close) == Some(")") =>
        {
            inner
        }
        _ => return None,
    };
    if inner.len() <= 3 {
        return None;
    }
    let first = inner[0];
    if tree.kind(first) != "name" {
        return None;
    }
    let leaf = Replacement::substitute(tree, first, "keyword", "None");
    Some(keep_all_but(children, first, leaf))
}

/// `dict(a=b)` becomes `dict(aXX=b)`.
fn dict_keyword_rule(children: &[NodeId], ctx: &RuleContext<'_>) -> Option<Vec<Replacement>> {
    let tree = ctx.tree;
    // keyword_argument <- argument_list <- call
    let call = ctx.ancestor(2)?;
    if tree.kind(call) != "call" {
        return None;
    }
    let function = *tree.children(call).first()?;
    let is_dict_call = tree.kind(function) == "name"
        && tree
            .value(function)
            .is_some_and(|name| ctx.dict_synonyms.iter().any(|s| s == name));
    if !is_dict_call {
        return None;
    }

    let key = *children.first()?;
    let name = tree.value(key)?;
    let leaf = Replacement::substitute(tree, key, "name", &format!("{name}XX"));
    Some(keep_all_but(children, key, leaf))
}
