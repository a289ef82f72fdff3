//! Depth-first walk over a syntax tree, yielding one [`Mutant`] per rule
//! application.
//!
//! Children are visited before their parent's own rules, so the innermost
//! expression on a line mutates first. Each mutation is written into the
//! tree, the whole source is regenerated, and the tree is restored before
//! the walk moves on.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::Result;
use crate::exclusion::{ExclusionPolicy, FileExclusions};
use crate::mutants::{Mutant, MutationId};
use crate::operators::{Rule, RuleContext, RuleTable};
use crate::parser::Frontend;
use crate::tree::{NodeId, SyntaxTree};

/// Ties a grammar, a rule table and an exclusion policy together.
pub struct Mutator<'a> {
    frontend: &'a dyn Frontend,
    rules: &'a RuleTable,
    policy: &'a ExclusionPolicy,
}

impl<'a> Mutator<'a> {
    pub fn new(frontend: &'a dyn Frontend, rules: &'a RuleTable, policy: &'a ExclusionPolicy) -> Self {
        Mutator {
            frontend,
            rules,
            policy,
        }
    }

    pub fn frontend(&self) -> &'a dyn Frontend {
        self.frontend
    }

    /// Parses `source` and returns a lazy stream of its mutants. Walking
    /// again requires calling this again.
    pub fn mutants(&self, filename: &Utf8Path, source: &str) -> Result<Mutations<'a>> {
        let tree = self.frontend.parse(filename, source)?;
        let root = tree.root();
        Ok(Mutations {
            tree,
            frontend: self.frontend,
            rules: self.rules,
            exclusions: self.policy.for_file(filename, source),
            filename: filename.to_path_buf(),
            source: Arc::from(source),
            frames: vec![Frame {
                node: root,
                phase: Phase::Children(0),
            }],
            stack: Vec::new(),
            line_number: 0,
            index: 0,
            yielded: 0,
        })
    }

    pub fn list_mutations(&self, filename: &Utf8Path, source: &str) -> Result<Vec<MutationId>> {
        Ok(self.mutants(filename, source)?.map(|m| m.id).collect())
    }

    /// Regenerates the single mutant with this id, if the source still has it.
    pub fn mutant(&self, filename: &Utf8Path, source: &str, id: &MutationId) -> Result<Option<Mutant>> {
        Ok(self.mutants(filename, source)?.find(|m| m.id == *id))
    }
}

struct Frame {
    node: NodeId,
    phase: Phase,
}

#[derive(Clone, Copy)]
enum Phase {
    /// Next child to visit.
    Children(usize),
    /// Next rule to apply to the node itself.
    Rules(usize),
}

/// Iterator over a file's mutants. Uses an explicit stack so deeply nested
/// expressions cannot overflow the call stack.
pub struct Mutations<'a> {
    tree: SyntaxTree,
    frontend: &'a dyn Frontend,
    rules: &'a RuleTable,
    exclusions: FileExclusions<'a>,
    filename: Utf8PathBuf,
    source: Arc<str>,
    frames: Vec<Frame>,
    /// Ancestors of the node being visited, root excluded.
    stack: Vec<NodeId>,
    line_number: usize,
    index: usize,
    yielded: usize,
}

impl Mutations<'_> {
    /// Mutants produced so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn enter(&mut self, node: NodeId) {
        if self.frontend.is_pass_through(&self.tree, node) {
            return;
        }
        let line = self.tree.start(node).line;
        if line != self.line_number {
            self.line_number = line;
            self.index = 0;
        }
        self.stack.push(node);
        self.frames.push(Frame {
            node,
            phase: Phase::Children(0),
        });
    }

    fn leave(&mut self) {
        if self.frames.pop().is_some() && !self.frames.is_empty() {
            self.stack.pop();
        }
    }

    /// Runs one rule on `node`. Every candidate takes an index on the
    /// current line, whether it is excluded or not.
    fn apply(&mut self, node: NodeId, rule: Rule) -> Option<Mutant> {
        let line_number = self.line_number;
        let mutated = match rule {
            Rule::Value(rewrite) => {
                let current = self.tree.value(node)?;
                let ctx = RuleContext {
                    tree: &self.tree,
                    node,
                    stack: &self.stack,
                    line_number,
                    dict_synonyms: self.rules.dict_synonyms(),
                };
                let new_value = rewrite(current, &ctx).filter(|new| new != current)?;
                if self.skip_excluded() {
                    return None;
                }
                let original = self.tree.replace_value(node, new_value)?;
                let code = self.render();
                self.tree.replace_value(node, original);
                code
            }
            Rule::Children(rewrite) => {
                let ctx = RuleContext {
                    tree: &self.tree,
                    node,
                    stack: &self.stack,
                    line_number,
                    dict_synonyms: self.rules.dict_synonyms(),
                };
                let replacements = rewrite(self.tree.children(node), &ctx)?;
                if self.skip_excluded() {
                    return None;
                }
                let mark = self.tree.len();
                let start = self.tree.start(node);
                let fresh = self.tree.materialize(replacements, start);
                let original = self.tree.replace_children(node, fresh);
                let code = self.render();
                self.tree.replace_children(node, original);
                self.tree.truncate(mark);
                code
            }
        };

        let id = MutationId::new(self.exclusions.line(line_number), self.index, line_number);
        self.index += 1;
        if mutated == *self.source {
            return None;
        }
        self.yielded += 1;
        Some(Mutant::new(self.filename.clone(), id, self.source.clone(), mutated))
    }

    fn skip_excluded(&mut self) -> bool {
        let excluded = self.exclusions.is_excluded(self.line_number);
        if excluded {
            self.index += 1;
        }
        excluded
    }

    fn render(&self) -> String {
        collapse_double_not(self.tree.code())
    }
}

/// `is` -> `is not` next to a `not` can produce a doubled negation.
fn collapse_double_not(code: String) -> String {
    if code.contains(" not not ") {
        code.replace(" not not ", " ")
    } else {
        code
    }
}

impl Iterator for Mutations<'_> {
    type Item = Mutant;

    fn next(&mut self) -> Option<Mutant> {
        loop {
            let is_root = self.frames.len() == 1;
            let frame = self.frames.last_mut()?;
            let node = frame.node;
            match frame.phase {
                Phase::Children(i) => match self.tree.children(node).get(i).copied() {
                    // Nothing after `->` is mutated.
                    Some(child) if self.frontend.is_return_arrow(&self.tree, child) => {
                        frame.phase = Phase::Rules(0);
                    }
                    Some(child) => {
                        frame.phase = Phase::Children(i + 1);
                        self.enter(child);
                    }
                    None => frame.phase = Phase::Rules(0),
                },
                Phase::Rules(i) => {
                    let rule = if is_root {
                        None
                    } else {
                        self.rules.rules_for(self.tree.kind(node)).get(i).copied()
                    };
                    match rule {
                        Some(rule) => {
                            frame.phase = Phase::Rules(i + 1);
                            if let Some(mutant) = self.apply(node, rule) {
                                return Some(mutant);
                            }
                        }
                        None => self.leave(),
                    }
                }
            }
        }
    }
}
