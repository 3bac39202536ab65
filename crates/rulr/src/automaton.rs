//! LR(1) item sets and the canonical automaton.

use crate::{
    follow::FollowSets,
    grammar::{Grammar, Symbol},
    types::{Map, Set},
    util::{display_fn, display_spaced},
};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AutomatonError {
    /// Reachable only if an unvalidated grammar leaks into the builder.
    #[error("closure/goto reached undeclared symbol {0:?}")]
    UndeclaredSymbol(Symbol),
}

/// Identifier of a production rule inside an [`AugmentedGrammar`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleId {
    raw: u16,
}

impl RuleId {
    /// The synthetic `S' := S` rule.
    pub const ACCEPT: Self = Self::new(0);

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    fn index(self) -> usize {
        usize::from(self.raw)
    }
}

/// A production rule of the augmented grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    head: Symbol,
    body: Vec<Symbol>,
}

impl Rule {
    pub fn head(&self) -> &Symbol {
        &self.head
    }

    pub fn body(&self) -> &[Symbol] {
        &self.body
    }
}

/// A dotted production: `rule` with `dot` symbols of the body already matched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub rule: RuleId,
    pub dot: usize,
}

impl Item {
    pub fn is_completed(&self, grammar: &AugmentedGrammar) -> bool {
        self.dot >= grammar.rule(self.rule).body().len()
    }

    // `"(LHS := R1 . R2)"`
    pub fn display<'g>(&'g self, g: &'g AugmentedGrammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rule = g.rule(self.rule);
            write!(f, "({} :=", rule.head())?;
            for (i, symbol) in rule.body().iter().enumerate() {
                if i == self.dot {
                    f.write_str(" .")?;
                }
                write!(f, " {}", symbol)?;
            }
            if self.dot == rule.body().len() {
                f.write_str(" .")?;
            }
            f.write_str(")")
        })
    }
}

/// The items of one head within a state, plus their shared lookahead set.
///
/// Lookaheads are tracked per (state, head) pair, not per item: every item
/// under one head shares one set. This coarsening is part of the table
/// construction contract; see DESIGN.md.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadItems {
    items: Set<Item>,
    lookaheads: Set<Symbol>,
}

impl HeadItems {
    pub fn items(&self) -> &Set<Item> {
        &self.items
    }

    pub fn lookaheads(&self) -> &Set<Symbol> {
        &self.lookaheads
    }
}

/// One node of the automaton: live items grouped by their head symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    entries: Map<Symbol, HeadItems>,
}

impl State {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Symbol, &HeadItems)> + '_ {
        self.entries.iter()
    }

    pub fn entry(&self, head: &Symbol) -> Option<&HeadItems> {
        self.entries.get(head)
    }

    /// Union `items` and `lookaheads` into the entry for `head`.
    pub(crate) fn merge(
        &mut self,
        head: Symbol,
        items: Set<Item>,
        lookaheads: Set<Symbol>,
    ) -> bool {
        let entry = self.entries.entry(head).or_default();
        let mut changed = false;
        for item in items {
            changed |= entry.items.insert(item);
        }
        for lookahead in lookaheads {
            changed |= entry.lookaheads.insert(lookahead);
        }
        changed
    }
}

/// A grammar extended with the synthetic start variable and its accept rule,
/// addressed through a flat rule arena.
#[derive(Debug)]
pub struct AugmentedGrammar {
    grammar: Grammar,
    follow: FollowSets,
    start_variable: Symbol,
    rules: Vec<Rule>,
    by_head: Map<Symbol, Vec<RuleId>>,
}

impl AugmentedGrammar {
    pub fn new(grammar: Grammar) -> Self {
        let follow = FollowSets::compute(&grammar);

        // The synthetic start name must not collide with a declared symbol.
        let mut name = format!("{}'", grammar.start());
        let start_variable = loop {
            let candidate = Symbol::new(name.clone());
            if !grammar.variables().contains(&candidate)
                && !grammar.terminals().contains(&candidate)
            {
                break candidate;
            }
            name.push('\'');
        };

        let mut rules = vec![Rule {
            head: start_variable.clone(),
            body: vec![grammar.start().clone()],
        }];
        let mut by_head: Map<Symbol, Vec<RuleId>> = Map::default();
        by_head.insert(start_variable.clone(), vec![RuleId::ACCEPT]);
        for (head, bodies) in grammar.productions() {
            for body in bodies {
                let id = RuleId::new(rules.len() as u16);
                rules.push(Rule {
                    head: head.clone(),
                    body: body.clone(),
                });
                by_head.entry(head.clone()).or_default().push(id);
            }
        }

        Self {
            grammar,
            follow,
            start_variable,
            rules,
            by_head,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn follow(&self) -> &FollowSets {
        &self.follow
    }

    /// The synthetic start variable `S'`.
    pub fn start_variable(&self) -> &Symbol {
        &self.start_variable
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> + '_ {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (RuleId::new(i as u16), rule))
    }

    pub fn rules_of(&self, head: &Symbol) -> &[RuleId] {
        self.by_head.get(head).map_or(&[], |ids| ids)
    }

    /// The symbol at the dot, or `None` for a completed item.
    pub fn read_symbol(&self, item: &Item) -> Option<&Symbol> {
        self.rule(item.rule).body().get(item.dot)
    }

    /// State 0: the closure of `S' := . S` with lookahead `{$eoi}`.
    pub fn start_state(&self) -> Result<State, AutomatonError> {
        let mut seed = State::default();
        seed.merge(
            self.start_variable.clone(),
            std::iter::once(Item {
                rule: RuleId::ACCEPT,
                dot: 0,
            })
            .collect(),
            std::iter::once(Symbol::eos()).collect(),
        );
        self.closure(&seed)
    }

    /// Expand `state` until item membership no longer changes.
    ///
    /// Every variable at a dot contributes all of its productions with the
    /// dot at position 0; the entry introduced for a variable `B` carries
    /// FOLLOW(B) as its lookahead set.
    pub fn closure(&self, state: &State) -> Result<State, AutomatonError> {
        let mut closed = state.clone();
        let mut changed = true;
        while changed {
            changed = false;

            let mut wanted: Set<Symbol> = Set::default();
            for (_, entry) in closed.entries() {
                for item in entry.items() {
                    let Some(symbol) = self.read_symbol(item) else {
                        continue;
                    };
                    if self.grammar.is_variable(symbol) {
                        wanted.insert(symbol.clone());
                    } else if !self.grammar.is_terminal(symbol) {
                        return Err(AutomatonError::UndeclaredSymbol(symbol.clone()));
                    }
                }
            }

            for variable in wanted {
                let items: Set<Item> = self
                    .rules_of(&variable)
                    .iter()
                    .map(|&rule| Item { rule, dot: 0 })
                    .collect();
                if items.is_empty() {
                    continue;
                }
                let lookaheads = self.follow.get(&variable).cloned().unwrap_or_default();
                changed |= closed.merge(variable, items, lookaheads);
            }
        }
        Ok(closed)
    }

    /// Advance every item whose dot reads `symbol`, then close the result.
    ///
    /// An empty result means there is no transition from `state` on `symbol`.
    pub fn goto(&self, state: &State, symbol: &Symbol) -> Result<State, AutomatonError> {
        let mut moved = State::default();
        for (head, entry) in state.entries() {
            let advanced: Set<Item> = entry
                .items()
                .iter()
                .filter(|item| self.read_symbol(item) == Some(symbol))
                .map(|item| Item {
                    rule: item.rule,
                    dot: item.dot + 1,
                })
                .collect();
            if advanced.is_empty() {
                continue;
            }
            moved.merge(head.clone(), advanced, entry.lookaheads().clone());
        }

        if moved.is_empty() {
            return Ok(moved);
        }
        self.closure(&moved)
    }
}

/// The canonical collection of states with its transition map.
#[derive(Debug, PartialEq)]
pub struct Automaton {
    pub(crate) states: Vec<State>,
    pub(crate) transitions: Map<(usize, Symbol), usize>,
}

impl Automaton {
    /// Explore the state graph from state 0 until a full pass adds nothing.
    ///
    /// Each pass iterates a snapshot of the states discovered so far, in
    /// order, and visits symbols terminals-first in declaration order, so
    /// state numbering is reproducible run to run. A goto result is reused
    /// only when an existing state is exactly equal (same heads, same items
    /// per head, same lookaheads per head).
    pub fn build(grammar: &AugmentedGrammar) -> Result<Self, AutomatonError> {
        let symbols: Vec<Symbol> = grammar
            .grammar()
            .terminals()
            .iter()
            .chain(grammar.grammar().variables())
            .cloned()
            .collect();

        let mut states = vec![grammar.start_state()?];
        let mut transitions: Map<(usize, Symbol), usize> = Map::default();

        loop {
            let mut changed = false;
            let snapshot = states.len();
            for i in 0..snapshot {
                for symbol in &symbols {
                    if transitions.contains_key(&(i, symbol.clone())) {
                        continue;
                    }
                    let next = grammar.goto(&states[i], symbol)?;
                    if next.is_empty() {
                        continue;
                    }
                    let j = match states.iter().position(|state| *state == next) {
                        Some(j) => j,
                        None => {
                            states.push(next);
                            states.len() - 1
                        }
                    };
                    transitions.insert((i, symbol.clone()), j);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        tracing::debug!(
            states = states.len(),
            transitions = transitions.len(),
            "canonical automaton constructed"
        );

        Ok(Self {
            states,
            transitions,
        })
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transition(&self, from: usize, symbol: &Symbol) -> Option<usize> {
        self.transitions.get(&(from, symbol.clone())).copied()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (usize, &Symbol, usize)> + '_ {
        self.transitions
            .iter()
            .map(|((from, symbol), to)| (*from, symbol, *to))
    }

    pub fn display<'g>(&'g self, g: &'g AugmentedGrammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, state) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### state {:02}", i)?;
                writeln!(f, "## items")?;
                for (_, entry) in state.entries() {
                    for item in entry.items() {
                        writeln!(
                            f,
                            "- {}  [{}]",
                            item.display(g),
                            display_spaced(entry.lookaheads().iter())
                        )?;
                    }
                }
                writeln!(f, "## transitions")?;
                for (from, symbol, to) in self.transitions() {
                    if from == i {
                        writeln!(f, "- {} => {:02}", symbol, to)?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(raw: &str) -> Symbol {
        Symbol::new(raw)
    }

    fn expr_grammar() -> AugmentedGrammar {
        AugmentedGrammar::new(
            Grammar::new(
                [sym("E"), sym("T")],
                [sym("+"), sym("id")],
                [
                    (sym("E"), vec![sym("E"), sym("+"), sym("T")]),
                    (sym("E"), vec![sym("T")]),
                    (sym("T"), vec![sym("id")]),
                ],
                sym("E"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn synthetic_start_is_fresh() {
        let grammar = expr_grammar();
        assert_eq!(grammar.start_variable(), &sym("E'"));

        let clashing = AugmentedGrammar::new(
            Grammar::new(
                [sym("E"), sym("E'")],
                [sym("id")],
                [
                    (sym("E"), vec![sym("E'")]),
                    (sym("E'"), vec![sym("id")]),
                ],
                sym("E"),
            )
            .unwrap(),
        );
        assert_eq!(clashing.start_variable(), &sym("E''"));
    }

    #[test]
    fn start_state_closure() {
        let grammar = expr_grammar();
        let state0 = grammar.start_state().unwrap();

        let accept = state0.entry(&sym("E'")).unwrap();
        assert_eq!(accept.items().len(), 1);
        assert!(accept.items().contains(&Item {
            rule: RuleId::ACCEPT,
            dot: 0
        }));
        assert_eq!(accept.lookaheads().len(), 1);
        assert!(accept.lookaheads().contains(&Symbol::eos()));

        // Closure pulled in both E productions and, through E, the T production.
        let e = state0.entry(&sym("E")).unwrap();
        assert_eq!(e.items().len(), 2);
        assert!(e.lookaheads().contains(&sym("+")));
        assert!(e.lookaheads().contains(&Symbol::eos()));

        let t = state0.entry(&sym("T")).unwrap();
        assert_eq!(t.items().len(), 1);
        assert!(t.lookaheads().contains(&sym("+")));
    }

    #[test]
    fn goto_advances_the_dot() {
        let grammar = expr_grammar();
        let state0 = grammar.start_state().unwrap();

        let on_id = grammar.goto(&state0, &sym("id")).unwrap();
        let t = on_id.entry(&sym("T")).unwrap();
        assert_eq!(t.items().len(), 1);
        let item = *t.items().iter().next().unwrap();
        assert_eq!(item.dot, 1);
        assert!(item.is_completed(&grammar));

        let on_plus = grammar.goto(&state0, &sym("+")).unwrap();
        assert!(on_plus.is_empty());
    }

    #[test]
    fn builds_deterministic_automaton() {
        let grammar = expr_grammar();
        let first = Automaton::build(&grammar).unwrap();
        let second = Automaton::build(&grammar).unwrap();
        assert_eq!(first, second);

        // One transition per (state, symbol) by construction; spot-check the
        // expected shape of the expression automaton.
        assert!(first.transition(0, &sym("id")).is_some());
        assert!(first.transition(0, &sym("E")).is_some());
        let e_state = first.transition(0, &sym("E")).unwrap();
        assert!(first.transition(e_state, &sym("+")).is_some());
    }

    #[test]
    fn epsilon_item_is_born_completed() {
        // S := A b ; A := ε
        let grammar = AugmentedGrammar::new(
            Grammar::new(
                [sym("S"), sym("A")],
                [sym("b")],
                [(sym("S"), vec![sym("A"), sym("b")]), (sym("A"), vec![])],
                sym("S"),
            )
            .unwrap(),
        );
        let state0 = grammar.start_state().unwrap();

        let a = state0.entry(&sym("A")).unwrap();
        let item = *a.items().iter().next().unwrap();
        assert!(item.is_completed(&grammar));
        assert!(a.lookaheads().contains(&sym("b")));
    }
}
