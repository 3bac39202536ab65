//! Fixed-point FOLLOW-set computation.

use crate::{
    grammar::{Grammar, Symbol},
    types::{Map, Set},
    util::display_spaced,
};
use std::fmt;

/// FOLLOW sets for every variable of a grammar.
///
/// FOLLOW(start) always contains the end-of-stream marker; epsilon never
/// appears in any returned set. Sets only grow across fixpoint passes.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowSets {
    map: Map<Symbol, Set<Symbol>>,
}

impl FollowSets {
    pub fn compute(grammar: &Grammar) -> Self {
        let mut map: Map<Symbol, Set<Symbol>> = grammar
            .variables()
            .iter()
            .map(|variable| (variable.clone(), Set::default()))
            .collect();
        map[grammar.start()].insert(Symbol::eos());

        // FIRST is queried once per symbol, not once per pass.
        let epsilon = Symbol::epsilon();
        let first: Map<Symbol, Set<Symbol>> = grammar
            .variables()
            .iter()
            .chain(grammar.terminals())
            .map(|symbol| (symbol.clone(), grammar.first(symbol)))
            .collect();

        let mut changed = true;
        while changed {
            changed = false;

            for (head, bodies) in grammar.productions() {
                for body in bodies {
                    for (i, symbol) in body.iter().enumerate() {
                        if !grammar.is_variable(symbol) {
                            continue;
                        }

                        // FIRST of the tail after position i, minus epsilon;
                        // the scan stops at the first non-nullable symbol.
                        let mut gained = Set::default();
                        let mut nullable_tail = true;
                        for next in &body[i + 1..] {
                            let next_first = &first[next];
                            gained.extend(
                                next_first
                                    .iter()
                                    .filter(|s| !s.is_epsilon())
                                    .cloned(),
                            );
                            if !next_first.contains(&epsilon) {
                                nullable_tail = false;
                                break;
                            }
                        }
                        if nullable_tail {
                            gained.extend(map[head].iter().cloned());
                        }

                        let follow = &mut map[symbol];
                        for s in gained {
                            changed |= follow.insert(s);
                        }
                    }
                }
            }
        }

        Self { map }
    }

    pub fn get(&self, variable: &Symbol) -> Option<&Set<Symbol>> {
        self.map.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Set<Symbol>)> + '_ {
        self.map.iter()
    }
}

impl fmt::Display for FollowSets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (variable, follow) in &self.map {
            writeln!(f, "FOLLOW({}) = {{ {} }}", variable, display_spaced(follow.iter()))?;
        }
        Ok(())
    }
}
