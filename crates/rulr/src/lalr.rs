//! Core-wise state merging (LALR(1) reduction of the canonical automaton).

use crate::{
    automaton::{Automaton, State},
    grammar::Symbol,
    types::Map,
};

/// Two states are core-equal when they carry the same heads and, per head,
/// the same `(rule, dot)` item sets. Lookaheads are ignored.
pub fn core_equal(left: &State, right: &State) -> bool {
    let mut len = 0;
    for (head, entry) in left.entries() {
        match right.entry(head) {
            Some(other) if entry.items() == other.items() => len += 1,
            _ => return false,
        }
    }
    len == right.entries().count()
}

/// Group state indices into core-equality classes.
///
/// Classes are ordered by their smallest member and each class lists its
/// members in ascending order, so repeated runs partition identically.
pub fn partition(automaton: &Automaton) -> Vec<Vec<usize>> {
    let states = automaton.states();
    let mut classes: Vec<Vec<usize>> = Vec::new();
    for index in 0..states.len() {
        match classes
            .iter_mut()
            .find(|class| core_equal(&states[class[0]], &states[index]))
        {
            Some(class) => class.push(index),
            None => classes.push(vec![index]),
        }
    }
    classes
}

/// Collapse every core-equality class into a single state.
///
/// Member states are unioned per head (items and lookaheads alike) and every
/// transition is remapped through the class indices. Core-equal states have
/// core-equal goto targets, so the remapping is total and consistent.
pub fn merge(automaton: &Automaton) -> Automaton {
    let classes = partition(automaton);

    let mut class_of = vec![0usize; automaton.states().len()];
    for (class_index, class) in classes.iter().enumerate() {
        for &member in class {
            class_of[member] = class_index;
        }
    }

    let states = classes
        .iter()
        .map(|class| {
            let mut merged = State::default();
            for &member in class {
                for (head, entry) in automaton.states()[member].entries() {
                    merged.merge(
                        head.clone(),
                        entry.items().clone(),
                        entry.lookaheads().clone(),
                    );
                }
            }
            merged
        })
        .collect();

    let mut transitions: Map<(usize, Symbol), usize> = Map::default();
    for (from, symbol, to) in automaton.transitions() {
        transitions.insert((class_of[from], symbol.clone()), class_of[to]);
    }

    tracing::debug!(
        canonical = automaton.states().len(),
        merged = classes.len(),
        "merged core-equal states"
    );

    Automaton {
        states,
        transitions,
    }
}
