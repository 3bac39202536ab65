//! Parse table synthesis.

use crate::{
    automaton::{Automaton, AugmentedGrammar, RuleId},
    grammar::Symbol,
    types::Map,
    util::{display_fn, display_spaced},
};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use std::fmt;

/// What the driver does in a state on a particular lookahead terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Consume the lookahead and transition to the target state.
    Shift(usize),

    /// Replace the topmost `body.len()` stack entries by `head`.
    Reduce { head: Symbol, body: Vec<Symbol> },

    Accept,
}

impl Action {
    fn kind(&self) -> ActionKind {
        match self {
            Self::Shift(..) => ActionKind::Shift,
            Self::Reduce { .. } => ActionKind::Reduce,
            Self::Accept => ActionKind::Accept,
        }
    }
}

// `{"Shift": n}` / `{"Reduce": {"head": .., "body": [..]}}` / `{"Accept": true}`
impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Shift(next) => map.serialize_entry("Shift", next)?,
            Self::Reduce { head, body } => {
                #[derive(Serialize)]
                struct Reduce<'a> {
                    head: &'a Symbol,
                    body: &'a [Symbol],
                }
                map.serialize_entry("Reduce", &Reduce { head, body })?;
            }
            Self::Accept => map.serialize_entry("Accept", &true)?,
        }
        map.end()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ActionKind {
    Shift,
    Reduce,
    Accept,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift => f.write_str("shift"),
            Self::Reduce => f.write_str("reduce"),
            Self::Accept => f.write_str("accept"),
        }
    }
}

/// A cell would be written twice. The grammar is not LR(1)/LALR(1) as
/// configured; conflicts are never resolved by ordering or precedence.
#[derive(Debug, thiserror::Error)]
#[error("state {state}: {existing}/{proposed} conflict on symbol {symbol:?}")]
pub struct GrammarConflictError {
    pub state: usize,
    pub symbol: Symbol,
    pub existing: ActionKind,
    pub proposed: ActionKind,
}

/// Actions and gotos of one state.
#[derive(Debug, Default, PartialEq)]
pub struct TableEntry {
    actions: Map<Symbol, Action>,
    gotos: Map<Symbol, usize>,
}

impl TableEntry {
    pub fn actions(&self) -> impl Iterator<Item = (&Symbol, &Action)> + '_ {
        self.actions.iter()
    }

    pub fn gotos(&self) -> impl Iterator<Item = (&Symbol, usize)> + '_ {
        self.gotos.iter().map(|(symbol, to)| (symbol, *to))
    }
}

/// The finished table, indexed by state.
#[derive(Debug, PartialEq)]
pub struct ParseTable {
    entries: Vec<TableEntry>,
}

impl ParseTable {
    /// Convert a finished automaton into the action/goto table.
    ///
    /// Terminal transitions become shifts and variable transitions become
    /// gotos; every completed item reduces (or accepts, for the `S' := S`
    /// rule on `$eoi`) on each lookahead of its head entry.
    pub fn build(
        grammar: &AugmentedGrammar,
        automaton: &Automaton,
    ) -> Result<Self, GrammarConflictError> {
        let mut entries: Vec<TableEntry> = automaton
            .states()
            .iter()
            .map(|_| TableEntry::default())
            .collect();

        for (from, symbol, to) in automaton.transitions() {
            if grammar.grammar().is_terminal(symbol) {
                insert_action(&mut entries[from], from, symbol.clone(), Action::Shift(to))?;
            } else {
                entries[from].gotos.insert(symbol.clone(), to);
            }
        }

        for (index, state) in automaton.states().iter().enumerate() {
            for (_, entry) in state.entries() {
                for item in entry.items() {
                    if !item.is_completed(grammar) {
                        continue;
                    }
                    let rule = grammar.rule(item.rule);
                    for lookahead in entry.lookaheads() {
                        let action = if item.rule == RuleId::ACCEPT && lookahead.is_eos() {
                            Action::Accept
                        } else {
                            Action::Reduce {
                                head: rule.head().clone(),
                                body: rule.body().to_vec(),
                            }
                        };
                        insert_action(&mut entries[index], index, lookahead.clone(), action)?;
                    }
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn action(&self, state: usize, symbol: &Symbol) -> Option<&Action> {
        self.entries.get(state)?.actions.get(symbol)
    }

    pub fn goto_of(&self, state: usize, variable: &Symbol) -> Option<usize> {
        self.entries.get(state)?.gotos.get(variable).copied()
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            for (index, entry) in self.entries.iter().enumerate() {
                if index > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### state {:02}", index)?;
                writeln!(f, "## actions")?;
                for (symbol, action) in &entry.actions {
                    match action {
                        Action::Shift(next) => {
                            writeln!(f, "- {} => shift({:02})", symbol, next)?;
                        }
                        Action::Reduce { head, body } if body.is_empty() => {
                            writeln!(f, "- {} => reduce({} := ε)", symbol, head)?;
                        }
                        Action::Reduce { head, body } => {
                            writeln!(
                                f,
                                "- {} => reduce({} := {})",
                                symbol,
                                head,
                                display_spaced(body.iter())
                            )?;
                        }
                        Action::Accept => {
                            writeln!(f, "- {} => accept", symbol)?;
                        }
                    }
                }
                writeln!(f, "## gotos")?;
                for (symbol, to) in &entry.gotos {
                    writeln!(f, "- {} => goto({:02})", symbol, to)?;
                }
            }
            Ok(())
        })
    }
}

// `[{"state": n, "actions": {..}, "gotos": {..}}, ..]`
impl Serialize for ParseTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Row<'a> {
            state: usize,
            actions: &'a Map<Symbol, Action>,
            gotos: &'a Map<Symbol, usize>,
        }

        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (state, entry) in self.entries.iter().enumerate() {
            seq.serialize_element(&Row {
                state,
                actions: &entry.actions,
                gotos: &entry.gotos,
            })?;
        }
        seq.end()
    }
}

fn insert_action(
    entry: &mut TableEntry,
    state: usize,
    symbol: Symbol,
    action: Action,
) -> Result<(), GrammarConflictError> {
    use indexmap::map::Entry;
    match entry.actions.entry(symbol) {
        Entry::Occupied(slot) => Err(GrammarConflictError {
            state,
            symbol: slot.key().clone(),
            existing: slot.get().kind(),
            proposed: action.kind(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(action);
            Ok(())
        }
    }
}
