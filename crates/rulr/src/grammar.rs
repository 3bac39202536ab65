//! Grammar types and FIRST-set computation.

use crate::{
    types::{Map, Set},
    util::{display_fn, display_spaced},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A grammar symbol, identified by its text.
///
/// The empty string is reserved for epsilon and `$eoi` for the end-of-stream
/// marker; neither may be declared as a variable or terminal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol {
    raw: String,
}

impl Symbol {
    const EOS_TEXT: &'static str = "$eoi";

    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The empty-derivation symbol.
    pub fn epsilon() -> Self {
        Self { raw: String::new() }
    }

    /// The end-of-stream marker.
    pub fn eos() -> Self {
        Self {
            raw: Self::EOS_TEXT.to_owned(),
        }
    }

    pub fn is_epsilon(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn is_eos(&self) -> bool {
        self.raw == Self::EOS_TEXT
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_epsilon() {
            f.write_str("ε")
        } else {
            f.write_str(&self.raw)
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}'", self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("start symbol {0:?} is not a declared variable")]
    UndeclaredStart(Symbol),

    #[error("symbol {0:?} is declared both as a variable and as a terminal")]
    SymbolClash(Symbol),

    #[error("production head {0:?} is not a declared variable")]
    UndeclaredHead(Symbol),

    #[error("production for {head:?} references undeclared symbol {symbol:?}")]
    UndeclaredSymbol { head: Symbol, symbol: Symbol },
}

/// A validated context-free grammar.
///
/// Construction runs every structural check; no partially valid grammar is
/// ever handed out.
#[derive(Debug)]
pub struct Grammar {
    variables: Set<Symbol>,
    terminals: Set<Symbol>,
    productions: Map<Symbol, Vec<Vec<Symbol>>>,
    start: Symbol,
}

impl Grammar {
    pub fn new<V, T, P>(
        variables: V,
        terminals: T,
        productions: P,
        start: Symbol,
    ) -> Result<Self, GrammarError>
    where
        V: IntoIterator<Item = Symbol>,
        T: IntoIterator<Item = Symbol>,
        P: IntoIterator<Item = (Symbol, Vec<Symbol>)>,
    {
        let mut grouped: Map<Symbol, Vec<Vec<Symbol>>> = Map::default();
        for (head, mut body) in productions {
            // A body consisting solely of epsilon is the empty body.
            body.retain(|symbol| !symbol.is_epsilon());
            grouped.entry(head).or_default().push(body);
        }

        let grammar = Self {
            variables: variables.into_iter().collect(),
            terminals: terminals.into_iter().collect(),
            productions: grouped,
            start,
        };
        grammar.validate()?;
        Ok(grammar)
    }

    fn validate(&self) -> Result<(), GrammarError> {
        if !self.variables.contains(&self.start) {
            return Err(GrammarError::UndeclaredStart(self.start.clone()));
        }

        for symbol in &self.variables {
            if self.terminals.contains(symbol) {
                return Err(GrammarError::SymbolClash(symbol.clone()));
            }
        }

        for (head, bodies) in &self.productions {
            if !self.variables.contains(head) {
                return Err(GrammarError::UndeclaredHead(head.clone()));
            }
            for body in bodies {
                for symbol in body {
                    if !self.variables.contains(symbol) && !self.terminals.contains(symbol) {
                        return Err(GrammarError::UndeclaredSymbol {
                            head: head.clone(),
                            symbol: symbol.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    pub fn variables(&self) -> &Set<Symbol> {
        &self.variables
    }

    pub fn terminals(&self) -> &Set<Symbol> {
        &self.terminals
    }

    pub fn start(&self) -> &Symbol {
        &self.start
    }

    pub fn is_variable(&self, symbol: &Symbol) -> bool {
        self.variables.contains(symbol)
    }

    pub fn is_terminal(&self, symbol: &Symbol) -> bool {
        self.terminals.contains(symbol)
    }

    /// Production bodies of `head`, in declaration order.
    pub fn bodies_of(&self, head: &Symbol) -> &[Vec<Symbol>] {
        self.productions.get(head).map_or(&[], |bodies| bodies)
    }

    pub fn productions(&self) -> impl Iterator<Item = (&Symbol, &[Vec<Symbol>])> + '_ {
        self.productions
            .iter()
            .map(|(head, bodies)| (head, &bodies[..]))
    }

    /// `First(symbol)`.
    ///
    /// For a variable, the union over its bodies of FIRST of the leading
    /// symbol, plus FIRST of the second symbol whenever the leading one is
    /// nullable. Only the first two body positions contribute; deeper
    /// nullable prefixes are not chased.
    pub fn first(&self, symbol: &Symbol) -> Set<Symbol> {
        let mut expanding = Set::default();
        self.first_guarded(symbol, &mut expanding)
    }

    fn first_guarded(&self, symbol: &Symbol, expanding: &mut Set<Symbol>) -> Set<Symbol> {
        // Terminals, epsilon and the end-of-stream marker begin only themselves.
        if !self.variables.contains(symbol) {
            return std::iter::once(symbol.clone()).collect();
        }

        let mut first = Set::default();
        if !expanding.insert(symbol.clone()) {
            // Already being expanded; cut the cycle.
            return first;
        }

        for body in self.bodies_of(symbol) {
            match &body[..] {
                [] => {
                    first.insert(Symbol::epsilon());
                }
                [lead, rest @ ..] => {
                    let lead_first = self.first_guarded(lead, expanding);
                    let lead_nullable = lead_first.contains(&Symbol::epsilon());
                    first.extend(lead_first);
                    if lead_nullable {
                        if let Some(second) = rest.first() {
                            first.extend(self.first_guarded(second, expanding));
                        }
                    }
                }
            }
        }

        expanding.swap_remove(symbol);
        first
    }

    /// `first` applied to every variable.
    pub fn first_sets(&self) -> Map<Symbol, Set<Symbol>> {
        self.variables
            .iter()
            .map(|variable| (variable.clone(), self.first(variable)))
            .collect()
    }

    pub fn display_first_sets(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            for (variable, first) in self.first_sets() {
                writeln!(f, "FIRST({}) = {{ {} }}", variable, display_spaced(first.iter()))?;
            }
            Ok(())
        })
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in &self.terminals {
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## variables:")?;
        for variable in &self.variables {
            write!(f, "{}", variable)?;
            if *variable == self.start {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## productions:")?;
        for (head, bodies) in &self.productions {
            for body in bodies {
                if body.is_empty() {
                    writeln!(f, "{} := ε", head)?;
                } else {
                    writeln!(f, "{} := {}", head, display_spaced(body.iter()))?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(raw: &str) -> Symbol {
        Symbol::new(raw)
    }

    fn expr_grammar() -> Grammar {
        // E := E + T | T
        // T := id
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
        .unwrap()
    }

    #[test]
    fn rejects_undeclared_start() {
        let err = Grammar::new([sym("E")], [sym("id")], [], sym("X")).unwrap_err();
        assert!(matches!(err, GrammarError::UndeclaredStart(s) if s == sym("X")));
    }

    #[test]
    fn rejects_variable_terminal_clash() {
        let err = Grammar::new([sym("E")], [sym("E")], [], sym("E")).unwrap_err();
        assert!(matches!(err, GrammarError::SymbolClash(s) if s == sym("E")));
    }

    #[test]
    fn rejects_undeclared_head() {
        let err = Grammar::new(
            [sym("E")],
            [sym("id")],
            [(sym("X"), vec![sym("id")])],
            sym("E"),
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::UndeclaredHead(s) if s == sym("X")));
    }

    #[test]
    fn rejects_undeclared_body_symbol() {
        let err = Grammar::new(
            [sym("E")],
            [sym("id")],
            [(sym("E"), vec![sym("num")])],
            sym("E"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GrammarError::UndeclaredSymbol { head, symbol }
                if head == sym("E") && symbol == sym("num")
        ));
    }

    #[test]
    fn first_of_terminal_is_itself() {
        let grammar = expr_grammar();
        let first = grammar.first(&sym("id"));
        assert_eq!(first.len(), 1);
        assert!(first.contains(&sym("id")));
    }

    #[test]
    fn first_of_epsilon_is_itself() {
        let grammar = expr_grammar();
        let first = grammar.first(&Symbol::epsilon());
        assert_eq!(first.len(), 1);
        assert!(first.contains(&Symbol::epsilon()));
    }

    #[test]
    fn first_tolerates_left_recursion() {
        let grammar = expr_grammar();

        let first_t = grammar.first(&sym("T"));
        assert_eq!(first_t.len(), 1);
        assert!(first_t.contains(&sym("id")));

        // E is directly left recursive; the guard cuts the cycle.
        let first_e = grammar.first(&sym("E"));
        assert_eq!(first_e.len(), 1);
        assert!(first_e.contains(&sym("id")));
    }

    #[test]
    fn first_of_nullable_variable_contains_epsilon() {
        // S := A b ; A := ε
        let grammar = Grammar::new(
            [sym("S"), sym("A")],
            [sym("b")],
            [(sym("S"), vec![sym("A"), sym("b")]), (sym("A"), vec![])],
            sym("S"),
        )
        .unwrap();

        let first_a = grammar.first(&sym("A"));
        assert_eq!(first_a.len(), 1);
        assert!(first_a.contains(&Symbol::epsilon()));

        let first_s = grammar.first(&sym("S"));
        assert!(first_s.contains(&sym("b")));
    }

    #[test]
    fn epsilon_body_symbol_is_normalized_away() {
        let grammar = Grammar::new(
            [sym("A")],
            [sym("x")],
            [(sym("A"), vec![Symbol::epsilon()])],
            sym("A"),
        )
        .unwrap();
        assert_eq!(grammar.bodies_of(&sym("A")), &[Vec::<Symbol>::new()]);
    }
}
