//! The shift-reduce execution driver.

use crate::{
    grammar::Symbol,
    table::{Action, ParseTable},
};

/// A `(type, lexeme)` pair produced by the lexer collaborator.
///
/// `kind` is matched against terminal names; input exhaustion is the
/// end-of-stream condition, so the token sequence carries no explicit `$eoi`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: String,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: impl Into<String>, lexeme: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            lexeme: lexeme.into(),
        }
    }
}

/// A node of the produced syntax tree. Terminal leaves own their token;
/// children are ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub label: Symbol,
    pub token: Option<Token>,
    pub children: Vec<SyntaxTree>,
}

impl SyntaxTree {
    pub fn leaf(token: Token) -> Self {
        Self {
            label: Symbol::new(token.kind.clone()),
            token: Some(token),
            children: Vec::new(),
        }
    }

    pub fn node(label: Symbol, children: Vec<SyntaxTree>) -> Self {
        Self {
            label,
            token: None,
            children,
        }
    }

    /// The terminal leaves of this tree, left to right.
    pub fn leaves(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'t>(&'t self, out: &mut Vec<&'t Token>) {
        if let Some(token) = &self.token {
            out.push(token);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No action for the current (state, lookahead) pair: the input is not
    /// in the language. Recoverable by the caller, never retried here.
    #[error("syntax error at token {position}: state {state} does not accept {kind:?} ({lexeme:?})")]
    UnexpectedToken {
        state: usize,
        position: usize,
        kind: String,
        lexeme: String,
    },

    /// A reduce uncovered a state with no goto for the reduced variable.
    /// The table itself is malformed; this is not a syntax error.
    #[error("malformed parse table: state {state} has no goto for {variable:?}")]
    MissingGoto { state: usize, variable: Symbol },

    /// A reduce asked for more stack entries than the parse has produced.
    /// Only reachable with a table that was not built by [`ParseTable`].
    #[error("malformed parse table: state {state} underflows the parse stacks")]
    StackUnderflow { state: usize },
}

/// Drive `tokens` through `table` and build the syntax tree.
///
/// The table is read-only here; independent parses may share one table.
pub fn parse(table: &ParseTable, tokens: &[Token]) -> Result<SyntaxTree, ParseError> {
    let mut cursor = 0usize;
    let mut state_stack: Vec<usize> = vec![0];
    let mut node_stack: Vec<SyntaxTree> = Vec::new();

    loop {
        let state = *state_stack.last().expect("state stack holds at least state 0");
        let lookahead = tokens.get(cursor);
        let kind = lookahead.map_or_else(Symbol::eos, |token| Symbol::new(token.kind.clone()));

        match table.action(state, &kind) {
            Some(Action::Shift(next)) => {
                let next = *next;
                let Some(token) = lookahead else {
                    // A table can only shift declared terminals, never $eoi.
                    return Err(unexpected(state, cursor, None));
                };
                tracing::trace!(state, next, kind = %kind, "shift");
                node_stack.push(SyntaxTree::leaf(token.clone()));
                state_stack.push(next);
                cursor += 1;
            }

            Some(Action::Reduce { head, body }) => {
                let arity = body.len();
                if node_stack.len() < arity || state_stack.len() <= arity {
                    return Err(ParseError::StackUnderflow { state });
                }
                tracing::trace!(state, head = %head, arity, "reduce");

                // The popped nodes already sit in left-to-right order.
                let children = node_stack.split_off(node_stack.len() - arity);
                state_stack.truncate(state_stack.len() - arity);

                let uncovered = *state_stack.last().expect("state stack holds at least state 0");
                let next = table
                    .goto_of(uncovered, head)
                    .ok_or_else(|| ParseError::MissingGoto {
                        state: uncovered,
                        variable: head.clone(),
                    })?;

                node_stack.push(SyntaxTree::node(head.clone(), children));
                state_stack.push(next);
            }

            Some(Action::Accept) => {
                tracing::trace!("accept");
                debug_assert_eq!(node_stack.len(), 1);
                return node_stack.pop().ok_or(ParseError::StackUnderflow { state });
            }

            None => return Err(unexpected(state, cursor, lookahead)),
        }
    }
}

fn unexpected(state: usize, position: usize, token: Option<&Token>) -> ParseError {
    ParseError::UnexpectedToken {
        state,
        position,
        kind: token.map_or_else(|| Symbol::eos().as_str().to_owned(), |t| t.kind.clone()),
        lexeme: token.map_or_else(String::new, |t| t.lexeme.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{Automaton, AugmentedGrammar};
    use crate::grammar::Grammar;
    use crate::lalr;

    fn sym(raw: &str) -> Symbol {
        Symbol::new(raw)
    }

    fn expr_table() -> ParseTable {
        let grammar = AugmentedGrammar::new(
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
        );
        let automaton = lalr::merge(&Automaton::build(&grammar).unwrap());
        ParseTable::build(&grammar, &automaton).unwrap()
    }

    fn id(lexeme: &str) -> Token {
        Token::new("id", lexeme)
    }

    #[test]
    fn accepts_and_builds_the_expected_tree() {
        let table = expr_table();
        let tokens = [id("a"), Token::new("+", "+"), id("b")];
        let tree = parse(&table, &tokens).unwrap();

        let expected = SyntaxTree::node(
            sym("E"),
            vec![
                SyntaxTree::node(
                    sym("E"),
                    vec![SyntaxTree::node(sym("T"), vec![SyntaxTree::leaf(id("a"))])],
                ),
                SyntaxTree::leaf(Token::new("+", "+")),
                SyntaxTree::node(sym("T"), vec![SyntaxTree::leaf(id("b"))]),
            ],
        );
        assert_eq!(tree, expected);

        // Leaves reproduce the input, left to right.
        let leaves: Vec<&str> = tree.leaves().iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(leaves, ["a", "+", "b"]);
    }

    #[test]
    fn rejects_input_outside_the_language() {
        let table = expr_table();

        let err = parse(&table, &[id("a"), id("b")]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken { position: 1, ref kind, .. } if kind == "id"
        ));

        // Truncated input fails on the end-of-stream lookahead.
        let err = parse(&table, &[id("a"), Token::new("+", "+")]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken { position: 2, ref kind, .. } if kind == "$eoi"
        ));
    }

    #[test]
    fn reduces_epsilon_before_shifting() {
        // S := A b ; A := ε — parsing [b] must reduce A := ε first.
        let grammar = AugmentedGrammar::new(
            Grammar::new(
                [sym("S"), sym("A")],
                [sym("b")],
                [(sym("S"), vec![sym("A"), sym("b")]), (sym("A"), vec![])],
                sym("S"),
            )
            .unwrap(),
        );
        let automaton = Automaton::build(&grammar).unwrap();
        let table = ParseTable::build(&grammar, &automaton).unwrap();

        let tree = parse(&table, &[Token::new("b", "b")]).unwrap();
        let expected = SyntaxTree::node(
            sym("S"),
            vec![
                SyntaxTree::node(sym("A"), vec![]),
                SyntaxTree::leaf(Token::new("b", "b")),
            ],
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn one_table_serves_many_parses() {
        let table = expr_table();
        for lexeme in ["x", "y", "z"] {
            let tree = parse(&table, &[id(lexeme)]).unwrap();
            assert_eq!(tree.leaves()[0].lexeme, lexeme);
        }
    }
}
