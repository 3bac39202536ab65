use rulr::{
    automaton::{Automaton, AugmentedGrammar},
    driver::{self, Token},
    lalr,
    table::ParseTable,
};
use std::{env, path::PathBuf};

fn compute(name: &str) -> ParseTable {
    let grammar = rulr::syntax::parse_file(
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join(format!("tests/{}.json", name)),
    )
    .unwrap();
    let grammar = AugmentedGrammar::new(grammar);

    let automaton = Automaton::build(&grammar).unwrap();
    let _canonical = ParseTable::build(&grammar, &automaton).unwrap();

    let merged = lalr::merge(&automaton);
    ParseTable::build(&grammar, &merged).unwrap()
}

macro_rules! define_tests {
    ($($name:ident),*$(,)?) => {$(
        #[test]
        fn $name() {
            let _table = compute(stringify!($name));
        }
    )*};
}

define_tests! {
    addition,
    arithmetic,
    balanced,
    epsilon_tail,
    lists,
}

#[test]
fn arithmetic_round_trip() {
    let table = compute("arithmetic");

    // num * ( num + num )
    let tokens = [
        Token::new("num", "2"),
        Token::new("*", "*"),
        Token::new("(", "("),
        Token::new("num", "3"),
        Token::new("+", "+"),
        Token::new("num", "4"),
        Token::new(")", ")"),
    ];
    let tree = driver::parse(&table, &tokens).unwrap();
    let leaves: Vec<&str> = tree.leaves().iter().map(|t| t.lexeme.as_str()).collect();
    assert_eq!(leaves, ["2", "*", "(", "3", "+", "4", ")"]);

    // An unbalanced variant is rejected instead of looping.
    let bad = [
        Token::new("num", "2"),
        Token::new("*", "*"),
        Token::new(")", ")"),
    ];
    assert!(driver::parse(&table, &bad).is_err());
}

#[test]
fn balanced_round_trip() {
    let table = compute("balanced");

    // ( ( ) ) — the innermost pair closes over an epsilon reduction.
    let tokens = [
        Token::new("(", "("),
        Token::new("(", "("),
        Token::new(")", ")"),
        Token::new(")", ")"),
    ];
    let tree = driver::parse(&table, &tokens).unwrap();
    assert_eq!(tree.leaves().len(), 4);

    assert!(driver::parse(&table, &[Token::new(")", ")")]).is_err());
}
