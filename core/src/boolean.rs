//! Boolean retrieval: `AND`, `OR`, `XOR`, `NOT`, `AND NOT`, `OR NOT` and
//! parentheses over document sets.
//!
//! Queries are split shell-style (quotes group words), converted to postfix
//! with the shunting-yard algorithm and evaluated on a stack of sets.
//! Operators are recognized in upper case only.

use crate::error::{QueryError, Result};
use crate::index::{DocKey, InvertedIndex};
use crate::permuterm::{PermutermIndex, WILDCARD};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Not,
    And,
    AndNot,
    Or,
    OrNot,
    Xor,
}

impl Operator {
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Not => 3,
            Operator::And | Operator::AndNot => 2,
            Operator::Or | Operator::OrNot | Operator::Xor => 1,
        }
    }

    pub fn is_unary(self) -> bool {
        self == Operator::Not
    }

    fn keyword(word: &str) -> Option<Self> {
        match word {
            "NOT" => Some(Operator::Not),
            "AND" => Some(Operator::And),
            "OR" => Some(Operator::Or),
            "XOR" => Some(Operator::Xor),
            _ => None,
        }
    }

    fn combine<D: Ord + Clone>(self, a: BTreeSet<D>, b: BTreeSet<D>, universe: &BTreeSet<D>) -> BTreeSet<D> {
        match self {
            Operator::Not => universe.difference(&b).cloned().collect(),
            Operator::And => a.intersection(&b).cloned().collect(),
            Operator::AndNot => a.difference(&b).cloned().collect(),
            Operator::Or => a.union(&b).cloned().collect(),
            Operator::Xor => a.symmetric_difference(&b).cloned().collect(),
            Operator::OrNot => {
                let mut out = a;
                out.extend(universe.difference(&b).cloned());
                out
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Not => "NOT",
            Operator::And => "AND",
            Operator::AndNot => "AND NOT",
            Operator::Or => "OR",
            Operator::OrNot => "OR NOT",
            Operator::Xor => "XOR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Operand(String),
    Operator(Operator),
    LeftParen,
    RightParen,
}

/// Splits a query into tokens, peeling parentheses off the words they touch
/// and merging `AND NOT` / `OR NOT` into single operators.
pub fn tokenize(query: &str) -> Result<Vec<Token>> {
    let words = shlex::split(query)
        .ok_or_else(|| QueryError::MalformedQuery(format!("unbalanced quotes in {query:?}")))?;

    let mut raw = Vec::with_capacity(words.len());
    for word in &words {
        let mut rest = word.as_str();
        while let Some(stripped) = rest.strip_prefix('(') {
            raw.push(Token::LeftParen);
            rest = stripped;
        }
        let inner = rest.trim_end_matches(')');
        if !inner.is_empty() {
            raw.push(match Operator::keyword(inner) {
                Some(op) => Token::Operator(op),
                None => Token::Operand(inner.to_string()),
            });
        }
        for _ in inner.len()..rest.len() {
            raw.push(Token::RightParen);
        }
    }

    let mut tokens = Vec::with_capacity(raw.len());
    let mut iter = raw.into_iter().peekable();
    while let Some(token) = iter.next() {
        let merged = match (&token, iter.peek()) {
            (Token::Operator(Operator::And), Some(Token::Operator(Operator::Not))) => Some(Operator::AndNot),
            (Token::Operator(Operator::Or), Some(Token::Operator(Operator::Not))) => Some(Operator::OrNot),
            _ => None,
        };
        match merged {
            Some(op) => {
                iter.next();
                tokens.push(Token::Operator(op));
            }
            None => tokens.push(token),
        }
    }
    Ok(tokens)
}

/// Shunting-yard conversion. Binary operators are left-associative; a prefix
/// `NOT` never pops pending operators. An unmatched `)` flushes the operator
/// stack and is otherwise ignored; unmatched `(` are dropped at the end.
pub fn to_postfix(tokens: Vec<Token>) -> Vec<Token> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Operand(_) => output.push(token),
            Token::Operator(op) => {
                if !op.is_unary() {
                    while let Some(&Token::Operator(top)) = stack.last() {
                        if top.precedence() < op.precedence() {
                            break;
                        }
                        stack.pop();
                        output.push(Token::Operator(top));
                    }
                }
                stack.push(Token::Operator(op));
            }
            Token::LeftParen => stack.push(Token::LeftParen),
            Token::RightParen => {
                while let Some(top) = stack.pop() {
                    if top == Token::LeftParen {
                        break;
                    }
                    output.push(top);
                }
            }
        }
    }

    while let Some(top) = stack.pop() {
        if top != Token::LeftParen {
            output.push(top);
        }
    }
    output
}

/// A parsed boolean query held in postfix order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    postfix: Vec<Token>,
}

impl BooleanQuery {
    pub fn parse(query: &str) -> Result<Self> {
        let postfix = to_postfix(tokenize(query)?);
        tracing::debug!(query, postfix = ?postfix, "parsed boolean query");
        Ok(Self { postfix })
    }

    pub fn postfix(&self) -> &[Token] {
        &self.postfix
    }

    pub fn is_empty(&self) -> bool {
        self.postfix.is_empty()
    }

    /// Evaluates the query. `universe` is the set `NOT` complements against;
    /// `resolve` maps an operand to its documents.
    ///
    /// Fails with [`QueryError::MalformedQuery`] when an operator lacks an
    /// operand or operands are left over without an operator.
    pub fn evaluate<D, F>(&self, universe: &BTreeSet<D>, mut resolve: F) -> Result<BTreeSet<D>>
    where
        D: Ord + Clone,
        F: FnMut(&str) -> Result<BTreeSet<D>>,
    {
        let mut stack: Vec<BTreeSet<D>> = Vec::new();
        for token in &self.postfix {
            match token {
                Token::Operand(term) => stack.push(resolve(term)?),
                Token::Operator(op) => {
                    let b = pop_operand(&mut stack, *op)?;
                    let a = if op.is_unary() { BTreeSet::new() } else { pop_operand(&mut stack, *op)? };
                    stack.push(op.combine(a, b, universe));
                }
                Token::LeftParen | Token::RightParen => {
                    return Err(QueryError::MalformedQuery("parenthesis left in postfix form".into()));
                }
            }
        }

        match stack.len() {
            0 | 1 => Ok(stack.pop().unwrap_or_default()),
            n => Err(QueryError::MalformedQuery(format!("{n} operands without an operator joining them"))),
        }
    }
}

fn pop_operand<D>(stack: &mut Vec<BTreeSet<D>>, op: Operator) -> Result<BTreeSet<D>> {
    stack
        .pop()
        .ok_or_else(|| QueryError::MalformedQuery(format!("missing operand for {op}")))
}

/// Documents for one operand: a wildcard is expanded through the permuterm
/// index and the postings of every match are unioned; anything else is looked
/// up as-is. Unknown terms give an empty set.
pub fn resolve_operand<D: DocKey>(
    operand: &str,
    index: &InvertedIndex<D>,
    permuterm: Option<&PermutermIndex>,
) -> Result<BTreeSet<D>> {
    if !operand.contains(WILDCARD) {
        return Ok(index.documents_containing(operand));
    }
    let permuterm = permuterm.ok_or_else(|| QueryError::WildcardsDisabled { pattern: operand.to_string() })?;
    let mut docs = BTreeSet::new();
    for term in permuterm.resolve_wildcard(operand)? {
        docs.extend(index.documents_containing(&term));
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn op(o: Operator) -> Token {
        Token::Operator(o)
    }

    fn term(t: &str) -> Token {
        Token::Operand(t.to_string())
    }

    fn postfix_of(query: &str) -> Vec<Token> {
        BooleanQuery::parse(query).unwrap().postfix().to_vec()
    }

    fn eval(query: &str) -> Result<BTreeSet<u32>> {
        let sets: HashMap<&str, BTreeSet<u32>> = HashMap::from([
            ("cat", BTreeSet::from([1, 3])),
            ("dog", BTreeSet::from([1, 2])),
            ("bird", BTreeSet::from([2, 4])),
        ]);
        let universe = BTreeSet::from([1, 2, 3, 4]);
        BooleanQuery::parse(query)?.evaluate(&universe, |t| Ok(sets.get(t).cloned().unwrap_or_default()))
    }

    #[test]
    fn tokenize_merges_composite_operators() {
        let tokens = tokenize("cat AND NOT dog OR NOT bird").unwrap();
        assert_eq!(tokens, vec![term("cat"), op(Operator::AndNot), term("dog"), op(Operator::OrNot), term("bird")]);
    }

    #[test]
    fn tokenize_honors_quotes_and_parens() {
        let tokens = tokenize("(\"new york\" OR city)").unwrap();
        assert_eq!(
            tokens,
            vec![Token::LeftParen, term("new york"), op(Operator::Or), term("city"), Token::RightParen]
        );
    }

    #[test]
    fn lowercase_keywords_are_terms() {
        assert_eq!(tokenize("cat and dog").unwrap(), vec![term("cat"), term("and"), term("dog")]);
    }

    #[test]
    fn unbalanced_quotes_are_malformed() {
        assert!(matches!(tokenize("\"cat AND dog"), Err(QueryError::MalformedQuery(_))));
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(postfix_of("a OR b AND c"), vec![term("a"), term("b"), term("c"), op(Operator::And), op(Operator::Or)]);
        assert_eq!(postfix_of("a AND b AND c"), vec![term("a"), term("b"), op(Operator::And), term("c"), op(Operator::And)]);
        assert_eq!(postfix_of("a XOR b OR c"), vec![term("a"), term("b"), op(Operator::Xor), term("c"), op(Operator::Or)]);
        assert_eq!(postfix_of("NOT a AND b"), vec![term("a"), op(Operator::Not), term("b"), op(Operator::And)]);
        assert_eq!(postfix_of("(a OR b) AND c"), vec![term("a"), term("b"), op(Operator::Or), term("c"), op(Operator::And)]);
    }

    #[test]
    fn unmatched_parentheses_are_forgiven() {
        assert_eq!(postfix_of("a AND b) OR c"), vec![term("a"), term("b"), op(Operator::And), term("c"), op(Operator::Or)]);
        assert_eq!(postfix_of(") a"), vec![term("a")]);
        assert_eq!(postfix_of("((a OR b"), vec![term("a"), term("b"), op(Operator::Or)]);
    }

    #[test]
    fn evaluates_every_operator() {
        assert_eq!(eval("cat AND dog").unwrap(), BTreeSet::from([1]));
        assert_eq!(eval("cat OR bird").unwrap(), BTreeSet::from([1, 2, 3, 4]));
        assert_eq!(eval("cat XOR dog").unwrap(), BTreeSet::from([2, 3]));
        assert_eq!(eval("NOT cat").unwrap(), BTreeSet::from([2, 4]));
        assert_eq!(eval("dog AND NOT cat").unwrap(), BTreeSet::from([2]));
        assert_eq!(eval("cat OR NOT dog").unwrap(), BTreeSet::from([1, 3, 4]));
        assert_eq!(eval("NOT (NOT cat)").unwrap(), BTreeSet::from([1, 3]));
        assert_eq!(eval("NOT NOT cat").unwrap(), BTreeSet::from([1, 3]));
        assert_eq!(eval("(cat OR dog) AND bird").unwrap(), BTreeSet::from([2]));
    }

    #[test]
    fn unknown_terms_and_empty_queries_are_empty() {
        assert!(eval("fish").unwrap().is_empty());
        assert!(eval("").unwrap().is_empty());
        assert_eq!(eval("fish OR cat").unwrap(), BTreeSet::from([1, 3]));
    }

    #[test]
    fn missing_operands_abort() {
        assert_eq!(eval("AND cat").unwrap_err(), QueryError::MalformedQuery("missing operand for AND".into()));
        assert!(matches!(eval("cat OR"), Err(QueryError::MalformedQuery(_))));
        assert!(matches!(eval("NOT"), Err(QueryError::MalformedQuery(_))));
        assert!(matches!(eval("cat dog"), Err(QueryError::MalformedQuery(_))));
    }

    #[test]
    fn wildcard_operands_need_permuterm() {
        let mut builder = crate::index::InvertedIndexBuilder::new();
        builder.add_terms(1u32, ["cat", "cot"]);
        builder.add_terms(2u32, ["cut"]);
        let index = builder.build();
        let permuterm = PermutermIndex::build(index.terms());

        assert_eq!(resolve_operand("c*t", &index, Some(&permuterm)).unwrap(), BTreeSet::from([1, 2]));
        assert_eq!(resolve_operand("cat", &index, None).unwrap(), BTreeSet::from([1]));
        assert_eq!(
            resolve_operand("c*t", &index, None).unwrap_err(),
            QueryError::WildcardsDisabled { pattern: "c*t".into() }
        );
        assert!(matches!(
            resolve_operand("c**", &index, Some(&permuterm)),
            Err(QueryError::InvalidPattern { wildcards: 2, .. })
        ));
    }
}
