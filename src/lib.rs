/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an untyped AST.
pub mod parser;

/// The checker takes an untyped AST, resolves its names against lexical
/// scopes, checks the soundness of its types, and maps it into a typed AST.
pub mod checker;

pub mod ast;
pub mod scope;
pub mod token;
pub mod types;
pub mod util;
