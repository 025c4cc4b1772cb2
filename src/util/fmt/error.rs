#![allow(clippy::items_after_statements)]

use crate::{
    checker::{self, Mismatch},
    parser,
    token::{Spanned, TokenKind},
    types::Type,
    util::fmt::{Context, Show},
};

impl Show for Spanned<checker::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use checker::Error::*;
        match error {
            DuplicateVariableName(name) => {
                let name = i.get(name);
                write!(f, "variable {name} is already declared in this scope")
            }
            DuplicateProcedureName(name) => {
                let name = i.get(name);
                write!(f, "procedure {name} is already declared in this scope")
            }
            DuplicateParameterName(name) => {
                let name = i.get(name);
                write!(f, "parameter {name} is declared more than once")
            }
            DuplicateField { record, field } => {
                let record = i.get(record);
                let field = i.get(field);
                write!(f, "record {record} declares field {field} more than once")
            }
            DuplicateRecordType(name) => {
                let name = i.get(name);
                write!(f, "record type {name} is already declared")
            }
            UndeclaredIdentifier(name) => write!(f, "{} is not declared", i.get(name)),
            UndefinedProcedure(name) => write!(f, "procedure {} is not defined", i.get(name)),
            InvalidProcedureCall(name) => write!(f, "{} is not a procedure", i.get(name)),
            TypeMismatch(mismatch) => mismatch.show(f, ctx),
            ArgumentCountMismatch {
                callee,
                expected,
                found,
            } => {
                let callee = i.get(callee);
                write!(
                    f,
                    "wrong number of arguments for {callee}: expected {expected}, but got {found}"
                )
            }
            ArgumentTypeMismatch {
                callee,
                position,
                expected,
                found,
            } => {
                let callee = i.get(callee);
                let expected = expected.display(ctx);
                let found = found.display(ctx);
                write!(
                    f,
                    "argument {position} of {callee} expects type {expected}, but got {found}"
                )
            }
            ArrayIndexOutOfBounds { array, index, len } => {
                let array = i.get(array);
                write!(
                    f,
                    "index {index} is out of bounds for array {array} of length {len}"
                )
            }
            UninitializedVariable(name) => write!(f, "{} must be initialized", i.get(name)),
            ImmutableAssignment { name, mutability } => {
                let name = i.get(name);
                let keyword = mutability.keyword();
                write!(f, "cannot assign to {name}, it is declared {keyword}")
            }
            VoidValue(name) => write!(f, "{} cannot have type void", i.get(name)),
            ReturnTypeMismatch {
                procedure,
                expected,
                found,
            } => {
                let Some(procedure) = procedure else {
                    return write!(f, "return outside of a procedure");
                };
                let procedure = i.get(procedure);
                if *expected == Type::Void {
                    return write!(f, "procedure {procedure} is void and cannot return");
                }
                let expected = expected.display(ctx);
                match found {
                    Some(found) => {
                        let found = found.display(ctx);
                        write!(
                            f,
                            "procedure {procedure} must return type {expected}, but got {found}"
                        )
                    }
                    None => {
                        write!(f, "procedure {procedure} must return a value of type {expected}")
                    }
                }
            }
        }
    }
}

impl Show for Mismatch {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let i = ctx.ident_interner;
        match self {
            Mismatch::Declaration {
                name,
                expected,
                found,
            } => write!(
                f,
                "cannot initialize {} of type {} with a value of type {}",
                i.get(name),
                expected.display(ctx),
                found.display(ctx)
            ),
            Mismatch::Assignment { expected, found } => write!(
                f,
                "expected type {}, but got {}",
                expected.display(ctx),
                found.display(ctx)
            ),
            Mismatch::Operands { op, lhs, rhs } => write!(
                f,
                "operator {} cannot be applied to {} and {}",
                op.symbol(),
                lhs.display(ctx),
                rhs.display(ctx)
            ),
            Mismatch::Field {
                record,
                field,
                expected,
                found,
            } => write!(
                f,
                "field {} of {} expects type {}, but got {}",
                i.get(field),
                i.get(record),
                expected.display(ctx),
                found.display(ctx)
            ),
            Mismatch::Condition { found } => {
                write!(f, "condition must be bool, but got {}", found.display(ctx))
            }
            Mismatch::Index { found } => {
                write!(f, "array index must be int, but got {}", found.display(ctx))
            }
            Mismatch::ArraySize { found } => {
                write!(f, "array size must be int, but got {}", found.display(ctx))
            }
            Mismatch::ArrayElement { expected, found } => write!(
                f,
                "array element must be {}, but got {}",
                expected.display(ctx),
                found.display(ctx)
            ),
            Mismatch::NotArray { name, found } => write!(
                f,
                "{} is not an array, its type is {}",
                i.get(name),
                found.display(ctx)
            ),
            Mismatch::NotRecord { field, found } => write!(
                f,
                "cannot access field {} on type {}",
                i.get(field),
                found.display(ctx)
            ),
            Mismatch::Negation { found } => {
                write!(f, "cannot negate a value of type {}", found.display(ctx))
            }
            Mismatch::LoopBound { found } => write!(
                f,
                "loop bounds must be numeric, but got {}",
                found.display(ctx)
            ),
            Mismatch::LoopCounter { expected, found } => write!(
                f,
                "loop counter must be {}, but got {}",
                expected.display(ctx),
                found.display(ctx)
            ),
        }
    }
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, _ctx: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use parser::Error::*;
        match error {
            UnexpectedTokenInExpr { token } => {
                write!(f, "unexpected token {token:?} in expression")
            }
            Unexpected { expected, actual } => {
                write!(f, "expected token {expected:?}, but got {actual:?}")
            }
            UnexpectedAny { expected, actual } => {
                write!(f, "expected one of {expected:?}, but got {actual:?}")
            }
            ParseInt => write!(f, "parse int error, out of bounds"),
            ParseReal => write!(f, "invalid real literal"),
            NestingTooDeep { limit } => {
                write!(f, "nesting exceeds the limit of {limit} levels")
            }
            Lexer(TokenKind::ErrorUnclosedString) => write!(f, "unclosed string"),
            Lexer(TokenKind::Unknown) => write!(f, "unexpected character"),
            Lexer(kind) => write!(f, "lexer error {kind:?}"),
        }
    }
}
