use log::debug;

use crate::{
    ast::{
        BinaryOperator, Binding, Block, Call, Decl, Expr, ExprKind, Ident, LValue, LValueKind,
        Mutability, Param, ProcDecl, Program, Range, RecordDecl, RecordEntry, Stmt, TypeName,
        UnaryOperator, Untyped,
    },
    lexer::{self, extract},
    token::{Span, Spanned, Token, TokenKind},
    types::well_known,
    util::intern::Interner,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T>;

/// Parser limits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// How deep expressions and blocks may nest.
    pub max_nesting: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { max_nesting: 256 }
    }
}

pub fn parse_program(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
) -> ParseResult<Program<Untyped>> {
    parse_program_with(src, tokens, ident_interner, &Config::default())
}

pub fn parse_program_with(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
    config: &Config,
) -> ParseResult<Program<Untyped>> {
    parse(src, tokens, ident_interner, config, Parser::parse_program)
}

/// Parses a single expression spanning the whole input.
pub fn parse_expr(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
) -> ParseResult<Expr<Untyped>> {
    parse(src, tokens, ident_interner, &Config::default(), |p| {
        let expr = p.parse_expr()?;
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    })
}

fn parse<'src, 'tok, 'ident, T>(
    src: &'src str,
    tokens: &'tok mut Vec<Token>,
    ident_interner: &'ident mut Interner<str>,
    config: &Config,
    f: impl for<'a> FnOnce(&'a mut Parser<'src, 'tok, 'ident>) -> Result<T>,
) -> ParseResult<T> {
    assert!(tokens.is_empty());

    // Register well-known names
    well_known::seed(ident_interner);

    lexer::lex(src, tokens);
    let mut p = Parser::new(src, tokens, ident_interner, config);
    f(&mut p)
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner<str>,
    cursor: usize,
    depth: usize,
    max_nesting: usize,
}

const TOP_LEVEL_ITEMS: &[TokenKind] = &[
    TokenKind::Record,
    TokenKind::Const,
    TokenKind::Var,
    TokenKind::Val,
    TokenKind::Proc,
    TokenKind::Identifier,
    TokenKind::Semicolon,
];

const BLOCK_ITEMS: &[TokenKind] = &[
    TokenKind::RBrace,
    TokenKind::If,
    TokenKind::While,
    TokenKind::For,
    TokenKind::Return,
    TokenKind::Record,
    TokenKind::Const,
    TokenKind::Var,
    TokenKind::Val,
    TokenKind::Proc,
    TokenKind::Identifier,
    TokenKind::Semicolon,
];

const IDENT_STMT_FOLLOW: &[TokenKind] = &[
    TokenKind::LParen,
    TokenKind::LBracket,
    TokenKind::Dot,
    TokenKind::Assign,
];

impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Result<Program<Untyped>> {
        let mut program = Program::default();
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Record => {
                    let record = self.parse_record()?;
                    debug!("parsed record {}", self.name_of(record.name));
                    program.push_record(record);
                }
                TokenKind::Proc => {
                    let procedure = self.parse_proc()?;
                    debug!("parsed procedure {}", self.name_of(procedure.name));
                    program.push_procedure(procedure);
                }
                TokenKind::Const | TokenKind::Var | TokenKind::Val => {
                    let binding = self.parse_binding()?;
                    debug!("parsed global {}", self.name_of(binding.name));
                    program.push_global(Stmt::Decl(Decl::Binding(binding)));
                }
                TokenKind::Identifier => {
                    let stmt = self.parse_ident_stmt()?;
                    debug!("parsed top-level statement at {}", token.span());
                    program.push_global(stmt);
                }
                _ => return Err(self.unexpected_any(token, TOP_LEVEL_ITEMS)),
            }
        }
        Ok(program)
    }

    fn parse_record(&mut self) -> Result<RecordDecl<Untyped>> {
        self.consume(TokenKind::Record)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;

        // At least one field is required.
        let mut fields = Vec::with_capacity(4);
        loop {
            let name = self.parse_ident()?;
            let ty = self.parse_type()?;
            self.consume(TokenKind::Semicolon)?;
            fields.push(RecordEntry { name, ty });
            if self.is(TokenKind::RBrace) {
                break;
            }
        }
        self.consume(TokenKind::RBrace)?;

        Ok(RecordDecl { name, fields })
    }

    fn parse_binding(&mut self) -> Result<Binding<Untyped>> {
        let keyword = self.consume_any(&[TokenKind::Const, TokenKind::Var, TokenKind::Val])?;
        let mutability = match keyword.kind {
            TokenKind::Const => Mutability::Const,
            TokenKind::Var => Mutability::Var,
            TokenKind::Val => Mutability::Val,
            _ => unreachable!(),
        };
        let name = self.parse_ident()?;
        let ty = self.parse_type()?;
        let initializer = self.parse_initializer()?;
        self.consume(TokenKind::Semicolon)?;

        Ok(Binding {
            mutability,
            name,
            ty,
            initializer,
        })
    }

    fn parse_initializer(&mut self) -> Result<Option<Expr<Untyped>>> {
        if !self.take(TokenKind::Assign) {
            return Ok(None);
        }
        let expr = self.parse_expr()?;
        Ok(Some(expr))
    }

    fn parse_proc(&mut self) -> Result<ProcDecl<Untyped>> {
        self.consume(TokenKind::Proc)?;
        let name = self.parse_ident()?;

        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_param)?;
        self.consume(TokenKind::RParen)?;

        let return_ty = self.parse_type()?;
        let body = self.parse_block()?;

        Ok(ProcDecl {
            name,
            params,
            return_ty,
            body,
        })
    }

    fn parse_param(&mut self) -> Result<Param<Untyped>> {
        let name = self.parse_ident()?;
        let ty = self.parse_type()?;
        Ok(Param { name, ty })
    }

    fn parse_block(&mut self) -> Result<Block<Untyped>> {
        let open = self.consume(TokenKind::LBrace)?;
        self.nested(open.span(), |p| {
            let mut stmts = Vec::new();
            while !p.is(TokenKind::RBrace) {
                if let Some(stmt) = p.parse_stmt()? {
                    stmts.push(stmt);
                }
            }
            let close = p.consume(TokenKind::RBrace)?;
            Ok(Block {
                stmts,
                span: open.span().to(close.span()),
            })
        })
    }

    /// Parses a statement. Empty statements produce nothing.
    fn parse_stmt(&mut self) -> Result<Option<Stmt<Untyped>>> {
        let token = self.peek();
        let stmt = match token.kind {
            TokenKind::Semicolon => {
                self.advance();
                return Ok(None);
            }
            TokenKind::If => self.parse_if()?.0,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => {
                let stmt = self.parse_return()?;
                self.consume(TokenKind::Semicolon)?;
                stmt
            }
            TokenKind::Const | TokenKind::Var | TokenKind::Val => {
                Stmt::Decl(Decl::Binding(self.parse_binding()?))
            }
            TokenKind::Record => Stmt::Decl(Decl::Record(self.parse_record()?)),
            TokenKind::Proc => Stmt::Decl(Decl::Proc(self.parse_proc()?)),
            TokenKind::Identifier => self.parse_ident_stmt()?,
            _ => return Err(self.unexpected_any(token, BLOCK_ITEMS)),
        };
        Ok(Some(stmt))
    }

    /// Returns the statement along with its span, which an `else if` chain
    /// uses for the synthesized else block.
    fn parse_if(&mut self) -> Result<(Stmt<Untyped>, Span)> {
        let keyword = self.consume(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let mut span = keyword.span().to(then_block.span);

        let else_block = if self.take(TokenKind::Else) {
            let block = if self.is(TokenKind::If) {
                let if_span = self.peek().span();
                let (nested, nested_span) = self.nested(if_span, Parser::parse_if)?;
                Block {
                    stmts: vec![nested],
                    span: nested_span,
                }
            } else {
                self.parse_block()?
            };
            span = span.to(block.span);
            Some(block)
        } else {
            None
        };

        let stmt = Stmt::If {
            cond,
            then_block,
            else_block,
        };
        Ok((stmt, span))
    }

    fn parse_while(&mut self) -> Result<Stmt<Untyped>> {
        self.consume(TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt<Untyped>> {
        self.consume(TokenKind::For)?;

        // `for i = 0 to ...` names a counter, `for 0 to ...` does not.
        let counter = if self.is(TokenKind::Identifier) && self.peek_nth(1).kind == TokenKind::Assign
        {
            let counter = self.parse_ident()?;
            self.consume(TokenKind::Assign)?;
            Some(counter)
        } else {
            None
        };

        let init = self.parse_expr()?;
        self.consume(TokenKind::To)?;
        let end = self.parse_expr()?;
        self.consume(TokenKind::By)?;
        let step = self.parse_expr()?;
        let body = self.parse_block()?;

        Ok(Stmt::For {
            counter,
            range: Range { init, end, step },
            body,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt<Untyped>> {
        let keyword = self.consume(TokenKind::Return)?;
        if self.is(TokenKind::Semicolon) {
            return Ok(Stmt::Return {
                value: None,
                span: keyword.span(),
            });
        }
        let value = self.parse_expr()?;
        Ok(Stmt::Return {
            span: keyword.span().to(value.span),
            value: Some(value),
        })
    }

    /// Parses the statements that start with an identifier: calls and the
    /// different assignment forms.
    fn parse_ident_stmt(&mut self) -> Result<Stmt<Untyped>> {
        let name = self.parse_ident()?;
        let next = self.peek();
        let stmt = match next.kind {
            TokenKind::LParen => Stmt::ProcCall(self.parse_call(name)?),
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_expr()?;
                let close = self.consume(TokenKind::RBracket)?;
                if self.is(TokenKind::Dot) {
                    let element = LValue {
                        kind: LValueKind::ArrayElement {
                            array: name,
                            index: Box::new(index),
                        },
                        span: name.span.to(close.span()),
                        info: (),
                    };
                    let target = self.parse_field_chain(element)?;
                    self.parse_assignment(target)?
                } else {
                    self.consume(TokenKind::Assign)?;
                    let value = self.parse_expr()?;
                    Stmt::ArrayAssignment {
                        target: name,
                        index,
                        value,
                    }
                }
            }
            TokenKind::Dot => {
                let target = self.parse_field_chain(LValue::from(name))?;
                self.parse_assignment(target)?
            }
            TokenKind::Assign => self.parse_assignment(LValue::from(name))?,
            _ => return Err(self.unexpected_any(next, IDENT_STMT_FOLLOW)),
        };
        self.consume(TokenKind::Semicolon)?;
        Ok(stmt)
    }

    /// Parses `('.' ID)+` on top of the provided target. Each field wraps the
    /// target in one more node, so each one counts as a nesting level.
    fn parse_field_chain(&mut self, mut target: LValue<Untyped>) -> Result<LValue<Untyped>> {
        let depth = self.depth;
        let dot = self.consume(TokenKind::Dot)?;
        self.descend(dot.span())?;
        loop {
            let field = self.parse_ident()?;
            target = LValue {
                span: target.span.to(field.span),
                kind: LValueKind::RecordField {
                    base: Box::new(target),
                    field,
                },
                info: (),
            };
            let dot = self.peek();
            if !self.take(TokenKind::Dot) {
                break;
            }
            self.descend(dot.span())?;
        }
        self.depth = depth;
        Ok(target)
    }

    fn parse_assignment(&mut self, target: LValue<Untyped>) -> Result<Stmt<Untyped>> {
        self.consume(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(Stmt::Assignment { target, value })
    }

    /// Parses the arguments of a call whose callee was already parsed.
    fn parse_call(&mut self, callee: Ident) -> Result<Call<Untyped>> {
        self.consume(TokenKind::LParen)?;
        let args = self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr)?;
        let end = self.consume(TokenKind::RParen)?;
        Ok(Call {
            callee,
            args,
            span: callee.span.to(end.span()),
        })
    }

    fn parse_type(&mut self) -> Result<TypeName> {
        let token = self.peek();
        if token.kind == TokenKind::Void {
            self.advance();
            let name = Ident {
                name: well_known::VOID,
                span: token.span(),
            };
            return Ok(TypeName::from(name));
        }

        let name = self.parse_ident()?;
        if self.take(TokenKind::LBracket) {
            let close = self.consume(TokenKind::RBracket)?;
            return Ok(TypeName {
                name,
                array: true,
                span: name.span.to(close.span()),
            });
        }
        Ok(TypeName::from(name))
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(self.ident_of(token))
    }

    fn ident_of(&mut self, token: Token) -> Ident {
        Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        }
    }

    fn name_of(&self, ident: Ident) -> &str {
        self.ident_interner.get(ident)
    }

    fn parse_expr(&mut self) -> Result<Expr<Untyped>> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr<Untyped>> {
        let lhs_token = self.advance();
        self.nested(lhs_token.span(), |p| {
            let mut lhs = p.parse_nud(lhs_token)?;
            let depth = p.depth;

            loop {
                let op_token = p.peek();

                if let Some((lbp, rbp)) = Self::infix_binding_power(op_token.kind) {
                    if lbp < min_bp {
                        // Operator binds less tightly than the minimum required
                        break;
                    }

                    // The operator wraps `lhs` in one more node.
                    p.descend(op_token.span())?;
                    p.advance(); // Operator
                    lhs = p.parse_led(op_token, lhs, rbp)?;
                } else {
                    // Not an infix operator or binds too loosely
                    break;
                }
            }

            p.depth = depth;
            Ok(lhs)
        })
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping)
    fn parse_nud(&mut self, token: Token) -> Result<Expr<Untyped>> {
        let (kind, span) = match token.kind {
            TokenKind::Identifier => return self.parse_ident_expr(token),
            TokenKind::Integer => {
                let parsed =
                    extract::int(token, self.src).map_err(|e| token.span().wrap(e.into()))?;
                (ExprKind::Int(parsed), token.span())
            }
            TokenKind::Real => {
                let parsed =
                    extract::real(token, self.src).map_err(|e| token.span().wrap(e.into()))?;
                (ExprKind::Real(parsed), token.span())
            }
            TokenKind::String => (
                ExprKind::String(extract::string(token, self.src)),
                token.span(),
            ),
            TokenKind::EscapedString => (
                ExprKind::String(extract::escaped_string(token, self.src)),
                token.span(),
            ),
            TokenKind::True => (ExprKind::Bool(true), token.span()),
            TokenKind::False => (ExprKind::Bool(false), token.span()),

            // Grouping: ( expr ). Leaves no node of its own.
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                let end = self.consume(TokenKind::RParen)?;
                return Ok(Expr {
                    span: token.span().to(end.span()),
                    ..expr
                });
            }

            // Prefix operator: -
            TokenKind::Minus => {
                // SAFETY: Should have prefix due to above match
                let ((), rbp) = Self::prefix_binding_power(token.kind).unwrap();
                let expr = self.parse_expr_bp(rbp)?;

                let span = token.span().to(expr.span);
                let unary = ExprKind::Unary {
                    op: UnaryOperator::Neg,
                    expr: Box::new(expr),
                };
                (unary, span)
            }

            other => {
                let error = Error::UnexpectedTokenInExpr { token: other };
                return Err(self.error_at(token, error));
            }
        };

        Ok(Expr {
            kind,
            span,
            info: (),
        })
    }

    /// Parses an expression that starts with an identifier, looking at most
    /// two tokens ahead.
    fn parse_ident_expr(&mut self, token: Token) -> Result<Expr<Untyped>> {
        let ident = self.ident_of(token);

        let (kind, span) = match self.peek().kind {
            // Record literal: P(a, b)
            TokenKind::LParen if starts_uppercase(self.name_of(ident)) => {
                self.advance();
                let fields =
                    self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr)?;
                let end = self.consume(TokenKind::RParen)?;
                let ty = TypeName::from(ident);
                (ExprKind::Record { ty, fields }, ident.span.to(end.span()))
            }

            // Call: f(a, b)
            TokenKind::LParen => {
                let call = self.parse_call(ident)?;
                let span = call.span;
                (ExprKind::Call(call), span)
            }

            // Array constructor: T[](size)
            TokenKind::LBracket if self.peek_nth(1).kind == TokenKind::RBracket => {
                self.advance();
                self.advance();
                self.consume(TokenKind::LParen)?;
                let size = self.parse_expr()?;
                let end = self.consume(TokenKind::RParen)?;
                let array = ExprKind::Array {
                    elem_ty: TypeName::from(ident),
                    size: Box::new(size),
                    elements: Vec::new(),
                };
                (array, ident.span.to(end.span()))
            }

            // Array access: a[i]
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_expr()?;
                let end = self.consume(TokenKind::RBracket)?;
                let access = ExprKind::ArrayAccess {
                    array: ident,
                    index: Box::new(index),
                };
                (access, ident.span.to(end.span()))
            }

            _ => (ExprKind::Id(ident), ident.span),
        };

        Ok(Expr {
            kind,
            span,
            info: (),
        })
    }

    /// led: Parses tokens that follow a left-hand-side expression
    /// (infix/postfix operators)
    fn parse_led(&mut self, op_token: Token, lhs: Expr<Untyped>, rbp: u8) -> Result<Expr<Untyped>> {
        let (kind, span) = match op_token.kind {
            // Field access: expr . ID
            TokenKind::Dot => {
                let field = self.parse_ident()?;
                let span = lhs.span.to(field.span);
                let access = ExprKind::FieldAccess {
                    base: Box::new(lhs),
                    field,
                };
                (access, span)
            }

            kind => {
                // SAFETY: Every other token with an infix binding power is a
                // binary operator.
                let op = Self::binary_operator(kind).unwrap();
                // Parse right operand with correct precedence
                let rhs = self.parse_expr_bp(rbp)?;

                let span = lhs.span.to(rhs.span);
                let binary = ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (binary, span)
            }
        };

        Ok(Expr {
            kind,
            span,
            info: (),
        })
    }

    fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
        let op = match kind {
            TokenKind::Or => BinaryOperator::Or,
            TokenKind::And => BinaryOperator::And,
            TokenKind::EqEq => BinaryOperator::Eq,
            TokenKind::NotEq => BinaryOperator::Ne,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::LessEq => BinaryOperator::Le,
            TokenKind::GreaterEq => BinaryOperator::Ge,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Rem,
            _ => return None,
        };
        Some(op)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
        let bp = match kind {
            // Level 8: Disjunction (left-associative)
            TokenKind::Or => (1, 2),

            // Level 7: Conjunction (left-associative)
            TokenKind::And => (3, 4),

            // Level 6: Equality (left-associative)
            TokenKind::EqEq | TokenKind::NotEq => (5, 6),

            // Level 5: Comparisons (left-associative)
            TokenKind::Less | TokenKind::Greater | TokenKind::LessEq | TokenKind::GreaterEq => {
                (7, 8)
            }

            // Level 4: Addition/Subtraction (left-associative)
            TokenKind::Plus | TokenKind::Minus => (9, 10),

            // Level 3: Multiplication/Division/Remainder (left-associative)
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (11, 12),

            // Level 1: Field access (left-associative)
            TokenKind::Dot => (15, 16),

            _ => return None,
        };
        Some(bp)
    }

    // Prefix operators:
    fn prefix_binding_power(kind: TokenKind) -> Option<((), u8)> {
        let bp = match kind {
            // Level 2: Arithmetic Negation
            TokenKind::Minus => ((), 13),

            _ => return None,
        };
        Some(bp)
    }

    /// Parses `item (separator item)*` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert_ne!(end_delim, separator);

        let mut items = Vec::new();
        if self.is(end_delim) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if !self.take(separator) {
                break;
            }
        }

        // After the last item, only the end delimiter may follow.
        let c = self.peek();
        if c.kind != end_delim {
            return Err(self.unexpected_any(c, &[separator, end_delim]));
        }
        Ok(items)
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.starts_with(char::is_uppercase)
}

impl From<Ident> for TypeName {
    fn from(name: Ident) -> Self {
        TypeName {
            name,
            array: false,
            span: name.span,
        }
    }
}

impl From<Ident> for LValue<Untyped> {
    fn from(ident: Ident) -> Self {
        LValue {
            kind: LValueKind::Ident(ident),
            span: ident.span,
            info: (),
        }
    }
}

impl Parser<'_, '_, '_> {
    pub fn new<'src, 'tok, 'ident>(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner<str>,
        config: &Config,
    ) -> Parser<'src, 'tok, 'ident> {
        let mut p = Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
            depth: 0,
            max_nesting: config.max_nesting,
        };
        p.setup();
        p
    }

    /// Setups the parser, skipping any trivia if necessary.
    fn setup(&mut self) {
        while self.peek().kind.is_trivia() {
            self.cursor += 1;
        }
    }

    /// Runs `f` one nesting level deeper, failing if that exceeds the
    /// configured limit.
    fn nested<T>(&mut self, span: Span, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.descend(span)?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Goes one nesting level deeper. The caller restores the depth.
    fn descend(&mut self, span: Span) -> Result<()> {
        if self.depth >= self.max_nesting {
            let limit = self.max_nesting;
            return Err(span.wrap(Error::NestingTooDeep { limit }));
        }
        self.depth += 1;
        Ok(())
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the `n`-th non-trivia token after the current one, without
    /// advancing. `peek_nth(0)` is the current token.
    fn peek_nth(&self, n: usize) -> Token {
        if n == 0 {
            return self.peek();
        }
        self.tokens
            .iter()
            .skip(self.cursor + 1)
            .filter(|token| !token.kind.is_trivia())
            .nth(n - 1)
            .copied()
            .unwrap_or_else(|| Token::eof_for(self.src))
    }

    /// Returns the current token and advances. Skips any trivia.
    fn advance(&mut self) -> Token {
        let c = self.peek(); // Before any advancement
        if c.is_eof() {
            return c;
        }
        while {
            self.cursor += 1;
            self.peek().kind.is_trivia()
        } {}
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            let error = Error::Unexpected {
                actual: c.kind,
                expected: expect,
            };
            Err(self.error_at(c, error))
        }
    }

    /// Advances if the current token matches any of the provided tokens,
    /// returning it. If not, fails.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        for t in expect {
            if self.is(*t) {
                return Ok(self.advance());
            }
        }
        let c = self.peek();
        Err(self.unexpected_any(c, expect))
    }

    fn unexpected_any(&self, token: Token, expected: &[TokenKind]) -> Spanned<Error> {
        let error = Error::UnexpectedAny {
            actual: token.kind,
            expected: Box::from(expected),
        };
        self.error_at(token, error)
    }

    /// Wraps the error in the token's span. Error tokens coming from the lexer
    /// take precedence over the parser's own error.
    fn error_at(&self, token: Token, error: Error) -> Spanned<Error> {
        if token.kind.is_error() {
            token.span().wrap(Error::Lexer(token.kind))
        } else {
            token.span().wrap(error)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedTokenInExpr {
        token: TokenKind,
    },
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    ParseInt,
    ParseReal,
    NestingTooDeep {
        limit: usize,
    },
    /// A token kind which holds the [`TokenKind::is_error`] property.
    Lexer(TokenKind),
}

impl From<std::num::ParseIntError> for Error {
    fn from(_: std::num::ParseIntError) -> Self {
        Error::ParseInt
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(_: std::num::ParseFloatError) -> Self {
        Error::ParseReal
    }
}
