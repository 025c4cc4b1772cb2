// program ::= (record | decl | proc | ident_stmt | ';')*
// record ::= 'record' ID '{' (ID type ';')+ '}'
// decl ::= ('const' | 'var' | 'val') ID type ['=' expr] ';'
// proc ::= 'proc' ID '(' [ID type (',' ID type)*] ')' type block
// type ::= 'void' | ID ['[' ']']
// block ::= '{' stmt* '}'
// stmt ::= ';' | if | while | for | return ';' | decl | record | proc | ident_stmt
// if ::= 'if' expr block ['else' (if | block)]
// while ::= 'while' expr block
// for ::= 'for' [ID '='] expr 'to' expr 'by' expr block
// return ::= 'return' [expr]
// ident_stmt ::= ID '(' [expr (',' expr)*] ')' ';'
//              | ID '[' expr ']' '=' expr ';'
//              | ID ['[' expr ']'] ('.' ID)+ '=' expr ';'
//              | ID '=' expr ';'
// expr ::= expr binop expr
//        | '-' expr
//        | '(' expr ')'
//        | ID '[' ']' '(' expr ')'
//        | ID '[' expr ']'
//        | ID '(' [expr (',' expr)*] ')'
//        | expr '.' ID
//        | ID
//        | integer
//        | real
//        | string
//        | true
//        | false

// Precedence
//
// .
// - (prefix)
// * / %
// + -
// < > <= >=
// == !=
// and
// or

use std::{fmt::Debug, vec};

use crate::{token::Span, types::Type, util::intern::Interned};

/// Describes what the tree carries at each phase.
pub trait Info {
    /// A written type annotation.
    type Ty: Debug + PartialEq;
    /// What every expression node carries.
    type Expr: Debug + PartialEq;
}

/// The tree as produced by the parser.
#[derive(Debug, PartialEq)]
pub struct Untyped;

impl Info for Untyped {
    type Ty = TypeName;
    type Expr = ();
}

/// The tree as produced by the checker. Every expression owns its type.
#[derive(Debug, PartialEq)]
pub struct Typed;

impl Info for Typed {
    type Ty = Type;
    type Expr = Type;
}

/// A whole source file.
///
/// Top-level items are split by kind, but their relative source order is
/// preserved and can be recovered with [`Program::items`].
#[derive(Debug, PartialEq)]
pub struct Program<I: Info> {
    pub records: Vec<RecordDecl<I>>,
    pub procedures: Vec<ProcDecl<I>>,
    /// Top-level bindings and statements.
    pub globals: Vec<Stmt<I>>,
    order: Vec<ItemKind>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ItemKind {
    Record,
    Procedure,
    Global,
}

impl<I: Info> Default for Program<I> {
    fn default() -> Self {
        Program {
            records: Vec::new(),
            procedures: Vec::new(),
            globals: Vec::new(),
            order: Vec::new(),
        }
    }
}

/// A borrowed top-level item.
#[derive(Debug)]
pub enum ItemRef<'a, I: Info> {
    Record(&'a RecordDecl<I>),
    Procedure(&'a ProcDecl<I>),
    Global(&'a Stmt<I>),
}

/// An owned top-level item.
#[derive(Debug)]
pub enum Item<I: Info> {
    Record(RecordDecl<I>),
    Procedure(ProcDecl<I>),
    Global(Stmt<I>),
}

impl<I: Info> Program<I> {
    pub fn push_record(&mut self, record: RecordDecl<I>) {
        self.records.push(record);
        self.order.push(ItemKind::Record);
    }

    pub fn push_procedure(&mut self, procedure: ProcDecl<I>) {
        self.procedures.push(procedure);
        self.order.push(ItemKind::Procedure);
    }

    pub fn push_global(&mut self, stmt: Stmt<I>) {
        self.globals.push(stmt);
        self.order.push(ItemKind::Global);
    }

    pub fn push(&mut self, item: Item<I>) {
        match item {
            Item::Record(record) => self.push_record(record),
            Item::Procedure(procedure) => self.push_procedure(procedure),
            Item::Global(stmt) => self.push_global(stmt),
        }
    }

    /// Number of top-level items.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over all top-level items in source order.
    pub fn items(&self) -> impl Iterator<Item = ItemRef<'_, I>> {
        let mut records = self.records.iter();
        let mut procedures = self.procedures.iter();
        let mut globals = self.globals.iter();
        self.order.iter().filter_map(move |kind| match kind {
            ItemKind::Record => records.next().map(ItemRef::Record),
            ItemKind::Procedure => procedures.next().map(ItemRef::Procedure),
            ItemKind::Global => globals.next().map(ItemRef::Global),
        })
    }

    /// Consumes the program, yielding all top-level items in source order.
    pub fn into_items(self) -> IntoItems<I> {
        IntoItems {
            records: self.records.into_iter(),
            procedures: self.procedures.into_iter(),
            globals: self.globals.into_iter(),
            order: self.order.into_iter(),
        }
    }
}

pub struct IntoItems<I: Info> {
    records: vec::IntoIter<RecordDecl<I>>,
    procedures: vec::IntoIter<ProcDecl<I>>,
    globals: vec::IntoIter<Stmt<I>>,
    order: vec::IntoIter<ItemKind>,
}

impl<I: Info> Iterator for IntoItems<I> {
    type Item = Item<I>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.order.next()? {
            ItemKind::Record => self.records.next().map(Item::Record),
            ItemKind::Procedure => self.procedures.next().map(Item::Procedure),
            ItemKind::Global => self.globals.next().map(Item::Global),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

#[derive(Debug, PartialEq)]
pub enum Decl<I: Info> {
    Binding(Binding<I>),
    Proc(ProcDecl<I>),
    Record(RecordDecl<I>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mutability {
    Const,
    Var,
    Val,
}

impl Mutability {
    /// Whether the binding may be assigned after its declaration.
    pub fn is_reassignable(self) -> bool {
        self == Mutability::Var
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Mutability::Const => "const",
            Mutability::Var => "var",
            Mutability::Val => "val",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Binding<I: Info> {
    pub mutability: Mutability,
    pub name: Ident,
    pub ty: I::Ty,
    pub initializer: Option<Expr<I>>,
}

#[derive(Debug, PartialEq)]
pub struct ProcDecl<I: Info> {
    pub name: Ident,
    pub params: Vec<Param<I>>,
    pub return_ty: I::Ty,
    pub body: Block<I>,
}

#[derive(Debug, PartialEq)]
pub struct Param<I: Info> {
    pub name: Ident,
    pub ty: I::Ty,
}

#[derive(Debug, PartialEq)]
pub struct RecordDecl<I: Info> {
    pub name: Ident,
    /// Non empty list of fields, in declaration order.
    pub fields: Vec<RecordEntry<I>>,
}

#[derive(Debug, PartialEq)]
pub struct RecordEntry<I: Info> {
    pub name: Ident,
    pub ty: I::Ty,
}

#[derive(Debug, PartialEq)]
pub struct Block<I: Info> {
    pub stmts: Vec<Stmt<I>>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum Stmt<I: Info> {
    Decl(Decl<I>),
    Assignment {
        target: LValue<I>,
        value: Expr<I>,
    },
    ArrayAssignment {
        target: Ident,
        index: Expr<I>,
        value: Expr<I>,
    },
    If {
        cond: Expr<I>,
        then_block: Block<I>,
        /// An `else if` chain is an else block holding a single `If`.
        else_block: Option<Block<I>>,
    },
    While {
        cond: Expr<I>,
        body: Block<I>,
    },
    For {
        counter: Option<Ident>,
        range: Range<I>,
        body: Block<I>,
    },
    ProcCall(Call<I>),
    Return {
        value: Option<Expr<I>>,
        span: Span,
    },
}

/// The `init to end by step` part of a for loop.
#[derive(Debug, PartialEq)]
pub struct Range<I: Info> {
    pub init: Expr<I>,
    pub end: Expr<I>,
    pub step: Expr<I>,
}

#[derive(Debug, PartialEq)]
pub struct Call<I: Info> {
    pub callee: Ident,
    pub args: Vec<Expr<I>>,
    pub span: Span,
}

/// The target of an assignment.
#[derive(Debug, PartialEq)]
pub struct LValue<I: Info> {
    pub kind: LValueKind<I>,
    pub span: Span,
    pub info: I::Expr,
}

#[derive(Debug, PartialEq)]
pub enum LValueKind<I: Info> {
    Ident(Ident),
    ArrayElement {
        array: Ident,
        index: Box<Expr<I>>,
    },
    RecordField {
        base: Box<LValue<I>>,
        field: Ident,
    },
}

#[derive(Debug, PartialEq)]
pub struct Expr<I: Info> {
    pub kind: ExprKind<I>,
    pub span: Span,
    pub info: I::Expr,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind<I: Info> {
    Int(i64),
    Real(f64),
    Bool(bool),
    String(Box<str>),
    Id(Ident),
    Unary {
        op: UnaryOperator,
        expr: Box<Expr<I>>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr<I>>,
        rhs: Box<Expr<I>>,
    },
    /// `T[](size)`. The parser never fills `elements`.
    Array {
        elem_ty: I::Ty,
        size: Box<Expr<I>>,
        elements: Vec<Expr<I>>,
    },
    ArrayAccess {
        array: Ident,
        index: Box<Expr<I>>,
    },
    /// `P(a, b)`. The i-th value initializes the i-th declared field.
    Record {
        ty: I::Ty,
        fields: Vec<Expr<I>>,
    },
    FieldAccess {
        base: Box<Expr<I>>,
        field: Ident,
    },
    Call(Call<I>),
}

impl<I: Info> Expr<I> {
    /// Returns the value of an integer literal, possibly negated.
    pub fn constant_int(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::Int(value) => Some(*value),
            ExprKind::Unary {
                op: UnaryOperator::Neg,
                expr,
            } => expr.constant_int().map(i64::wrapping_neg),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Add | Sub | Mul | Div | Rem)
    }

    pub fn is_ordering(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Lt | Gt | Le | Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Eq | BinaryOperator::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            And => "and",
            Or => "or",
        }
    }
}

/// A type as written in the source: `int`, `P`, `real[]`, `void`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TypeName {
    pub name: Ident,
    pub array: bool,
    pub span: Span,
}

impl TypeName {
    pub fn name(&self) -> Interned<str> {
        self.name.name
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Interned<str>,
    pub span: Span,
}

impl From<Ident> for Interned<str> {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Interned<str> {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
