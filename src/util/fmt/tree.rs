use std::fmt::{self, Write};

use crate::{
    ast::*,
    types::Type,
    util::fmt::{Context, Show},
};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string<I: InfoWriter>(ctx: &Context<'_>, program: &Program<I>) -> String {
    let mut buf = String::with_capacity(1024);
    print_program(&mut buf, ctx, program).expect("formatting into a String never fails");
    buf
}

pub fn print_expr_string<I: InfoWriter>(ctx: &Context<'_>, expr: &Expr<I>) -> String {
    let mut buf = String::with_capacity(512);
    print_expr(&mut buf, ctx, 0, expr).expect("formatting into a String never fails");
    buf
}

/// Prints every top-level item in source order.
pub fn print_program<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    program: &Program<I>,
) -> fmt::Result {
    for item in program.items() {
        match item {
            ItemRef::Record(record) => print_record(w, ctx, 0, record)?,
            ItemRef::Procedure(procedure) => print_proc(w, ctx, 0, procedure)?,
            ItemRef::Global(stmt) => print_stmt(w, ctx, 0, stmt)?,
        }
    }
    Ok(())
}

fn print_record<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    i: usize,
    record: &RecordDecl<I>,
) -> fmt::Result {
    let idents = ctx.ident_interner;
    sp(w, i)?;
    writeln!(w, "record {}", idents.get(record.name))?;
    for field in &record.fields {
        sp(w, i + 1)?;
        writeln!(w, "field {}: {}", idents.get(field.name), field.ty.display(ctx))?;
    }
    Ok(())
}

fn print_proc<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    i: usize,
    procedure: &ProcDecl<I>,
) -> fmt::Result {
    let idents = ctx.ident_interner;
    sp(w, i)?;
    write!(w, "proc {}(", idents.get(procedure.name))?;
    for (idx, param) in procedure.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{}: {}", idents.get(param.name), param.ty.display(ctx))?;
    }
    writeln!(w, ") : {}", procedure.return_ty.display(ctx))?;
    print_block(w, ctx, i + 1, &procedure.body)
}

fn print_block<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    i: usize,
    block: &Block<I>,
) -> fmt::Result {
    for stmt in &block.stmts {
        print_stmt(w, ctx, i, stmt)?;
    }
    Ok(())
}

fn print_stmt<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    i: usize,
    stmt: &Stmt<I>,
) -> fmt::Result {
    let idents = ctx.ident_interner;
    match stmt {
        Stmt::Decl(Decl::Record(record)) => return print_record(w, ctx, i, record),
        Stmt::Decl(Decl::Proc(procedure)) => return print_proc(w, ctx, i, procedure),
        Stmt::Decl(Decl::Binding(binding)) => {
            let keyword = binding.mutability.keyword();
            sp(w, i)?;
            writeln!(
                w,
                "{keyword} {}: {}",
                idents.get(binding.name),
                binding.ty.display(ctx)
            )?;
            if let Some(initializer) = &binding.initializer {
                print_expr(w, ctx, i + 1, initializer)?;
            }
        }
        Stmt::Assignment { target, value } => {
            sp(w, i)?;
            writeln!(w, "assignment")?;
            print_lvalue(w, ctx, i + 1, target)?;
            print_expr(w, ctx, i + 1, value)?;
        }
        Stmt::ArrayAssignment {
            target,
            index,
            value,
        } => {
            sp(w, i)?;
            writeln!(w, "array assignment {}", idents.get(target))?;
            print_expr(w, ctx, i + 1, index)?;
            print_expr(w, ctx, i + 1, value)?;
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            sp(w, i)?;
            writeln!(w, "if")?;
            print_expr(w, ctx, i + 1, cond)?;
            sp(w, i)?;
            writeln!(w, "then")?;
            print_block(w, ctx, i + 1, then_block)?;
            if let Some(else_block) = else_block {
                sp(w, i)?;
                writeln!(w, "else")?;
                print_block(w, ctx, i + 1, else_block)?;
            }
        }
        Stmt::While { cond, body } => {
            sp(w, i)?;
            writeln!(w, "while")?;
            print_expr(w, ctx, i + 1, cond)?;
            sp(w, i)?;
            writeln!(w, "do")?;
            print_block(w, ctx, i + 1, body)?;
        }
        Stmt::For {
            counter,
            range,
            body,
        } => {
            sp(w, i)?;
            match counter {
                Some(counter) => writeln!(w, "for {}", idents.get(counter))?,
                None => writeln!(w, "for")?,
            }
            print_expr(w, ctx, i + 1, &range.init)?;
            print_expr(w, ctx, i + 1, &range.end)?;
            print_expr(w, ctx, i + 1, &range.step)?;
            sp(w, i)?;
            writeln!(w, "do")?;
            print_block(w, ctx, i + 1, body)?;
        }
        Stmt::ProcCall(call) => {
            sp(w, i)?;
            writeln!(w, "call {} ({})", idents.get(call.callee), call.span)?;
            for arg in &call.args {
                print_expr(w, ctx, i + 1, arg)?;
            }
        }
        Stmt::Return { value, span } => {
            sp(w, i)?;
            writeln!(w, "return ({span})")?;
            if let Some(value) = value {
                print_expr(w, ctx, i + 1, value)?;
            }
        }
    }
    Ok(())
}

fn print_lvalue<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    i: usize,
    lvalue: &LValue<I>,
) -> fmt::Result {
    let idents = ctx.ident_interner;
    let info = Resolved(&lvalue.info, ctx);
    let span = lvalue.span;
    sp(w, i)?;
    match &lvalue.kind {
        LValueKind::Ident(ident) => {
            writeln!(w, "ident {} ({span}{info})", idents.get(ident))?;
        }
        LValueKind::ArrayElement { array, index } => {
            writeln!(w, "element {} ({span}{info})", idents.get(array))?;
            print_expr(w, ctx, i + 1, index)?;
        }
        LValueKind::RecordField { base, field } => {
            writeln!(w, "field {} ({span}{info})", idents.get(field))?;
            print_lvalue(w, ctx, i + 1, base)?;
        }
    }
    Ok(())
}

pub fn print_expr<I: InfoWriter>(
    w: &mut impl Write,
    ctx: &Context<'_>,
    i: usize,
    expr: &Expr<I>,
) -> fmt::Result {
    let idents = ctx.ident_interner;
    sp(w, i)?;
    let info = Resolved(&expr.info, ctx); // inferred type, for typed ASTs
    let span = expr.span;
    match &expr.kind {
        ExprKind::Int(val) => writeln!(w, "int {val} ({span}{info})")?,
        ExprKind::Real(val) => writeln!(w, "real {val:?} ({span}{info})")?,
        ExprKind::Bool(val) => writeln!(w, "bool {val} ({span}{info})")?,
        ExprKind::String(val) => writeln!(w, "string {val:?} ({span}{info})")?,
        ExprKind::Id(ident) => writeln!(w, "ident {} ({span}{info})", idents.get(ident))?,
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?} ({span}{info})")?;
            print_expr(w, ctx, i + 1, inner_expr)?;
        }
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span}{info})")?;
            print_expr(w, ctx, i + 1, lhs)?;
            print_expr(w, ctx, i + 1, rhs)?;
        }
        ExprKind::Array {
            elem_ty,
            size,
            elements,
        } => {
            writeln!(w, "array {} ({span}{info})", elem_ty.display(ctx))?;
            print_expr(w, ctx, i + 1, size)?;
            for element in elements {
                print_expr(w, ctx, i + 1, element)?;
            }
        }
        ExprKind::ArrayAccess { array, index } => {
            writeln!(w, "access {} ({span}{info})", idents.get(array))?;
            print_expr(w, ctx, i + 1, index)?;
        }
        ExprKind::Record { ty, fields } => {
            writeln!(w, "record {} ({span}{info})", ty.display(ctx))?;
            for field in fields {
                print_expr(w, ctx, i + 1, field)?;
            }
        }
        ExprKind::FieldAccess { base, field } => {
            writeln!(w, "field {} ({span}{info})", idents.get(field))?;
            print_expr(w, ctx, i + 1, base)?;
        }
        ExprKind::Call(call) => {
            writeln!(w, "call {} ({span}{info})", idents.get(call.callee))?;
            for arg in &call.args {
                print_expr(w, ctx, i + 1, arg)?;
            }
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> fmt::Result {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub trait InfoWriter: Info<Ty: Show, Expr: ResolvedWriter> {}

impl<I> InfoWriter for I
where
    I: Info,
    I::Ty: Show,
    I::Expr: ResolvedWriter,
{
}

/// Writes what the checker resolved for a node, if anything.
pub trait ResolvedWriter {
    fn write_resolved(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result;
}

impl ResolvedWriter for () {
    fn write_resolved(&self, _: &mut fmt::Formatter<'_>, _: &Context<'_>) -> fmt::Result {
        Ok(())
    }
}

impl ResolvedWriter for Type {
    fn write_resolved(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        write!(f, " %: {}", self.display(ctx))
    }
}

struct Resolved<'a, 'c, 'i, T>(&'a T, &'c Context<'i>);

impl<T: ResolvedWriter> fmt::Display for Resolved<'_, '_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_resolved(f, self.1)
    }
}
