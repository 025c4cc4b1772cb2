use std::rc::Rc;

use log::debug;

use crate::{
    ast::{
        BinaryOperator, Binding, Block, Call, Decl, Expr, ExprKind, Ident, Item, LValue,
        LValueKind, Mutability, Param, ProcDecl, Program, Range, RecordDecl, RecordEntry, Stmt,
        TypeName, Typed, UnaryOperator, Untyped,
    },
    scope::{Signature, Symbol, SymbolTable},
    token::{Span, Spanned},
    types::{FieldDef, RecordDef, RecordRegistry, Type},
    util::intern::Interned,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub type CheckResult = Result<(Program<Typed>, RecordRegistry)>;

/// Checks the soundness of a program's names and types, mapping its untyped
/// tree into a typed one. The first error aborts the check.
pub struct Checker {
    registry: RecordRegistry,
    symbols: SymbolTable,
    /// Procedures whose bodies are being checked, innermost last.
    procedures: Vec<ProcContext>,
}

struct ProcContext {
    name: Interned<str>,
    return_ty: Type,
    returns: usize,
}

impl Checker {
    pub fn with_capacity(capacity: usize) -> Checker {
        Checker {
            registry: RecordRegistry::with_capacity(capacity),
            symbols: SymbolTable::with_capacity(capacity),
            procedures: Vec::with_capacity(4),
        }
    }

    /// Checks every top-level item in source order.
    pub fn check(mut self, program: Program<Untyped>) -> CheckResult {
        let mut typed = Program::default();
        for item in program.into_items() {
            let item = match item {
                Item::Record(record) => Item::Record(self.check_record(record)?),
                Item::Procedure(procedure) => Item::Procedure(self.check_proc(procedure)?),
                Item::Global(stmt) => Item::Global(self.check_stmt(stmt)?),
            };
            typed.push(item);
        }
        Ok((typed, self.registry))
    }

    fn check_record(&mut self, record: RecordDecl<Untyped>) -> Result<RecordDecl<Typed>> {
        let RecordDecl { name, fields } = record;
        let duplicate = || name.span.wrap(Error::DuplicateRecordType(name.name));

        // The record is defined before its fields are resolved, so that a
        // field may mention the record itself.
        let def = RecordDef {
            name: name.name,
            span: name.span,
            fields: Vec::new(),
        };
        if self.symbols.is_declared_in_current(name.name) || self.registry.define(def).is_err() {
            return Err(duplicate());
        }
        self.symbols
            .declare(name.name, Symbol::Record)
            .map_err(|_| duplicate())?;

        let mut defs: Vec<FieldDef> = Vec::with_capacity(fields.len());
        let mut entries = Vec::with_capacity(fields.len());
        for RecordEntry { name: field, ty } in fields {
            if defs.iter().any(|def| def.name == field.name) {
                let error = Error::DuplicateField {
                    record: name.name,
                    field: field.name,
                };
                return Err(field.span.wrap(error));
            }
            let ty = self.resolve_value_type(field, &ty)?;
            defs.push(FieldDef {
                name: field.name,
                ty: ty.clone(),
            });
            entries.push(RecordEntry { name: field, ty });
        }
        if let Some(def) = self.registry.get_mut(name.name) {
            def.fields = defs;
        }

        debug!("declared record {:?} at {}", name.name, name.span);
        Ok(RecordDecl {
            name,
            fields: entries,
        })
    }

    fn check_binding(&mut self, binding: Binding<Untyped>) -> Result<Binding<Typed>> {
        let Binding {
            mutability,
            name,
            ty,
            initializer,
        } = binding;

        if self.symbols.is_declared_in_current(name.name) {
            return Err(name.span.wrap(Error::DuplicateVariableName(name.name)));
        }
        let Some(initializer) = initializer else {
            return Err(name.span.wrap(Error::UninitializedVariable(name.name)));
        };
        let ty = self.resolve_value_type(name, &ty)?;

        let initializer = self.check_expr(initializer)?;
        if initializer.info != ty {
            let mismatch = Mismatch::Declaration {
                name: name.name,
                expected: ty,
                found: initializer.info,
            };
            return Err(initializer.span.wrap(Error::TypeMismatch(mismatch)));
        }

        let symbol = Symbol::Variable {
            ty: ty.clone(),
            mutability,
            len: array_len(&initializer),
        };
        self.declare(name, symbol, Error::DuplicateVariableName)?;

        Ok(Binding {
            mutability,
            name,
            ty,
            initializer: Some(initializer),
        })
    }

    fn check_proc(&mut self, procedure: ProcDecl<Untyped>) -> Result<ProcDecl<Typed>> {
        let ProcDecl {
            name,
            params,
            return_ty,
            body,
        } = procedure;

        if self.symbols.is_declared_in_current(name.name) {
            return Err(name.span.wrap(Error::DuplicateProcedureName(name.name)));
        }
        let return_ty = self.resolve(&return_ty)?;
        let param_tys = params
            .iter()
            .map(|param| self.resolve_value_type(param.name, &param.ty))
            .collect::<Result<Vec<_>>>()?;

        // Declared before the body is checked, which allows recursion.
        let signature = Signature {
            params: param_tys.clone(),
            return_ty: return_ty.clone(),
        };
        let symbol = Symbol::Procedure(Rc::new(signature));
        self.declare(name, symbol, Error::DuplicateProcedureName)?;

        // Parameters and the body's top-level statements share one scope.
        self.symbols.enter();
        let mut typed_params = Vec::with_capacity(params.len());
        for (param, ty) in params.into_iter().zip(param_tys) {
            let symbol = Symbol::Variable {
                ty: ty.clone(),
                mutability: Mutability::Var,
                len: None,
            };
            self.declare(param.name, symbol, Error::DuplicateParameterName)?;
            typed_params.push(Param {
                name: param.name,
                ty,
            });
        }

        self.procedures.push(ProcContext {
            name: name.name,
            return_ty: return_ty.clone(),
            returns: 0,
        });
        let body = self.check_stmts(body)?;
        let returns = self.procedures.pop().map_or(0, |context| context.returns);
        self.symbols.exit();

        if return_ty != Type::Void && returns == 0 {
            let error = Error::ReturnTypeMismatch {
                procedure: Some(name.name),
                expected: return_ty,
                found: None,
            };
            return Err(name.span.wrap(error));
        }

        Ok(ProcDecl {
            name,
            params: typed_params,
            return_ty,
            body,
        })
    }

    /// Checks the block in a new scope.
    fn check_block(&mut self, block: Block<Untyped>) -> Result<Block<Typed>> {
        self.symbols.enter();
        let block = self.check_stmts(block)?;
        self.symbols.exit();
        Ok(block)
    }

    /// Checks the block's statements in the current scope.
    fn check_stmts(&mut self, block: Block<Untyped>) -> Result<Block<Typed>> {
        let stmts = block
            .stmts
            .into_iter()
            .map(|stmt| self.check_stmt(stmt))
            .collect::<Result<Vec<_>>>()?;
        Ok(Block {
            stmts,
            span: block.span,
        })
    }

    fn check_stmt(&mut self, stmt: Stmt<Untyped>) -> Result<Stmt<Typed>> {
        let stmt = match stmt {
            Stmt::Decl(Decl::Binding(binding)) => {
                Stmt::Decl(Decl::Binding(self.check_binding(binding)?))
            }
            Stmt::Decl(Decl::Proc(procedure)) => {
                Stmt::Decl(Decl::Proc(self.check_proc(procedure)?))
            }
            Stmt::Decl(Decl::Record(record)) => {
                Stmt::Decl(Decl::Record(self.check_record(record)?))
            }
            Stmt::Assignment { target, value } => {
                let target = self.check_lvalue(target)?;
                if let LValueKind::Ident(ident) = &target.kind {
                    self.check_reassignable(*ident)?;
                }
                let value = self.check_expr(value)?;
                expect_assignable(&target.info, &value)?;

                // The array now held is of unknown length.
                if let LValueKind::Ident(ident) = &target.kind {
                    let symbol = self.symbols.lookup_mut(ident.name);
                    if let Some(Symbol::Variable { len, .. }) = symbol {
                        *len = None;
                    }
                }
                Stmt::Assignment { target, value }
            }
            Stmt::ArrayAssignment {
                target,
                index,
                value,
            } => {
                let (element_ty, len) = self.array_variable(target)?;
                let index = self.check_index(index)?;
                check_bounds(target, &index, len)?;
                let value = self.check_expr(value)?;
                expect_assignable(&element_ty, &value)?;
                Stmt::ArrayAssignment {
                    target,
                    index,
                    value,
                }
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.check_condition(cond)?;
                let then_block = self.check_block(then_block)?;
                let else_block = else_block
                    .map(|block| self.check_block(block))
                    .transpose()?;
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                }
            }
            Stmt::While { cond, body } => {
                let cond = self.check_condition(cond)?;
                let body = self.check_block(body)?;
                Stmt::While { cond, body }
            }
            Stmt::For {
                counter,
                range,
                body,
            } => {
                let init = self.check_loop_bound(range.init)?;
                let end = self.check_loop_bound(range.end)?;
                let step = self.check_loop_bound(range.step)?;
                let range_ty = if [&init, &end, &step].iter().any(|e| e.info == Type::Real) {
                    Type::Real
                } else {
                    Type::Int
                };
                if let Some(counter) = counter {
                    let ty = self.variable_type(counter)?;
                    self.check_reassignable(counter)?;
                    if ty != range_ty {
                        let mismatch = Mismatch::LoopCounter {
                            expected: range_ty,
                            found: ty,
                        };
                        return Err(counter.span.wrap(Error::TypeMismatch(mismatch)));
                    }
                }
                let body = self.check_block(body)?;
                Stmt::For {
                    counter,
                    range: Range { init, end, step },
                    body,
                }
            }
            Stmt::ProcCall(call) => {
                let (call, _) = self.check_call(call)?;
                Stmt::ProcCall(call)
            }
            Stmt::Return { value, span } => {
                let value = value.map(|value| self.check_expr(value)).transpose()?;
                self.check_return(value.as_ref(), span)?;
                Stmt::Return { value, span }
            }
        };
        Ok(stmt)
    }

    fn check_return(&mut self, value: Option<&Expr<Typed>>, span: Span) -> Result<()> {
        let found = value.map(|value| value.info.clone());
        let Some(context) = self.procedures.last_mut() else {
            let error = Error::ReturnTypeMismatch {
                procedure: None,
                expected: Type::Void,
                found,
            };
            return Err(span.wrap(error));
        };
        // Void procedures may not return at all.
        if context.return_ty == Type::Void || found.as_ref() != Some(&context.return_ty) {
            let error = Error::ReturnTypeMismatch {
                procedure: Some(context.name),
                expected: context.return_ty.clone(),
                found,
            };
            return Err(span.wrap(error));
        }
        context.returns += 1;
        Ok(())
    }

    fn check_lvalue(&mut self, lvalue: LValue<Untyped>) -> Result<LValue<Typed>> {
        let LValue { kind, span, .. } = lvalue;
        let (kind, ty) = match kind {
            LValueKind::Ident(ident) => (LValueKind::Ident(ident), self.variable_type(ident)?),
            LValueKind::ArrayElement { array, index } => {
                let (element_ty, len) = self.array_variable(array)?;
                let index = self.check_index(*index)?;
                check_bounds(array, &index, len)?;
                let kind = LValueKind::ArrayElement {
                    array,
                    index: Box::new(index),
                };
                (kind, element_ty)
            }
            LValueKind::RecordField { base, field } => {
                let base = self.check_lvalue(*base)?;
                let ty = self.field_type(&base.info, field, span)?;
                let kind = LValueKind::RecordField {
                    base: Box::new(base),
                    field,
                };
                (kind, ty)
            }
        };
        Ok(LValue {
            kind,
            span,
            info: ty,
        })
    }

    fn check_expr(&mut self, expr: Expr<Untyped>) -> Result<Expr<Typed>> {
        let Expr { kind, span, .. } = expr;
        let (kind, ty) = match kind {
            ExprKind::Int(value) => (ExprKind::Int(value), Type::Int),
            ExprKind::Real(value) => (ExprKind::Real(value), Type::Real),
            ExprKind::Bool(value) => (ExprKind::Bool(value), Type::Bool),
            ExprKind::String(value) => (ExprKind::String(value), Type::String),
            ExprKind::Id(ident) => (ExprKind::Id(ident), self.variable_type(ident)?),
            ExprKind::Unary {
                op: UnaryOperator::Neg,
                expr,
            } => {
                let expr = self.check_expr(*expr)?;
                if !expr.info.is_numeric() {
                    let mismatch = Mismatch::Negation {
                        found: expr.info.clone(),
                    };
                    return Err(span.wrap(Error::TypeMismatch(mismatch)));
                }
                let ty = expr.info.clone();
                let unary = ExprKind::Unary {
                    op: UnaryOperator::Neg,
                    expr: Box::new(expr),
                };
                (unary, ty)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expr(*lhs)?;
                let rhs = self.check_expr(*rhs)?;
                let Some(ty) = binary_type(op, &lhs.info, &rhs.info) else {
                    let mismatch = Mismatch::Operands {
                        op,
                        lhs: lhs.info,
                        rhs: rhs.info,
                    };
                    return Err(span.wrap(Error::TypeMismatch(mismatch)));
                };
                let binary = ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (binary, ty)
            }
            ExprKind::Array {
                elem_ty,
                size,
                elements,
            } => {
                let elem_ty = self.resolve(&elem_ty)?;
                let size = self.check_expr(*size)?;
                if size.info != Type::Int {
                    let mismatch = Mismatch::ArraySize {
                        found: size.info.clone(),
                    };
                    return Err(size.span.wrap(Error::TypeMismatch(mismatch)));
                }
                let mut typed_elements = Vec::with_capacity(elements.len());
                for element in elements {
                    let element = self.check_expr(element)?;
                    if element.info != elem_ty {
                        let mismatch = Mismatch::ArrayElement {
                            expected: elem_ty,
                            found: element.info,
                        };
                        return Err(element.span.wrap(Error::TypeMismatch(mismatch)));
                    }
                    typed_elements.push(element);
                }
                let ty = Type::array_of(elem_ty.clone());
                let array = ExprKind::Array {
                    elem_ty,
                    size: Box::new(size),
                    elements: typed_elements,
                };
                (array, ty)
            }
            ExprKind::ArrayAccess { array, index } => {
                let (element_ty, len) = self.array_variable(array)?;
                let index = self.check_index(*index)?;
                check_bounds(array, &index, len)?;
                let access = ExprKind::ArrayAccess {
                    array,
                    index: Box::new(index),
                };
                (access, element_ty)
            }
            ExprKind::Record { ty, fields } => self.check_record_literal(ty, fields, span)?,
            ExprKind::FieldAccess { base, field } => {
                let base = self.check_expr(*base)?;
                let ty = self.field_type(&base.info, field, span)?;
                let access = ExprKind::FieldAccess {
                    base: Box::new(base),
                    field,
                };
                (access, ty)
            }
            ExprKind::Call(call) => {
                let (call, ty) = self.check_call(call)?;
                (ExprKind::Call(call), ty)
            }
        };
        Ok(Expr {
            kind,
            span,
            info: ty,
        })
    }

    fn check_record_literal(
        &mut self,
        ty: TypeName,
        values: Vec<Expr<Untyped>>,
        span: Span,
    ) -> Result<(ExprKind<Typed>, Type)> {
        let name = ty.name();
        let Some(def) = self.registry.get(name).filter(|_| !ty.array) else {
            return Err(ty.span.wrap(Error::UndeclaredIdentifier(name)));
        };
        let expected: Vec<(Interned<str>, Type)> = def
            .fields
            .iter()
            .map(|field| (field.name, field.ty.clone()))
            .collect();

        if values.len() != expected.len() {
            let error = Error::ArgumentCountMismatch {
                callee: name,
                expected: expected.len(),
                found: values.len(),
            };
            return Err(span.wrap(error));
        }

        let mut fields = Vec::with_capacity(values.len());
        for (value, (field, field_ty)) in values.into_iter().zip(expected) {
            let value = self.check_expr(value)?;
            if value.info != field_ty {
                let mismatch = Mismatch::Field {
                    record: name,
                    field,
                    expected: field_ty,
                    found: value.info,
                };
                return Err(value.span.wrap(Error::TypeMismatch(mismatch)));
            }
            fields.push(value);
        }

        let ty = Type::Record(name);
        Ok((
            ExprKind::Record {
                ty: ty.clone(),
                fields,
            },
            ty,
        ))
    }

    /// Checks a call, returning it along with the callee's return type.
    fn check_call(&mut self, call: Call<Untyped>) -> Result<(Call<Typed>, Type)> {
        let Call { callee, args, span } = call;
        let signature = match self.symbols.lookup(callee.name) {
            Some(Symbol::Procedure(signature)) => Rc::clone(signature),
            Some(_) => return Err(callee.span.wrap(Error::InvalidProcedureCall(callee.name))),
            None => return Err(callee.span.wrap(Error::UndefinedProcedure(callee.name))),
        };

        if args.len() != signature.params.len() {
            let error = Error::ArgumentCountMismatch {
                callee: callee.name,
                expected: signature.params.len(),
                found: args.len(),
            };
            return Err(span.wrap(error));
        }

        let mut typed_args = Vec::with_capacity(args.len());
        for (position, (arg, expected)) in args.into_iter().zip(&signature.params).enumerate() {
            let arg = self.check_expr(arg)?;
            if &arg.info != expected {
                let error = Error::ArgumentTypeMismatch {
                    callee: callee.name,
                    position: position + 1,
                    expected: expected.clone(),
                    found: arg.info,
                };
                return Err(arg.span.wrap(error));
            }
            typed_args.push(arg);
        }

        let call = Call {
            callee,
            args: typed_args,
            span,
        };
        Ok((call, signature.return_ty.clone()))
    }

    fn check_condition(&mut self, cond: Expr<Untyped>) -> Result<Expr<Typed>> {
        let cond = self.check_expr(cond)?;
        if cond.info != Type::Bool {
            let mismatch = Mismatch::Condition {
                found: cond.info.clone(),
            };
            return Err(cond.span.wrap(Error::TypeMismatch(mismatch)));
        }
        Ok(cond)
    }

    fn check_loop_bound(&mut self, bound: Expr<Untyped>) -> Result<Expr<Typed>> {
        let bound = self.check_expr(bound)?;
        if !bound.info.is_numeric() {
            let mismatch = Mismatch::LoopBound {
                found: bound.info.clone(),
            };
            return Err(bound.span.wrap(Error::TypeMismatch(mismatch)));
        }
        Ok(bound)
    }

    fn check_index(&mut self, index: Expr<Untyped>) -> Result<Expr<Typed>> {
        let index = self.check_expr(index)?;
        if index.info != Type::Int {
            let mismatch = Mismatch::Index {
                found: index.info.clone(),
            };
            return Err(index.span.wrap(Error::TypeMismatch(mismatch)));
        }
        Ok(index)
    }

    /// Resolves a written type. Non-primitive names must denote a declared
    /// record.
    fn resolve(&self, ty: &TypeName) -> Result<Type> {
        let name = ty.name();
        let base = match Type::primitive(name) {
            Some(primitive) => primitive,
            None if self.registry.has(name) => Type::Record(name),
            None => return Err(ty.name.span.wrap(Error::UndeclaredIdentifier(name))),
        };
        if ty.array {
            Ok(Type::array_of(base))
        } else {
            Ok(base)
        }
    }

    /// Resolves the type of a variable, parameter or field. Only procedures
    /// may be `void`.
    fn resolve_value_type(&self, holder: Ident, ty: &TypeName) -> Result<Type> {
        let resolved = self.resolve(ty)?;
        if resolved == Type::Void {
            return Err(ty.span.wrap(Error::VoidValue(holder.name)));
        }
        Ok(resolved)
    }

    /// Only `var` bindings and parameters may be assigned as a whole. Elements
    /// and fields reached through a `const` or `val` binding stay writable.
    fn check_reassignable(&self, ident: Ident) -> Result<()> {
        match self.symbols.lookup(ident.name) {
            Some(Symbol::Variable { mutability, .. }) if !mutability.is_reassignable() => {
                let error = Error::ImmutableAssignment {
                    name: ident.name,
                    mutability: *mutability,
                };
                Err(ident.span.wrap(error))
            }
            _ => Ok(()),
        }
    }

    /// Returns the type of the variable with the provided name. Procedures and
    /// records don't count as variables.
    fn variable_type(&self, ident: Ident) -> Result<Type> {
        match self.symbols.lookup(ident.name) {
            Some(Symbol::Variable { ty, .. }) => Ok(ty.clone()),
            _ => Err(ident.span.wrap(Error::UndeclaredIdentifier(ident.name))),
        }
    }

    /// Returns the element type and the known length of an array variable.
    fn array_variable(&self, ident: Ident) -> Result<(Type, Option<i64>)> {
        let Some(Symbol::Variable { ty, len, .. }) = self.symbols.lookup(ident.name) else {
            return Err(ident.span.wrap(Error::UndeclaredIdentifier(ident.name)));
        };
        match ty.element() {
            Some(element) => Ok((element.clone(), *len)),
            None => {
                let mismatch = Mismatch::NotArray {
                    name: ident.name,
                    found: ty.clone(),
                };
                Err(ident.span.wrap(Error::TypeMismatch(mismatch)))
            }
        }
    }

    fn field_type(&self, base: &Type, field: Ident, span: Span) -> Result<Type> {
        let not_record = || {
            let mismatch = Mismatch::NotRecord {
                field: field.name,
                found: base.clone(),
            };
            span.wrap(Error::TypeMismatch(mismatch))
        };
        let record = base.record_name().ok_or_else(not_record)?;
        let def = self.registry.get(record).ok_or_else(not_record)?;
        match def.field(field.name) {
            Some((_, ty)) => Ok(ty.clone()),
            None => Err(field.span.wrap(Error::UndeclaredIdentifier(field.name))),
        }
    }

    fn declare(
        &mut self,
        name: Ident,
        symbol: Symbol,
        duplicate: fn(Interned<str>) -> Error,
    ) -> Result<()> {
        self.symbols
            .declare(name.name, symbol)
            .map_err(|_| name.span.wrap(duplicate(name.name)))?;
        debug!(
            "declared {:?} at {} in scope depth {}",
            name.name,
            name.span,
            self.symbols.depth()
        );
        Ok(())
    }
}

/// Types a binary operation from its operand types. Operands must reconcile
/// first; the operator class then restricts and picks the result.
fn binary_type(op: BinaryOperator, lhs: &Type, rhs: &Type) -> Option<Type> {
    let ty = lhs.reconcile(rhs).filter(|ty| *ty != Type::Void)?;
    if op.is_logical() {
        (ty == Type::Bool).then_some(Type::Bool)
    } else if op.is_equality() {
        Some(Type::Bool)
    } else if op.is_ordering() {
        ty.is_numeric().then_some(Type::Bool)
    } else if op == BinaryOperator::Add && ty == Type::String {
        Some(Type::String)
    } else if op.is_arithmetic() {
        ty.is_numeric().then_some(ty)
    } else {
        None
    }
}

fn expect_assignable(target: &Type, value: &Expr<Typed>) -> Result<()> {
    if &value.info == target {
        return Ok(());
    }
    let mismatch = Mismatch::Assignment {
        expected: target.clone(),
        found: value.info.clone(),
    };
    Err(value.span.wrap(Error::TypeMismatch(mismatch)))
}

/// Rejects constant indices outside a statically known length. Anything else
/// is left to the emitted code.
fn check_bounds(array: Ident, index: &Expr<Typed>, len: Option<i64>) -> Result<()> {
    let (Some(index_value), Some(len)) = (index.constant_int(), len) else {
        return Ok(());
    };
    if (0..len).contains(&index_value) {
        return Ok(());
    }
    let error = Error::ArrayIndexOutOfBounds {
        array: array.name,
        index: index_value,
        len,
    };
    Err(index.span.wrap(error))
}

/// The length of the array an initializer creates, if it's a constructor with
/// a constant size.
fn array_len(initializer: &Expr<Typed>) -> Option<i64> {
    match &initializer.kind {
        ExprKind::Array { size, .. } => size.constant_int(),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    DuplicateVariableName(Interned<str>),
    DuplicateProcedureName(Interned<str>),
    DuplicateParameterName(Interned<str>),
    DuplicateField {
        record: Interned<str>,
        field: Interned<str>,
    },
    DuplicateRecordType(Interned<str>),
    /// A variable, type or field name that doesn't resolve.
    UndeclaredIdentifier(Interned<str>),
    UndefinedProcedure(Interned<str>),
    /// The callee resolves, but not to a procedure.
    InvalidProcedureCall(Interned<str>),
    TypeMismatch(Mismatch),
    /// Also used for record literals, whose callee is the record name.
    ArgumentCountMismatch {
        callee: Interned<str>,
        expected: usize,
        found: usize,
    },
    ArgumentTypeMismatch {
        callee: Interned<str>,
        /// 1-based
        position: usize,
        expected: Type,
        found: Type,
    },
    ArrayIndexOutOfBounds {
        array: Interned<str>,
        index: i64,
        len: i64,
    },
    UninitializedVariable(Interned<str>),
    /// Assignment to a whole `const` or `val` binding.
    ImmutableAssignment {
        name: Interned<str>,
        mutability: Mutability,
    },
    /// A variable, parameter or field declared as `void`.
    VoidValue(Interned<str>),
    ReturnTypeMismatch {
        /// `None` for a return outside of any procedure.
        procedure: Option<Interned<str>>,
        expected: Type,
        /// `None` for a missing return value, or a missing return.
        found: Option<Type>,
    },
}

/// Where a type mismatch happened, and between which types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    Declaration {
        name: Interned<str>,
        expected: Type,
        found: Type,
    },
    Assignment {
        expected: Type,
        found: Type,
    },
    Operands {
        op: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    Field {
        record: Interned<str>,
        field: Interned<str>,
        expected: Type,
        found: Type,
    },
    Condition {
        found: Type,
    },
    Index {
        found: Type,
    },
    ArraySize {
        found: Type,
    },
    ArrayElement {
        expected: Type,
        found: Type,
    },
    NotArray {
        name: Interned<str>,
        found: Type,
    },
    NotRecord {
        field: Interned<str>,
        found: Type,
    },
    Negation {
        found: Type,
    },
    LoopBound {
        found: Type,
    },
    LoopCounter {
        expected: Type,
        found: Type,
    },
}

#[cfg(test)]
mod tests {
    use super::Checker;
    use crate::{
        parser,
        types::Type,
        util::{intern::Interner, test_utils::tree_tests},
    };

    tree_tests!(
        use checker;

        fn test_int_real_widening() {
            let program = "var a int = 1; var b real = 2.5; var c real = a + b; var d real = b + a;";
            let tree_ok = "
                var a: int
                  int 1 (12..13 %: int)
                var b: real
                  real 2.5 (28..31 %: real)
                var c: real
                  binary Add (46..51 %: real)
                    ident a (46..47 %: int)
                    ident b (50..51 %: real)
                var d: real
                  binary Add (66..71 %: real)
                    ident b (66..67 %: real)
                    ident a (70..71 %: int)
            ";
        }

        fn test_int_plus_int_is_int() {
            let program = "var c int = 1 + 2;";
            let tree_ok = "
                var c: int
                  binary Add (12..17 %: int)
                    int 1 (12..13 %: int)
                    int 2 (16..17 %: int)
            ";
        }

        fn test_string_concatenation() {
            let program = r#"var s string = "a" + "b";"#;
            let tree_ok = r#"
                var s: string
                  binary Add (15..24 %: string)
                    string "a" (15..18 %: string)
                    string "b" (21..24 %: string)
            "#;
        }

        fn test_array_binding() {
            let program = "var a int[] = int[](5);";
            let tree_ok = "
                var a: int[]
                  array int (14..22 %: int[])
                    int 5 (20..21 %: int)
            ";
        }

        fn test_record_literal() {
            let program = "record P { x int; y int; } var p P = P(2, 1);";
            let tree_ok = "
                record P
                  field x: int
                  field y: int
                var p: P
                  record P (37..44 %: P)
                    int 2 (39..40 %: int)
                    int 1 (42..43 %: int)
            ";
        }

        fn test_record_may_mention_itself() {
            let program = "record Node { value int; next Node[]; }";
            let tree_ok = "
                record Node
                  field value: int
                  field next: Node[]
            ";
        }

        fn test_field_assignment_targets() {
            let program = "record P { x int; } proc f(p P) void { p.x = 1; }";
            let tree_ok = "
                record P
                  field x: int
                proc f(p: P) : void
                  assignment
                    field x (39..42 %: int)
                      ident p (39..40 %: P)
                    int 1 (45..46 %: int)
            ";
        }

        fn test_shadowing_in_procedure_scope() {
            let program = "var x int = 1; proc f() void { var x bool = true; }";
            let tree_ok = "
                var x: int
                  int 1 (12..13 %: int)
                proc f() : void
                  var x: bool
                    bool true (44..48 %: bool)
            ";
        }

        fn test_outer_binding_visible_after_inner_scope() {
            let program = "var x int = 1; proc f() void { while true { var x bool = false; } x = 2; }";
            let expected_errors = &[];
        }

        fn test_recursion() {
            let program = "proc fact(n int) int { if n < 2 { return 1; } return n * fact(n - 1); }";
            let expected_errors = &[];
        }

        fn test_call_expression_has_return_type() {
            let program = "proc f() real { return 1.5; } var x real = f() * 2.0;";
            let expected_errors = &[];
        }

        fn test_comparisons_and_logic() {
            let program = r#"var b bool = 1 < 2.5 and "a" == "b" or false != true;"#;
            let expected_errors = &[];
        }

        fn test_for_loops() {
            let program = "proc f() void { var i int = 0; for i = 0 to 10 by 1 { } var r real = 0.0; for r = 0 to 1.5 by 0.5 { } for 1 to 2 by 1 { } }";
            let expected_errors = &[];
        }

        fn test_field_reads() {
            let program = "record P { x int; y int; } var p P = P(2, 1); var s int = p.x + p.y;";
            let expected_errors = &[];
        }

        fn test_nested_record_fields() {
            let program = "record A { v int; } record B { a A; all A[]; } proc f(b B) int { b.a.v = 1; var others A[] = b.all; return b.a.v; }";
            let expected_errors = &[];
        }

        fn test_record_usable_after_nested_declaration() {
            let program = "proc f() void { record Q { v int; } } var q Q = Q(1);";
            let expected_errors = &[];
        }

        fn test_dynamic_index_is_not_checked() {
            let program = "proc f(a int[], i int) void { a[10] = 1; a[i] = 2; }";
            let expected_errors = &[];
        }

        fn test_whole_array_assignment_forgets_length() {
            let program = "var a int[] = int[](2); var n int = 9; a = int[](n); a[5] = 1;";
            let expected_errors = &[];
        }

        fn test_error_string_plus_int() {
            let program = r#"var s string = "a" + 1;"#;
            let expected_errors = &["15..22: operator + cannot be applied to string and int"];
        }

        fn test_error_string_minus_string() {
            let program = r#"var s string = "a" - "b";"#;
            let expected_errors = &["15..24: operator - cannot be applied to string and string"];
        }

        fn test_error_logic_on_int() {
            let program = "var b bool = 1 and true;";
            let expected_errors = &["13..23: operator and cannot be applied to int and bool"];
        }

        fn test_error_negate_bool() {
            let program = "var b bool = -true;";
            let expected_errors = &["13..18: cannot negate a value of type bool"];
        }

        fn test_error_declaration_requires_exact_type() {
            let program = "var c int = 1 + 2.0;";
            let expected_errors = &["12..19: cannot initialize c of type int with a value of type real"];
        }

        fn test_error_array_element_type_in_declaration() {
            let program = "var a real[] = int[](3);";
            let expected_errors = &["15..23: cannot initialize a of type real[] with a value of type int[]"];
        }

        fn test_error_duplicate_variable() {
            let program = "var x int = 1; x = 3; var y int = x; var x int = 2;";
            let expected_errors = &["41..42: variable x is already declared in this scope"];
        }

        fn test_error_variable_clashes_with_parameter() {
            let program = "proc f(x int) void { var x int = 1; }";
            let expected_errors = &["25..26: variable x is already declared in this scope"];
        }

        fn test_error_uninitialized_variable() {
            let program = "var x int;";
            let expected_errors = &["4..5: x must be initialized"];
        }

        fn test_error_undeclared_assignment_target() {
            let program = "x = 1;";
            let expected_errors = &["0..1: x is not declared"];
        }

        fn test_error_undeclared_type() {
            let program = "var p Q = Q(1);";
            let expected_errors = &["6..7: Q is not declared"];
        }

        fn test_error_argument_type() {
            let program = "proc f(a int) void { } f(true);";
            let expected_errors = &["25..29: argument 1 of f expects type int, but got bool"];
        }

        fn test_error_argument_count() {
            let program = "proc f(a int) void { } f(1, 2);";
            let expected_errors = &["23..30: wrong number of arguments for f: expected 1, but got 2"];
        }

        fn test_error_record_field_type() {
            let program = r#"record P { x int; y int; } var p P = P("a", 2);"#;
            let expected_errors = &["39..42: field x of P expects type int, but got string"];
        }

        fn test_error_record_field_count() {
            let program = "record P { x int; y int; } var p P = P(1);";
            let expected_errors = &["37..41: wrong number of arguments for P: expected 2, but got 1"];
        }

        fn test_error_unknown_field() {
            let program = "record P { x int; y int; } var p P = P(2, 1); var s int = p.z;";
            let expected_errors = &["60..61: z is not declared"];
        }

        fn test_error_field_of_non_record() {
            let program = "var n int = 1; var m int = n.x;";
            let expected_errors = &["27..30: cannot access field x on type int"];
        }

        fn test_error_field_assignment_type() {
            let program = "record P { x int; y int; } var p P = P(2, 1); p.x = 1.5;";
            let expected_errors = &["52..55: expected type int, but got real"];
        }

        fn test_error_duplicate_field() {
            let program = "record P { x int; x real; }";
            let expected_errors = &["18..19: record P declares field x more than once"];
        }

        fn test_error_duplicate_record_in_nested_scope() {
            let program = "record P { x int; } proc f() void { record P { y int; } }";
            let expected_errors = &["43..44: record type P is already declared"];
        }

        fn test_error_call_to_later_procedure() {
            let program = "proc a() void { b(); } proc b() void { }";
            let expected_errors = &["16..17: procedure b is not defined"];
        }

        fn test_error_call_to_variable() {
            let program = "var f int = 1; f();";
            let expected_errors = &["15..16: f is not a procedure"];
        }

        fn test_error_procedure_as_value() {
            let program = "proc f() int { return 1; } var x int = f;";
            let expected_errors = &["39..40: f is not declared"];
        }

        fn test_error_return_in_void_procedure() {
            let program = "proc f() void { return; }";
            let expected_errors = &["16..22: procedure f is void and cannot return"];
        }

        fn test_error_missing_return() {
            let program = "proc f() int { }";
            let expected_errors = &["5..6: procedure f must return a value of type int"];
        }

        fn test_error_wrong_return_type() {
            let program = "proc f() int { return true; }";
            let expected_errors = &["15..26: procedure f must return type int, but got bool"];
        }

        fn test_error_duplicate_parameter() {
            let program = "proc f(a int, a real) void { }";
            let expected_errors = &["14..15: parameter a is declared more than once"];
        }

        fn test_error_duplicate_procedure() {
            let program = "proc f() void { } proc f() void { }";
            let expected_errors = &["23..24: procedure f is already declared in this scope"];
        }

        fn test_error_condition_must_be_bool() {
            let program = "proc f() void { if 1 { } }";
            let expected_errors = &["19..20: condition must be bool, but got int"];
        }

        fn test_error_loop_counter_type() {
            let program = "proc f() void { var r real = 0.0; for r = 0 to 10 by 1 { } }";
            let expected_errors = &["38..39: loop counter must be int, but got real"];
        }

        fn test_error_loop_bound_type() {
            let program = "proc f() void { for 0 to true by 1 { } }";
            let expected_errors = &["25..29: loop bounds must be numeric, but got bool"];
        }

        fn test_error_constant_index_out_of_bounds() {
            let program = "var a int[] = int[](5); a[5] = 1;";
            let expected_errors = &["26..27: index 5 is out of bounds for array a of length 5"];
        }

        fn test_error_negative_index() {
            let program = "var a int[] = int[](5); a[-1] = 1;";
            let expected_errors = &["26..28: index -1 is out of bounds for array a of length 5"];
        }

        fn test_error_read_out_of_bounds() {
            let program = "var a int[] = int[](3); var b int = a[3];";
            let expected_errors = &["38..39: index 3 is out of bounds for array a of length 3"];
        }

        fn test_error_index_must_be_int() {
            let program = "var a int[] = int[](3); a[true] = 1;";
            let expected_errors = &["26..30: array index must be int, but got bool"];
        }

        fn test_error_indexing_non_array() {
            let program = "var n int = 1; n[0] = 2;";
            let expected_errors = &["15..16: n is not an array, its type is int"];
        }

        fn test_error_array_element_assignment_type() {
            let program = "var a int[] = int[](3); a[0] = 1.5;";
            let expected_errors = &["31..34: expected type int, but got real"];
        }

        fn test_error_array_size_must_be_int() {
            let program = "var a int[] = int[](1.5);";
            let expected_errors = &["20..23: array size must be int, but got real"];
        }

        fn test_error_assign_to_const() {
            let program = "const n int = 3; n = 4;";
            let expected_errors = &["17..18: cannot assign to n, it is declared const"];
        }

        fn test_error_assign_to_val() {
            let program = r#"val s string = "a"; s = "b";"#;
            let expected_errors = &["20..21: cannot assign to s, it is declared val"];
        }

        fn test_error_const_loop_counter() {
            let program = "proc f() void { const i int = 0; for i = 0 to 3 by 1 { } }";
            let expected_errors = &["37..38: cannot assign to i, it is declared const"];
        }

        fn test_immutable_bindings_keep_writable_contents() {
            let program = "record P { x int; } val p P = P(1); p.x = 2; const a int[] = int[](2); a[0] = 1;";
            let expected_errors = &[];
        }

        fn test_error_void_variable() {
            let program = "proc g() void { } var v void = g();";
            let expected_errors = &["24..28: v cannot have type void"];
        }

        fn test_error_void_parameter() {
            let program = "proc f(x void) void { }";
            let expected_errors = &["9..13: x cannot have type void"];
        }

        fn test_error_void_field() {
            let program = "record R { v void; }";
            let expected_errors = &["13..17: v cannot have type void"];
        }

        fn test_error_compare_void_results() {
            let program = "proc g() void { } var b bool = g() == g();";
            let expected_errors = &["31..41: operator == cannot be applied to void and void"];
        }
    );

    #[test]
    fn test_valid_program_keeps_every_item() {
        let src = "
            record P { x int; y int; }
            const origin P = P(0, 0);
            proc norm(p P) int { return p.x * p.x + p.y * p.y; }
            var n int = norm(origin);
            n = n + 1;
        ";
        let i = &mut Interner::with_capacity(32);
        let program = parser::parse_program(src, &mut Vec::new(), i).unwrap();
        assert_eq!(program.len(), 5);

        let (typed, registry) = Checker::with_capacity(16).check(program).unwrap();
        assert_eq!(typed.len(), 5);
        assert_eq!(typed.records.len(), 1);
        assert_eq!(typed.procedures.len(), 1);
        assert_eq!(typed.globals.len(), 3);

        let p = registry.get(i.intern("P")).unwrap();
        assert_eq!(p.field(i.intern("y")), Some((1, &Type::Int)));
    }

    #[test]
    fn test_long_operator_chain_checks() {
        let src = format!("var x int = 1{};", " + 1".repeat(200));
        let i = &mut Interner::with_capacity(8);
        let program = parser::parse_program(&src, &mut Vec::new(), i).unwrap();
        let (typed, _) = Checker::with_capacity(8).check(program).unwrap();
        assert_eq!(typed.len(), 1);
    }

    #[test]
    fn test_demo_program_checks() {
        let src = include_str!("../demos/big.plume");
        let i = &mut Interner::with_capacity(256);
        let program = parser::parse_program(src, &mut Vec::new(), i).unwrap();
        let items = program.len();
        let (typed, _) = Checker::with_capacity(64).check(program).unwrap();
        assert_eq!(typed.len(), items);
    }
}
