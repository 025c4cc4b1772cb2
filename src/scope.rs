use std::{collections::HashMap, rc::Rc};

use log::debug;

use crate::{ast::Mutability, types::Type, util::intern::Interned};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

/// A procedure's parameter types and return type.
#[derive(Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub return_ty: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    Variable {
        ty: Type,
        mutability: Mutability,
        /// Length of the array this variable holds, when statically known.
        len: Option<i64>,
    },
    Procedure(Rc<Signature>),
    Record,
}

#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<Interned<str>, Symbol>,
    parent: Option<ScopeId>,
}

/// Lexical scopes, stored as an arena. Leaving a scope never frees it.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl SymbolTable {
    /// Creates a table holding only the global scope.
    pub fn with_capacity(capacity: usize) -> SymbolTable {
        let mut scopes = Vec::with_capacity(capacity.max(1));
        scopes.push(Scope::default());
        SymbolTable {
            scopes,
            current: ScopeId(0),
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.scopes[self.current.0].parent;
        while let Some(id) = scope {
            depth += 1;
            scope = self.scopes[id.0].parent;
        }
        depth
    }

    /// Opens a new scope nested in the current one.
    pub fn enter(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            parent: Some(self.current),
        });
        self.current = id;
        debug!("entered scope {} (depth {})", id.0, self.depth());
        id
    }

    /// Returns to the parent of the current scope. The global scope is never
    /// left.
    pub fn exit(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            debug!("left scope {}", self.current.0);
            self.current = parent;
        }
    }

    /// Declares a name in the current scope.
    ///
    /// Fails, giving the symbol back, if the name is already declared in this
    /// very scope. Names of enclosing scopes may be shadowed.
    pub fn declare(&mut self, name: Interned<str>, symbol: Symbol) -> Result<(), Symbol> {
        let scope = &mut self.scopes[self.current.0];
        if scope.symbols.contains_key(&name) {
            return Err(symbol);
        }
        scope.symbols.insert(name, symbol);
        Ok(())
    }

    pub fn is_declared_in_current(&self, name: Interned<str>) -> bool {
        self.scopes[self.current.0].symbols.contains_key(&name)
    }

    /// Resolves a name, walking from the current scope outwards.
    pub fn lookup(&self, name: Interned<str>) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let Scope { symbols, parent } = &self.scopes[id.0];
            if let Some(symbol) = symbols.get(&name) {
                return Some(symbol);
            }
            scope = *parent;
        }
        None
    }

    pub fn lookup_mut(&mut self, name: Interned<str>) -> Option<&mut Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if self.scopes[id.0].symbols.contains_key(&name) {
                return self.scopes[id.0].symbols.get_mut(&name);
            }
            scope = self.scopes[id.0].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::intern::Interner;

    fn var(ty: Type) -> Symbol {
        Symbol::Variable {
            ty,
            mutability: Mutability::Var,
            len: None,
        }
    }

    #[test]
    fn shadowing_in_nested_scopes() {
        let i = &mut Interner::with_capacity(4);
        let x = i.intern("x");
        let table = &mut SymbolTable::with_capacity(4);

        table.declare(x, var(Type::Int)).unwrap();
        assert!(table.declare(x, var(Type::Real)).is_err());

        table.enter();
        assert_eq!(table.depth(), 1);
        assert!(!table.is_declared_in_current(x));
        assert_eq!(table.lookup(x), Some(&var(Type::Int)));
        table.declare(x, var(Type::Real)).unwrap();
        assert_eq!(table.lookup(x), Some(&var(Type::Real)));
        table.exit();

        assert_eq!(table.depth(), 0);
        assert_eq!(table.lookup(x), Some(&var(Type::Int)));
    }

    #[test]
    fn exit_never_leaves_global_scope() {
        let table = &mut SymbolTable::with_capacity(1);
        let global = table.current();
        table.exit();
        assert_eq!(table.current(), global);
    }

    #[test]
    fn lookup_mut_updates_enclosing_symbol() {
        let i = &mut Interner::with_capacity(4);
        let a = i.intern("a");
        let table = &mut SymbolTable::with_capacity(4);
        table
            .declare(
                a,
                Symbol::Variable {
                    ty: Type::array_of(Type::Int),
                    mutability: Mutability::Var,
                    len: Some(5),
                },
            )
            .unwrap();

        table.enter();
        if let Some(Symbol::Variable { len, .. }) = table.lookup_mut(a) {
            *len = None;
        }
        table.exit();

        assert_eq!(table.lookup(a), Some(&var(Type::array_of(Type::Int))));
        assert_eq!(table.lookup(i.intern("b")), None);
    }
}
