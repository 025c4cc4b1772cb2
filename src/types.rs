use std::collections::HashMap;

use crate::{token::Span, util::intern::Interned};

/// A resolved type. Types compare by name: two record types are the same type
/// iff they have the same name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Real,
    Bool,
    String,
    Void,
    Array(Box<Type>),
    Record(Interned<str>),
}

impl Type {
    pub fn array_of(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    /// Returns the primitive type written with the provided name, if any.
    pub fn primitive(name: Interned<str>) -> Option<Type> {
        let ty = match name {
            n if n == well_known::INT => Type::Int,
            n if n == well_known::REAL => Type::Real,
            n if n == well_known::BOOL => Type::Bool,
            n if n == well_known::STRING => Type::String,
            n if n == well_known::VOID => Type::Void,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Real)
    }

    /// Returns the element type if this is an array type.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn record_name(&self) -> Option<Interned<str>> {
        match self {
            Type::Record(name) => Some(*name),
            _ => None,
        }
    }

    /// Reconciles the types of the two operands of a binary expression.
    ///
    /// Identical types reconcile to themselves, and `int` widens to `real` when
    /// mixed with it (in either order). Any other pair doesn't reconcile.
    pub fn reconcile(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Type::Int, Type::Real) | (Type::Real, Type::Int) => Some(Type::Real),
            _ => None,
        }
    }
}

/// Names the front end needs to recognize without a string comparison.
///
/// The parser interns these first (in this order) into every fresh interner,
/// so their handles are fixed.
pub mod well_known {
    use crate::util::intern::{Interned, Interner};

    pub const INT: Interned<str> = Interned::nth(1);
    pub const REAL: Interned<str> = Interned::nth(2);
    pub const BOOL: Interned<str> = Interned::nth(3);
    pub const STRING: Interned<str> = Interned::nth(4);
    pub const VOID: Interned<str> = Interned::nth(5);

    pub const ALL: &[(Interned<str>, &str)] = &[
        (INT, "int"),
        (REAL, "real"),
        (BOOL, "bool"),
        (STRING, "string"),
        (VOID, "void"),
    ];

    /// Registers the well-known names if the interner is still empty.
    pub fn seed(interner: &mut Interner<str>) {
        if !interner.is_empty() {
            return;
        }
        for &(expected_handle, name) in ALL {
            let handle = interner.intern(name);
            assert_eq!(handle, expected_handle);
        }
    }
}

/// A declared record type. Fields keep their declaration order, which is
/// the order record literals supply their values in.
#[derive(Debug)]
pub struct RecordDef {
    pub name: Interned<str>,
    /// Record definition site
    pub span: Span,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug)]
pub struct FieldDef {
    pub name: Interned<str>,
    pub ty: Type,
}

impl RecordDef {
    /// Looks a field up by name, returning its declaration index and type.
    pub fn field(&self, name: Interned<str>) -> Option<(usize, &Type)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
            .map(|(index, field)| (index, &field.ty))
    }
}

/// Every record type of the program, by name.
///
/// Record names are program-wide: even a record declared inside a procedure
/// body claims its name for the whole program.
pub struct RecordRegistry {
    map: HashMap<Interned<str>, RecordDef>,
}

impl RecordRegistry {
    pub fn with_capacity(capacity: usize) -> RecordRegistry {
        RecordRegistry {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn has(&self, name: Interned<str>) -> bool {
        self.map.contains_key(&name)
    }

    pub fn get(&self, name: Interned<str>) -> Option<&RecordDef> {
        self.map.get(&name)
    }

    pub fn get_mut(&mut self, name: Interned<str>) -> Option<&mut RecordDef> {
        self.map.get_mut(&name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Attempts to define the provided record.
    ///
    /// Fails if a record with the same name is already defined.
    pub fn define(&mut self, def: RecordDef) -> Result<(), RecordDef> {
        if self.has(def.name) {
            return Err(def);
        }
        self.map.insert(def.name, def);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::util::intern::Interner;

    use super::*;

    #[test]
    fn reconcile_widens_int_to_real() {
        assert_eq!(Type::Int.reconcile(&Type::Int), Some(Type::Int));
        assert_eq!(Type::Int.reconcile(&Type::Real), Some(Type::Real));
        assert_eq!(Type::Real.reconcile(&Type::Int), Some(Type::Real));
        assert_eq!(Type::String.reconcile(&Type::Int), None);
        assert_eq!(Type::Bool.reconcile(&Type::Real), None);

        let ints = Type::array_of(Type::Int);
        let reals = Type::array_of(Type::Real);
        assert_eq!(ints.reconcile(&ints), Some(ints.clone()));
        assert_eq!(ints.reconcile(&reals), None);
    }

    #[test]
    fn primitives_resolve_from_well_known_names() {
        let i = &mut Interner::with_capacity(8);
        well_known::seed(i);
        let point = i.intern("Point");

        assert_eq!(Type::primitive(i.intern("int")), Some(Type::Int));
        assert_eq!(Type::primitive(i.intern("void")), Some(Type::Void));
        assert_eq!(Type::primitive(point), None);
    }

    #[test]
    fn registry_rejects_redefinition() {
        let i = &mut Interner::with_capacity(8);
        let point = i.intern("Point");
        let x = i.intern("x");
        let reg = &mut RecordRegistry::with_capacity(2);

        let def = |fields| RecordDef {
            name: point,
            span: Span::new_of_length(0, 0),
            fields,
        };
        let fields = vec![FieldDef { name: x, ty: Type::Int }];
        assert!(reg.define(def(fields)).is_ok());
        assert!(reg.define(def(Vec::new())).is_err());

        let point_def = reg.get(point).unwrap();
        assert_eq!(point_def.field(x), Some((0, &Type::Int)));
        assert_eq!(point_def.field(point), None);
    }
}
