use crate::{ast::TypeName, types::Type, util::intern::Interner};

pub mod error;
pub mod tree;

pub struct Context<'ident> {
    pub ident_interner: &'ident Interner<str>,
}

/// Analogous to [`std::fmt::Display`], but also contains the program context,
/// such as the current [`Interner`].
pub trait Show {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result;

    /// Returns a type which can be displayed.
    fn display(&self, ctx: &Context<'_>) -> impl std::fmt::Display
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'this, 'ctx, 'ident, T: Show>(pub &'this T, pub &'ctx Context<'ident>);

impl<T> std::fmt::Display for Display<'_, '_, '_, T>
where
    T: Show,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}

impl Show for Type {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Real => f.write_str("real"),
            Type::Bool => f.write_str("bool"),
            Type::String => f.write_str("string"),
            Type::Void => f.write_str("void"),
            Type::Array(element) => {
                element.show(f, ctx)?;
                f.write_str("[]")
            }
            Type::Record(name) => f.write_str(ctx.ident_interner.get(name)),
        }
    }
}

impl Show for TypeName {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        f.write_str(ctx.ident_interner.get(self.name))?;
        if self.array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}
