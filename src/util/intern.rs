use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData, num::NonZeroU32, rc::Rc};

/// A handle to some interned value of type `T`. To retrieve a `&T`, use
/// [`Interner::get`].
///
/// Identifiers, type names and record field names are all interned, so name
/// comparisons across the front end are handle comparisons.
pub struct Interned<T: ?Sized> {
    // Here we use a NonZeroU32 to leverage niche layout optimization.
    handle: NonZeroU32,
    _ty: PhantomData<T>,
}

impl<T: ?Sized> Interned<T> {
    pub(crate) const fn unchecked_new(handle: NonZeroU32) -> Self {
        Interned {
            handle,
            _ty: PhantomData,
        }
    }

    /// Builds the handle that the `n`-th interned value (1-based) receives in
    /// a fresh interner. Used to name the well-known identifiers at compile
    /// time.
    pub(crate) const fn nth(n: u32) -> Self {
        match NonZeroU32::new(n) {
            Some(handle) => Interned::unchecked_new(handle),
            None => panic!("interned handles start at 1"),
        }
    }
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> PartialOrd for Interned<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Interned<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.handle.cmp(&other.handle)
    }
}

impl<T: ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({})", self.handle)
    }
}

impl<T: ?Sized> From<&Interned<T>> for Interned<T> {
    fn from(value: &Interned<T>) -> Self {
        *value
    }
}

pub struct Interner<T: ?Sized> {
    map: HashMap<Rc<T>, NonZeroU32>,
    vec: Vec<Rc<T>>,
}

impl fmt::Debug for Interner<str> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, interned) in self.vec.iter().enumerate() {
            let i = i + 1;
            map.entry(&i, &interned);
        }
        map.finish()
    }
}

impl<T: ?Sized> Interner<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty() && self.vec.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// Interns the provided value, returning a handle which can be used to
    /// retrieve it later.
    pub fn intern(&mut self, value: &T) -> Interned<T>
    where
        T: Eq + Hash,
        T: ToOwned,
        T::Owned: Into<Rc<T>>,
    {
        if let Some(handle) = self.map.get(value) {
            return Interned::unchecked_new(*handle);
        }
        let key: Rc<T> = value.to_owned().into();
        let i = {
            let len = u32::try_from(self.vec.len()).expect("interned out of capacity");
            // SAFETY: This will never be zero due to the +1.
            unsafe { NonZeroU32::new_unchecked(len + 1) }
        };
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, i);
        Interned::unchecked_new(i)
    }

    /// Returns the corresponding value for the provided [`Interned`] handle.
    /// Panics if not found.
    pub fn get(&self, handle: impl Into<Interned<T>>) -> &T {
        let handle: Interned<T> = handle.into();
        let handle = handle.handle.get() - 1;
        &self.vec[handle as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interner() {
        let mut i = Interner::<str>::with_capacity(3);

        let point1 = i.intern("Point");
        let x1 = i.intern("x");
        let y1 = i.intern("y");

        let point2 = i.intern("Point");
        let x2 = i.intern("x");
        let y2 = i.intern("y");

        assert_eq!(i.len(), 3);
        assert_eq!(i.get(point1), i.get(point2));
        assert_eq!(i.get(x1), "x");
        assert_eq!(i.get(y2), "y");

        assert_eq!(point1, point2);
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
        assert_eq!(point1, Interned::nth(1));
    }
}
