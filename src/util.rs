pub mod fmt;
pub mod intern;
#[cfg(test)]
pub(crate) mod test_utils;

pub trait BreakableIteratorExt<I>: Iterator
where
    I: Iterator,
{
    /// Yields items up to and including the first one that matches the
    /// provided predicate.
    fn up_to<P>(self, stop_predicate: P) -> Break<I, P>
    where
        P: FnMut(&I::Item) -> bool;
}

impl<I> BreakableIteratorExt<I> for I
where
    I: Iterator,
{
    fn up_to<P>(self, stop_predicate: P) -> Break<I, P>
    where
        P: FnMut(&I::Item) -> bool,
    {
        Break {
            iter: self,
            stop_predicate,
            finished: false,
        }
    }
}

pub struct Break<I, P> {
    iter: I,
    stop_predicate: P,
    finished: bool,
}

impl<I, P> Iterator for Break<I, P>
where
    I: Iterator,
    P: FnMut(&I::Item) -> bool,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.iter.next()?;
        self.finished = (self.stop_predicate)(&next);
        Some(next)
    }
}
