//! Force-on-access for cells and tuples of cells.
//!
//! Binding a cell's result is just [`Force::force_all`]; matching it against a
//! shape is [`Force::force_matches`]. A failed force is always returned as an
//! error and is never reported as a failed match.

use std::rc::Rc;
use std::sync::Arc;

use crate::deferred::Deferred;
use crate::err::ForceError;
use crate::sync::SyncDeferred;

pub trait Force {
    type Output;
    type Error;

    fn force_all(self) -> Result<Self::Output, Self::Error>;

    fn force_matches<P>(self, pattern: P) -> Result<bool, Self::Error>
    where
        Self: Sized,
        P: FnOnce(&Self::Output) -> bool,
    {
        let v = self.force_all()?;
        Ok(pattern(&v))
    }

    fn force_eq<U>(self, expected: U) -> Result<bool, Self::Error>
    where
        Self: Sized,
        Self::Output: PartialEq<U>,
    {
        let v = self.force_all()?;
        Ok(v == expected)
    }
}

impl<'a, T, E> Force for &'a Deferred<T, E> {
    type Output = &'a T;
    type Error = ForceError<Rc<E>>;

    fn force_all(self) -> Result<&'a T, Self::Error> {
        self.force()
    }
}

impl<'a, T, E> Force for &'a SyncDeferred<T, E> {
    type Output = &'a T;
    type Error = ForceError<Arc<E>>;

    fn force_all(self) -> Result<&'a T, Self::Error> {
        self.force()
    }
}

// Components are forced left to right and the first error stops the rest.
macro_rules! impl_force_tuple {
    ($($ty:ident $var:ident),+) => {
        impl<Err, $($ty: Force<Error = Err>),+> Force for ($($ty,)+) {
            type Output = ($($ty::Output,)+);
            type Error = Err;

            fn force_all(self) -> Result<Self::Output, Err> {
                let ($($var,)+) = self;
                Ok(($($var.force_all()?,)+))
            }
        }
    };
}

impl_force_tuple!(A a, B b);
impl_force_tuple!(A a, B b, C c);
impl_force_tuple!(A a, B b, C c, D d);
