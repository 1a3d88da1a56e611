//! RAII borrows that release on drop

use crate::element::{Element, PoisonPill};
use crate::pool::LockablePool;

use std::ops::Deref;
use tracing::warn;

/// Result of a [`LockablePool::checkout`]
pub enum Checkout<'a, T: Send + Sync> {
    Element(PooledElement<'a, T>),
    Pill(PoisonPill),
}

/// A borrowed element that returns to the front of its pool when dropped
///
/// # Examples
///
/// ```
/// use lockable_pool::{Checkout, Element, LockablePool};
///
/// let pool = LockablePool::with_capacity(1);
/// pool.register(Element::new(5)).unwrap();
///
/// if let Checkout::Element(element) = pool.checkout().unwrap() {
///     assert_eq!(*element, 5);
///     assert_eq!(pool.size(), 0);
/// }
/// assert_eq!(pool.size(), 1);
/// ```
pub struct PooledElement<'a, T: Send + Sync> {
    element: Option<Element<T>>,
    pool: &'a LockablePool<T>,
}

impl<'a, T: Send + Sync> PooledElement<'a, T> {
    pub(crate) fn new(element: Element<T>, pool: &'a LockablePool<T>) -> Self {
        Self {
            element: Some(element),
            pool,
        }
    }

    /// The element handle itself
    pub fn element(&self) -> &Element<T> {
        self.element.as_ref().expect("Element already released")
    }

    /// Release without returning the element to the pool.
    ///
    /// The element stays registered; hand the returned handle to
    /// [`LockablePool::unregister`] to retire it.
    pub fn discard(mut self) -> Element<T> {
        let element = self.element.take().expect("Element already released");
        self.pool.discard(&element);
        element
    }
}

impl<T: Send + Sync> Deref for PooledElement<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.element()
    }
}

impl<T: Send + Sync> Drop for PooledElement<'_, T> {
    fn drop(&mut self) {
        if let Some(element) = self.element.take() {
            let id = element.id();
            if let Err(err) = self.pool.release(element) {
                warn!(element = %id, error = %err, "checked-out element could not be returned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PillReason;

    #[test]
    fn test_discard_then_unregister() {
        let pool = LockablePool::with_capacity(1);
        pool.register(Element::new("a")).unwrap();

        let retired = match pool.checkout().unwrap() {
            Checkout::Element(element) => element.discard(),
            Checkout::Pill(_) => panic!("unexpected pill"),
        };
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.registered_count(), 1);
        assert_eq!(pool.get_metrics().total_discarded, 1);
        pool.unregister(&retired).unwrap();
        assert_eq!(pool.registered_count(), 0);
    }

    #[test]
    fn test_checkout_pill() {
        let pool = LockablePool::<u8>::with_capacity(1);
        pool.insert_pill(PoisonPill::shutdown());
        match pool.checkout().unwrap() {
            Checkout::Pill(pill) => assert_eq!(pill.reason(), &PillReason::Shutdown),
            Checkout::Element(_) => panic!("expected pill"),
        }
    }

    #[test]
    fn test_guard_returns_to_front() {
        let pool = LockablePool::with_capacity(2);
        let a = Element::new("a");
        pool.register(a.clone()).unwrap();
        pool.register(Element::new("b")).unwrap();

        {
            let checkout = pool.checkout_with_timeout(std::time::Duration::from_millis(10));
            assert!(matches!(checkout, Ok(Some(Checkout::Element(_)))));
        }
        let again = pool.borrow_item().unwrap().into_element().unwrap();
        assert_eq!(again, a);
    }
}
