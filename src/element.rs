//! Pool element handles and poison pills

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Element`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element-{}", self.0)
    }
}

/// A handle to a pooled resource.
///
/// Cloning an element clones the handle, not the resource: both clones share
/// the same [`ElementId`] and compare equal. Two elements built from equal
/// values are still distinct.
///
/// # Examples
///
/// ```
/// use lockable_pool::Element;
///
/// let a = Element::new(String::from("instance"));
/// let b = Element::new(String::from("instance"));
///
/// assert_eq!(a, a.clone());
/// assert_ne!(a, b);
/// assert_eq!(a.len(), 8);
/// ```
pub struct Element<T> {
    id: ElementId,
    value: Arc<T>,
}

impl<T> Element<T> {
    /// Wrap a resource in a new element with a fresh identity
    pub fn new(value: T) -> Self {
        Self {
            id: ElementId::next(),
            value: Arc::new(value),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Shared access to the underlying resource
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }
}

impl<T> Clone for Element<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Deref for Element<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> PartialEq for Element<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Element<T> {}

impl<T> Hash for Element<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Element<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

/// Why a poison pill was inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PillReason {
    /// The worker should stop processing
    Shutdown,

    /// Element construction failed and should be retried by the consumer
    Retry,

    /// Application-defined instruction
    Custom(String),
}

/// Sentinel placed at the front of the pool to divert the next borrower.
///
/// # Examples
///
/// ```
/// use lockable_pool::{PillReason, PoisonPill};
///
/// let pill = PoisonPill::retry();
/// assert!(pill.is_retry());
/// assert_eq!(pill.reason(), &PillReason::Retry);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoisonPill {
    reason: PillReason,
}

impl PoisonPill {
    pub fn new(reason: PillReason) -> Self {
        Self { reason }
    }

    pub fn shutdown() -> Self {
        Self::new(PillReason::Shutdown)
    }

    pub fn retry() -> Self {
        Self::new(PillReason::Retry)
    }

    pub fn custom(reason: impl Into<String>) -> Self {
        Self::new(PillReason::Custom(reason.into()))
    }

    pub fn reason(&self) -> &PillReason {
        &self.reason
    }

    pub fn is_retry(&self) -> bool {
        matches!(self.reason, PillReason::Retry)
    }
}

/// Anything that can come out of a borrow
#[derive(Debug)]
pub enum PoolItem<T> {
    Element(Element<T>),
    Pill(PoisonPill),
}

impl<T> PoolItem<T> {
    pub fn is_pill(&self) -> bool {
        matches!(self, PoolItem::Pill(_))
    }

    /// Identity of the wrapped element, `None` for pills
    pub fn element_id(&self) -> Option<ElementId> {
        match self {
            PoolItem::Element(element) => Some(element.id()),
            PoolItem::Pill(_) => None,
        }
    }

    pub fn into_element(self) -> Option<Element<T>> {
        match self {
            PoolItem::Element(element) => Some(element),
            PoolItem::Pill(_) => None,
        }
    }
}

impl<T> Clone for PoolItem<T> {
    fn clone(&self) -> Self {
        match self {
            PoolItem::Element(element) => PoolItem::Element(element.clone()),
            PoolItem::Pill(pill) => PoolItem::Pill(pill.clone()),
        }
    }
}

impl<T> From<Element<T>> for PoolItem<T> {
    fn from(element: Element<T>) -> Self {
        PoolItem::Element(element)
    }
}

impl<T> From<PoisonPill> for PoolItem<T> {
    fn from(pill: PoisonPill) -> Self {
        PoolItem::Pill(pill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_not_value() {
        let a = Element::new(7);
        let b = Element::new(7);
        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b.clone());
        assert_eq!(set.len(), 2);
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_pool_item_accessors() {
        let element = Element::new("x");
        let item: PoolItem<&str> = element.clone().into();
        assert_eq!(item.element_id(), Some(element.id()));
        assert!(!item.is_pill());

        let pill: PoolItem<&str> = PoisonPill::custom("flush").into();
        assert!(pill.is_pill());
        assert_eq!(pill.element_id(), None);
        assert!(pill.into_element().is_none());
    }
}
