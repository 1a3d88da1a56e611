//! Error types for the lockable pool

use crate::element::ElementId;
use std::thread::ThreadId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Unable to register additional element, pool is full (max size {max_size})")]
    CapacityExceeded { max_size: usize },

    #[error("Unlock requested from thread {requester:?} not holding the pool lock (held by {holder:?})")]
    LockNotHeld {
        requester: ThreadId,
        holder: Option<ThreadId>,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Element {0} is already registered")]
    AlreadyRegistered(ElementId),

    #[error("Element {0} is not registered with the pool")]
    NotRegistered(ElementId),

    #[error("Element {0} is still queued and cannot be unregistered")]
    StillQueued(ElementId),

    #[error("Element {0} is already back in the pool")]
    AlreadyQueued(ElementId),
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_not_held_message_names_holder() {
        let requester = std::thread::current().id();
        let err = PoolError::LockNotHeld {
            requester,
            holder: None,
        };
        let message = err.to_string();
        assert!(message.contains("not holding the pool lock"));
        assert!(message.contains("None"));
    }
}
