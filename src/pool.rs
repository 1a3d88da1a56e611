//! Core lockable pool implementation

use crate::config::PoolConfiguration;
use crate::element::{Element, ElementId, PoisonPill, PoolItem};
use crate::errors::{PoolError, PoolResult};
use crate::guard::{Checkout, PooledElement};
use crate::health::HealthStatus;
use crate::metrics::{MetricsExporter, MetricsTracker, Occupancy, PoolMetrics};

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const ASYNC_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State guarded by the pool mutex
struct PoolState<T> {
    /// Items available to borrow, front first
    queue: VecDeque<PoolItem<T>>,

    /// Every admitted element, queued or borrowed
    registered: BTreeMap<ElementId, Element<T>>,

    /// Number of pills currently in `queue`
    pills: usize,

    lock_owner: Option<ThreadId>,

    /// Threads with a pending cancellation request
    interrupted: HashSet<ThreadId>,
}

impl<T> PoolState<T> {
    fn queued_elements(&self) -> usize {
        self.queue.len() - self.pills
    }

    fn all_returned(&self) -> bool {
        self.registered.len() == self.queued_elements()
    }

    fn is_queued(&self, id: ElementId) -> bool {
        self.queue.iter().any(|item| item.element_id() == Some(id))
    }

    fn is_locked_by_other(&self, me: ThreadId) -> bool {
        matches!(self.lock_owner, Some(owner) if owner != me)
    }

    fn pop_front(&mut self) -> Option<PoolItem<T>> {
        let item = self.queue.pop_front()?;
        if item.is_pill() {
            self.pills -= 1;
        }
        Some(item)
    }
}

/// How a single condition wait ended
enum Wake {
    /// Woken (or spuriously woken); re-check the predicate
    Recheck,

    /// The deadline had already passed
    Expired,
}

/// Thread-safe pool of borrowable elements with an exclusive maintenance lock.
///
/// Elements are handed out front first and returned to the front, so the most
/// recently released element is the next one borrowed. Calling [`lock`] stops
/// every other thread from borrowing and waits until all registered elements
/// are back in the pool.
///
/// The thread holding the lock may keep borrowing while it holds it.
///
/// [`lock`]: LockablePool::lock
///
/// # Examples
///
/// ```
/// use lockable_pool::{Element, LockablePool, PoolItem};
///
/// let pool = LockablePool::with_capacity(2);
/// pool.register(Element::new("first")).unwrap();
/// pool.register(Element::new("second")).unwrap();
///
/// match pool.borrow_item().unwrap() {
///     PoolItem::Element(element) => {
///         assert_eq!(*element, "first");
///         pool.release(element).unwrap();
///     }
///     PoolItem::Pill(_) => unreachable!(),
/// }
///
/// pool.lock().unwrap();
/// for element in pool.registered_elements() {
///     println!("maintaining {}", element.id());
/// }
/// pool.unlock().unwrap();
/// ```
pub struct LockablePool<T> {
    state: Mutex<PoolState<T>>,
    element_available: Condvar,
    pool_unlocked: Condvar,
    all_returned: Condvar,
    config: PoolConfiguration,
    metrics: MetricsTracker,
}

impl<T: Send + Sync> LockablePool<T> {
    /// Create an empty pool
    pub fn new(config: PoolConfiguration) -> Self {
        Self {
            state: Mutex::new(PoolState {
                queue: VecDeque::with_capacity(config.max_size),
                registered: BTreeMap::new(),
                pills: 0,
                lock_owner: None,
                interrupted: HashSet::new(),
            }),
            element_available: Condvar::new(),
            pool_unlocked: Condvar::new(),
            all_returned: Condvar::new(),
            config,
            metrics: MetricsTracker::new(),
        }
    }

    /// Create an empty pool holding at most `max_size` elements
    pub fn with_capacity(max_size: usize) -> Self {
        Self::new(PoolConfiguration::new().with_max_size(max_size))
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Admit a new element and queue it behind the elements already waiting
    pub fn register(&self, element: Element<T>) -> PoolResult<()> {
        let mut state = self.state.lock();
        if state.registered.len() == self.config.max_size {
            MetricsTracker::increment(&self.metrics.capacity_rejections);
            warn!(pool = %self.config.name, element = %element.id(), "rejecting registration, pool full");
            return Err(PoolError::CapacityExceeded {
                max_size: self.config.max_size,
            });
        }
        if state.registered.contains_key(&element.id()) {
            return Err(PoolError::AlreadyRegistered(element.id()));
        }

        trace!(pool = %self.config.name, element = %element.id(), "registering element");
        state.registered.insert(element.id(), element.clone());
        state.queue.push_back(PoolItem::Element(element));
        self.signal_element_available(&state);
        Ok(())
    }

    /// Remove a borrowed element from the registry.
    ///
    /// The element must currently be out on loan; queued elements are rejected
    /// with [`PoolError::StillQueued`].
    pub fn unregister(&self, element: &Element<T>) -> PoolResult<()> {
        let mut state = self.state.lock();
        if !state.registered.contains_key(&element.id()) {
            return Err(PoolError::NotRegistered(element.id()));
        }
        if state.is_queued(element.id()) {
            return Err(PoolError::StillQueued(element.id()));
        }

        trace!(pool = %self.config.name, element = %element.id(), "unregistering element");
        state.registered.remove(&element.id());
        self.signal_if_all_returned(&state);
        Ok(())
    }

    /// Borrow the front item, blocking until one is available and no other
    /// thread holds the pool lock.
    ///
    /// Returns [`PoolError::Cancelled`] if the calling thread is interrupted
    /// while waiting.
    pub fn borrow_item(&self) -> PoolResult<PoolItem<T>> {
        match self.borrow_until(None)? {
            Some(item) => Ok(item),
            None => unreachable!("unbounded borrow cannot expire"),
        }
    }

    /// Borrow the front item, waiting at most `timeout` in total.
    ///
    /// `Ok(None)` means the wait budget ran out. A timeout too large to
    /// represent as a deadline waits without limit.
    pub fn borrow_item_with_timeout(&self, timeout: Duration) -> PoolResult<Option<PoolItem<T>>> {
        let item = self.borrow_until(Instant::now().checked_add(timeout))?;
        if item.is_none() {
            MetricsTracker::increment(&self.metrics.borrow_timeouts);
            trace!(pool = %self.config.name, ?timeout, "borrow timed out");
        }
        Ok(item)
    }

    /// Borrow the front item only if that is possible without waiting
    pub fn try_borrow_item(&self) -> Option<PoolItem<T>> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.is_locked_by_other(me) {
            return None;
        }
        let item = state.pop_front()?;
        MetricsTracker::increment(&self.metrics.total_borrowed);
        Some(item)
    }

    /// Borrow asynchronously, giving up after `timeout` (or the configured
    /// borrow timeout when `None`).
    ///
    /// Dropping the returned future abandons the borrow without touching the
    /// pool.
    pub async fn borrow_item_async(&self, timeout: Option<Duration>) -> PoolResult<Option<PoolItem<T>>> {
        let poll = async {
            loop {
                match self.try_borrow_item() {
                    Some(item) => return item,
                    None => tokio::time::sleep(ASYNC_POLL_INTERVAL).await,
                }
            }
        };

        match timeout.or(self.config.borrow_timeout) {
            Some(limit) => match tokio::time::timeout(limit, poll).await {
                Ok(item) => Ok(Some(item)),
                Err(_) => {
                    MetricsTracker::increment(&self.metrics.borrow_timeouts);
                    Ok(None)
                }
            },
            None => Ok(Some(poll.await)),
        }
    }

    /// Borrow wrapped in a guard that returns the element on drop
    pub fn checkout(&self) -> PoolResult<Checkout<'_, T>> {
        Ok(self.wrap(self.borrow_item()?))
    }

    /// Bounded [`checkout`](LockablePool::checkout); `Ok(None)` on timeout
    pub fn checkout_with_timeout(&self, timeout: Duration) -> PoolResult<Option<Checkout<'_, T>>> {
        Ok(self.borrow_item_with_timeout(timeout)?.map(|item| self.wrap(item)))
    }

    /// Return a borrowed element to the front of the pool
    pub fn release(&self, element: Element<T>) -> PoolResult<()> {
        self.release_item(element, true)
    }

    /// Release a borrowed element.
    ///
    /// With `return_to_pool` the element goes to the front of the queue and is
    /// the next one borrowed. Without it the element leaves circulation but
    /// stays registered until [`unregister`](LockablePool::unregister).
    pub fn release_item(&self, element: Element<T>, return_to_pool: bool) -> PoolResult<()> {
        let mut state = self.state.lock();
        let registered = state.registered.contains_key(&element.id());

        if !return_to_pool {
            self.discard_locked(&state, &element);
            return Ok(());
        }
        if !registered {
            warn!(pool = %self.config.name, element = %element.id(), "release of unregistered element");
            return Err(PoolError::NotRegistered(element.id()));
        }
        if state.is_queued(element.id()) {
            warn!(pool = %self.config.name, element = %element.id(), "element released twice");
            return Err(PoolError::AlreadyQueued(element.id()));
        }

        trace!(pool = %self.config.name, element = %element.id(), "releasing element");
        state.queue.push_front(PoolItem::Element(element));
        MetricsTracker::increment(&self.metrics.total_released);
        self.signal_element_available(&state);
        Ok(())
    }

    /// Put a poison pill at the front of the pool.
    ///
    /// Pills are not registered and never count toward [`size`] or capacity.
    ///
    /// [`size`]: LockablePool::size
    pub fn insert_pill(&self, pill: PoisonPill) {
        let mut state = self.state.lock();
        debug!(pool = %self.config.name, reason = ?pill.reason(), "inserting poison pill");
        state.queue.push_front(PoolItem::Pill(pill));
        state.pills += 1;
        MetricsTracker::increment(&self.metrics.pills_inserted);
        self.signal_element_available(&state);
    }

    /// Take the exclusive pool lock and wait until every registered element
    /// has been returned.
    ///
    /// Other threads cannot borrow from the moment ownership is taken, but may
    /// still release. Calling this again from the owning thread returns
    /// immediately. If the wait is cancelled the lock is given up before the
    /// error is returned.
    pub fn lock(&self) -> PoolResult<()> {
        self.lock_until(None).map(|_| ())
    }

    /// Bounded [`lock`](LockablePool::lock).
    ///
    /// `Ok(false)` means the deadline passed, in which case the caller does not
    /// hold the lock. A timeout too large to represent as a deadline waits
    /// without limit.
    pub fn try_lock_for(&self, timeout: Duration) -> PoolResult<bool> {
        self.lock_until(Instant::now().checked_add(timeout))
    }

    /// Give up the exclusive pool lock
    pub fn unlock(&self) -> PoolResult<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.lock_owner != Some(me) {
            warn!(pool = %self.config.name, requester = ?me, holder = ?state.lock_owner, "unlock by non-owner");
            return Err(PoolError::LockNotHeld {
                requester: me,
                holder: state.lock_owner,
            });
        }
        self.free_pool_lock(&mut state);
        debug!(pool = %self.config.name, "pool unlocked");
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().lock_owner.is_some()
    }

    /// Thread currently holding the exclusive lock
    pub fn lock_owner(&self) -> Option<ThreadId> {
        self.state.lock().lock_owner
    }

    /// Request cancellation of `thread`'s current or next blocking wait.
    ///
    /// The request stays pending until that thread next has to wait inside
    /// the pool, where the wait fails with [`PoolError::Cancelled`]. Only
    /// interrupt threads that use this pool; a request aimed at a thread that
    /// never waits here again is kept until withdrawn with
    /// [`clear_interrupt`](LockablePool::clear_interrupt).
    pub fn interrupt(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        state.interrupted.insert(thread);
        drop(state);
        self.element_available.notify_all();
        self.pool_unlocked.notify_all();
        self.all_returned.notify_all();
    }

    /// Withdraw a pending cancellation request for `thread`.
    ///
    /// Returns whether a request was pending.
    pub fn clear_interrupt(&self, thread: ThreadId) -> bool {
        self.state.lock().interrupted.remove(&thread)
    }

    /// Number of cancellation requests not yet consumed by a wait
    pub fn pending_interrupts(&self) -> usize {
        self.state.lock().interrupted.len()
    }

    /// Drop everything currently queued.
    ///
    /// Queued elements are unregistered and returned to the caller; queued
    /// pills are discarded. Borrowed elements stay registered.
    pub fn clear(&self) -> Vec<Element<T>> {
        let mut state = self.state.lock();
        let mut removed = Vec::with_capacity(state.queued_elements());
        while let Some(item) = state.queue.pop_front() {
            if let PoolItem::Element(element) = item {
                state.registered.remove(&element.id());
                removed.push(element);
            }
        }
        state.pills = 0;
        debug!(pool = %self.config.name, removed = removed.len(), still_borrowed = state.registered.len(), "pool cleared");
        self.signal_if_all_returned(&state);
        removed
    }

    /// Number of registered elements currently available to borrow
    pub fn size(&self) -> usize {
        self.state.lock().queued_elements()
    }

    /// Capacity minus the number of elements currently available to borrow
    pub fn remaining_capacity(&self) -> usize {
        self.config.max_size.saturating_sub(self.size())
    }

    /// Number of registered elements, borrowed or not
    pub fn registered_count(&self) -> usize {
        self.state.lock().registered.len()
    }

    /// Snapshot of every registered element, ordered by [`ElementId`]
    /// (element creation order, not registration order)
    pub fn registered_elements(&self) -> Vec<Element<T>> {
        self.state.lock().registered.values().cloned().collect()
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let occupancy = self.occupancy();
        HealthStatus::new(
            occupancy.available,
            occupancy.registered.saturating_sub(occupancy.available),
            occupancy.capacity,
            occupancy.locked,
        )
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.metrics.get_metrics(self.occupancy())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    fn occupancy(&self) -> Occupancy {
        let state = self.state.lock();
        Occupancy {
            available: state.queued_elements(),
            registered: state.registered.len(),
            capacity: self.config.max_size,
            locked: state.lock_owner.is_some(),
        }
    }

    /// Take a borrowed element out of circulation; it stays registered
    pub(crate) fn discard(&self, element: &Element<T>) {
        let state = self.state.lock();
        self.discard_locked(&state, element);
    }

    fn discard_locked(&self, state: &PoolState<T>, element: &Element<T>) {
        let registered = state.registered.contains_key(&element.id());
        MetricsTracker::increment(&self.metrics.total_discarded);
        trace!(pool = %self.config.name, element = %element.id(), registered, "discarding element");
    }

    fn wrap(&self, item: PoolItem<T>) -> Checkout<'_, T> {
        match item {
            PoolItem::Element(element) => Checkout::Element(PooledElement::new(element, self)),
            PoolItem::Pill(pill) => Checkout::Pill(pill),
        }
    }

    fn borrow_until(&self, deadline: Option<Instant>) -> PoolResult<Option<PoolItem<T>>> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let wake = if state.is_locked_by_other(me) {
                self.wait(&mut state, &self.pool_unlocked, me, deadline)
            } else if state.queue.is_empty() {
                self.wait(&mut state, &self.element_available, me, deadline)
            } else {
                let item = state.pop_front();
                MetricsTracker::increment(&self.metrics.total_borrowed);
                return Ok(item);
            };

            match wake {
                Ok(Wake::Recheck) => continue,
                Ok(Wake::Expired) => {
                    self.pass_on_element_signal(&state);
                    return Ok(None);
                }
                Err(err) => {
                    self.pass_on_element_signal(&state);
                    return Err(err);
                }
            }
        }
    }

    fn lock_until(&self, deadline: Option<Instant>) -> PoolResult<bool> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.lock_owner == Some(me) {
            return Ok(true);
        }

        while state.lock_owner.is_some() {
            if let Wake::Expired = self.wait(&mut state, &self.pool_unlocked, me, deadline)? {
                return Ok(false);
            }
        }
        state.lock_owner = Some(me);
        debug!(pool = %self.config.name, "pool lock taken, waiting for outstanding elements");

        while !state.all_returned() {
            match self.wait(&mut state, &self.all_returned, me, deadline) {
                Ok(Wake::Recheck) => {}
                Ok(Wake::Expired) => {
                    debug!(pool = %self.config.name, "gave up waiting for outstanding elements");
                    self.free_pool_lock(&mut state);
                    return Ok(false);
                }
                Err(err) => {
                    self.free_pool_lock(&mut state);
                    return Err(err);
                }
            }
        }

        MetricsTracker::increment(&self.metrics.lock_acquisitions);
        debug!(pool = %self.config.name, registered = state.registered.len(), "pool locked");
        Ok(true)
    }

    /// One wait on `condition`, honouring interrupts and the deadline
    fn wait(
        &self,
        state: &mut MutexGuard<'_, PoolState<T>>,
        condition: &Condvar,
        me: ThreadId,
        deadline: Option<Instant>,
    ) -> PoolResult<Wake> {
        self.take_interrupt(state, me)?;
        match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return Ok(Wake::Expired);
                }
                condition.wait_until(state, deadline);
            }
            None => condition.wait(state),
        }
        self.take_interrupt(state, me)?;
        Ok(Wake::Recheck)
    }

    fn take_interrupt(&self, state: &mut PoolState<T>, me: ThreadId) -> PoolResult<()> {
        if state.interrupted.remove(&me) {
            MetricsTracker::increment(&self.metrics.cancellations);
            trace!(pool = %self.config.name, thread = ?me, "wait cancelled");
            return Err(PoolError::Cancelled);
        }
        Ok(())
    }

    fn free_pool_lock(&self, state: &mut PoolState<T>) {
        state.lock_owner = None;
        self.pool_unlocked.notify_all();
        // Borrowers woken for an element while the lock was held went back to
        // waiting on `pool_unlocked`; those still parked on
        // `element_available` need their own wake-up.
        if !state.queue.is_empty() {
            self.element_available.notify_all();
        }
    }

    fn signal_element_available(&self, state: &PoolState<T>) {
        // While locked a single wake-up could land on a blocked non-owner and
        // never reach the owner.
        if state.lock_owner.is_some() {
            self.element_available.notify_all();
        } else {
            self.element_available.notify_one();
        }
        self.signal_if_all_returned(state);
    }

    fn signal_if_all_returned(&self, state: &PoolState<T>) {
        if state.all_returned() {
            self.all_returned.notify_one();
        }
    }

    /// Hand a possibly consumed wake-up to the next borrower
    fn pass_on_element_signal(&self, state: &PoolState<T>) {
        if !state.queue.is_empty() {
            self.element_available.notify_one();
        }
    }
}
