// minimal API for the channel. the exposed API is a convenience wrapper around this.

use super::node_queue::{NodeQueue, NodeId};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    task::{Poll, Context},
};


// handle to a channel.
pub(crate) struct Channel<T>(Arc<Shared<T>>);

// channel shared state.
struct Shared<T> {
    // mutex around lockable state.
    lockable: Mutex<Lockable<T>>,
    // elems maximum length. never changes after construction.
    bound: Option<usize>,
}

// channel lockable state.
struct Lockable<T> {
    // storage for elements.
    elems: VecDeque<T>,
    // node queue for put futures.
    put_nodes: NodeQueue,
    // node queue for take futures.
    take_nodes: NodeQueue,
}

// lock the shared state. no user code runs while the lock is held, so poisoning can only come from
// an internal panic, after which the state is still consistent enough to keep going.
fn lock_shared<T>(shared: &Shared<T>) -> MutexGuard<'_, Lockable<T>> {
    shared.lockable.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Lockable<T> {
    // whether elems is at its bound.
    fn is_full(&self, bound: Option<usize>) -> bool {
        bound.is_some_and(|n| self.elems.len() >= n)
    }

    // whether a put may enqueue now. the put is identified by its node, or by none for a put that
    // was never linked. on an unbounded channel puts never wait, so there is no order to keep.
    fn put_admissible(&self, node: Option<NodeId>, bound: Option<usize>) -> bool {
        if bound.is_none() {
            return true;
        }
        let at_front = match node {
            Some(id) => self.put_nodes.is_front(id),
            None => self.put_nodes.len() == 0,
        };
        at_front && !self.is_full(bound)
    }

    // push an elem and notify the futures that may now be unblocked.
    fn push_elem(&mut self, elem: T, bound: Option<usize>) {
        self.elems.push_back(elem);
        self.take_nodes.wake_front();
        if !self.is_full(bound) {
            self.put_nodes.wake_front();
        }
    }

    // pop an elem, assuming non-empty, and notify the futures that may now be unblocked.
    fn pop_elem(&mut self) -> Option<T> {
        let elem = self.elems.pop_front();
        if elem.is_some() {
            self.put_nodes.wake_front();
            if !self.elems.is_empty() {
                self.take_nodes.wake_front();
            }
        }
        elem
    }
}

impl<T> Channel<T> {
    // construct empty channel.
    pub(crate) fn new(bound: Option<usize>) -> Self {
        Channel::with_elems(bound, VecDeque::new())
    }

    // construct channel already holding the given elems. panics if they exceed the bound.
    pub(crate) fn with_elems(bound: Option<usize>, elems: VecDeque<T>) -> Self {
        assert!(
            bound.map_or(true, |n| elems.len() <= n),
            "channel constructed over its bound (internal bug)",
        );
        Channel(Arc::new(Shared {
            lockable: Mutex::new(Lockable {
                elems,
                put_nodes: NodeQueue::new(),
                take_nodes: NodeQueue::new(),
            }),
            bound,
        }))
    }

    // clone another handle to the channel.
    pub(crate) fn clone(&self) -> Self {
        Channel(Arc::clone(&self.0))
    }

    // the maximum number of buffered elems, if bounded.
    pub(crate) fn bound(&self) -> Option<usize> {
        self.0.bound
    }

    // whether two handles point to the same channel.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // lock the channel.
    pub(crate) fn lock(&self) -> Lock<'_, T> {
        Lock {
            shared: &self.0,
            lock: lock_shared(&self.0),
        }
    }
}

// lock on a channel.
pub(crate) struct Lock<'a, T> {
    shared: &'a Arc<Shared<T>>,
    lock: MutexGuard<'a, Lockable<T>>,
}

impl<'a, T> Lock<'a, T> {
    // number of buffered elems.
    pub(crate) fn len(&self) -> usize {
        self.lock.elems.len()
    }

    // number of pending put and take futures.
    pub(crate) fn pending(&self) -> (usize, usize) {
        (self.lock.put_nodes.len(), self.lock.take_nodes.len())
    }

    // enqueue the elem immediately, unless that would exceed the bound or jump ahead of a pending
    // put future on a bounded channel, in which case give it back.
    pub(crate) fn try_enqueue(&mut self, elem: T) -> Result<(), T> {
        if !self.lock.put_admissible(None, self.shared.bound) {
            return Err(elem);
        }
        self.lock.push_elem(elem, self.shared.bound);
        Ok(())
    }

    // dequeue an elem immediately, unless that would jump ahead of a pending take future or the
    // channel is empty.
    pub(crate) fn try_dequeue(&mut self) -> Option<T> {
        if self.lock.take_nodes.len() > 0 {
            return None;
        }
        self.lock.pop_elem()
    }

    // construct a put future, linked to the back of the put node queue.
    pub(crate) fn put(&mut self, elem: T) -> Put<T> {
        let node = self.lock.put_nodes.push();
        Put(Some(PutInner { shared: Arc::clone(self.shared), elem, node }))
    }

    // construct a take future, linked to the back of the take node queue.
    pub(crate) fn take(&mut self) -> Take<T> {
        let node = self.lock.take_nodes.push();
        Take(Some(TakeInner { shared: Arc::clone(self.shared), node }))
    }
}

// put future. internally locks the channel when cancelled.
pub(crate) struct Put<T>(Option<PutInner<T>>);

// state for a `Put` which has not yet resolved or cancelled.
struct PutInner<T> {
    // handle to channel shared state.
    shared: Arc<Shared<T>>,
    // element to put.
    elem: T,
    // invariant: node is linked so long as it is owned by PutInner.
    node: NodeId,
}

impl<T> Put<T> {
    // poll the future. resolves upon successfully enqueueing the elem.
    //
    // internally locks the channel. panics if already resolved or cancelled.
    pub(crate) fn poll(&mut self, cx: &mut Context) -> Poll<()> {
        let inner = self.0.take()
            .expect("put future polled after already resolved or cancelled");
        let shared = Arc::clone(&inner.shared);
        let mut lock = lock_shared(&shared);

        if !lock.put_admissible(Some(inner.node), shared.bound) {
            // either backpressure or this future isn't at the front of the put node queue
            lock.put_nodes.set_waker(inner.node, cx.waker());

            // put inner state back before returning pending
            drop(lock);
            self.0 = Some(inner);
            return Poll::Pending;
        }

        // at this point, we know we will put the elem and unlink the node now
        lock.put_nodes.remove(inner.node);
        lock.push_elem(inner.elem, shared.bound);
        Poll::Ready(())
    }

    // if not already resolved or cancelled, cancel the future and return the elem.
    //
    // internally locks the channel. never panics.
    pub(crate) fn cancel(&mut self) -> Option<T> {
        let inner = self.0.take()?;
        let bound = inner.shared.bound;
        let mut lock = lock_shared(&inner.shared);
        let was_front = lock.put_nodes.remove(inner.node);
        if was_front && !lock.is_full(bound) {
            // the next put node may have been waiting on this one
            lock.put_nodes.wake_front();
        }
        drop(lock);
        Some(inner.elem)
    }

    // whether already resolved or cancelled.
    pub(crate) fn is_terminated(&self) -> bool {
        self.0.is_none()
    }
}

// take future. internally locks the channel when cancelled.
pub(crate) struct Take<T>(Option<TakeInner<T>>);

// state for a `Take` which has not yet resolved or cancelled.
struct TakeInner<T> {
    // handle to channel shared state.
    shared: Arc<Shared<T>>,
    // invariant: node is linked so long as it is owned by TakeInner.
    node: NodeId,
}

impl<T> Take<T> {
    // poll the future. resolves upon dequeueing an elem.
    //
    // internally locks the channel. panics if already resolved or cancelled.
    pub(crate) fn poll(&mut self, cx: &mut Context) -> Poll<T> {
        let inner = self.0.take()
            .expect("take future polled after already resolved or cancelled");
        let mut lock = lock_shared(&inner.shared);

        if !lock.take_nodes.is_front(inner.node) || lock.elems.is_empty() {
            lock.take_nodes.set_waker(inner.node, cx.waker());
            drop(lock);
            self.0 = Some(inner);
            return Poll::Pending;
        }

        lock.take_nodes.remove(inner.node);
        let elem = lock.pop_elem().expect("elems empty after checking (internal bug)");
        drop(lock);
        Poll::Ready(elem)
    }

    // if not already resolved or cancelled, cancel the future. returns whether it did so.
    //
    // cancelling never consumes an elem. internally locks the channel. never panics.
    pub(crate) fn cancel(&mut self) -> bool {
        let Some(inner) = self.0.take() else { return false };
        let mut lock = lock_shared(&inner.shared);
        let was_front = lock.take_nodes.remove(inner.node);
        if was_front && !lock.elems.is_empty() {
            // the elem this one would have taken is now up for grabs by the next take node
            lock.take_nodes.wake_front();
        }
        true
    }

    // whether already resolved or cancelled.
    pub(crate) fn is_terminated(&self) -> bool {
        self.0.is_none()
    }
}
