// exposed API of channels

use self::future::*;
use super::{
    error::*,
    core,
};
use std::fmt::{self, Debug, Formatter};


/// Handle to a channel
///
/// A channel is a FIFO queue of values shared by any number of producers and consumers. Cloning a
/// `Chan` creates another handle to the same queue. Channels are never closed: a take on a channel
/// that nothing will ever put into again simply never resolves.
///
/// Both halves of the contract are exposed on the one handle: [`put`](Self::put) and
/// [`take`](Self::take) create futures, which can be `.await`ed from any executor or blocked on
/// from a plain thread.
pub struct Chan<T>(core::Channel<T>);

impl<T> Chan<T> {
    /// Create a channel with no bound on how many values it buffers
    ///
    /// Putting into an unbounded channel never blocks, and puts are not ordered behind each other:
    /// a put is admitted as soon as it is attempted.
    pub fn unbounded() -> Self {
        Chan(core::Channel::new(None))
    }

    // unbounded channel already holding one value.
    pub(crate) fn holding(value: T) -> Self {
        Chan(core::Channel::with_elems(None, [value].into()))
    }

    /// Create a channel that buffers at most `capacity` values
    ///
    /// Putting into a full channel blocks until a value is taken. Panics if `capacity` is zero;
    /// rendezvous channels are not supported.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "Chan::bounded called with capacity 0");
        Chan(core::Channel::new(Some(capacity)))
    }

    /// The maximum number of buffered values, or `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.0.bound()
    }

    /// The number of values currently buffered
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether no values are currently buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `self` and `other` are handles to the same channel
    pub fn same_channel(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }

    /// Create a future to put a value into this channel
    ///
    /// See the API of [`PutFut`], as it is not only a future, but also provides additional methods,
    /// including the API for blocking on a put operation or trying to put immediately.
    pub fn put(&self, value: T) -> PutFut<T> {
        PutFut(self.0.lock().put(value))
    }

    /// Create a future to take a value from this channel
    ///
    /// See the API of [`TakeFut`], as it is not only a future, but also provides additional
    /// methods, including the API for blocking on a take operation or trying to take immediately.
    pub fn take(&self) -> TakeFut<T> {
        TakeFut(self.0.lock().take())
    }

    /// Put a value into this channel if that can be done immediately
    ///
    /// Fails, giving the value back, if the channel is full or other put operations are already
    /// waiting ahead of this one. Never fails on an unbounded channel.
    pub fn try_put(&self, value: T) -> Result<(), TryPutError<T>> {
        self.0.lock().try_enqueue(value).map_err(TryPutError::new)
    }

    /// Take a value from this channel if that can be done immediately
    ///
    /// Fails if the channel is empty or other take operations are already waiting ahead of this
    /// one.
    pub fn try_take(&self) -> Result<T, WouldBlockError> {
        self.0.lock().try_dequeue().ok_or(WouldBlockError)
    }

    /// Create a stream which takes values from this channel
    ///
    /// The stream never ends.
    pub fn stream(&self) -> TakeStream<T> {
        TakeStream { chan: self.clone(), pending: None }
    }
}

impl<T> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Chan(self.0.clone())
    }
}

impl<T> Default for Chan<T> {
    fn default() -> Self {
        Chan::unbounded()
    }
}

impl<T> Debug for Chan<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let lock = self.0.lock();
        let (pending_puts, pending_takes) = lock.pending();
        f.debug_struct("Chan")
            .field("len", &lock.len())
            .field("capacity", &self.0.bound())
            .field("pending_puts", &pending_puts)
            .field("pending_takes", &pending_takes)
            .finish()
    }
}


// future types for channels.
pub(crate) mod future {
    use super::*;
    use crate::channel::polling::{Timeout, poll};
    use std::{
        task::{Poll, Context},
        future::Future,
        pin::Pin,
        time::{Duration, Instant},
    };

    /// Future for putting into a [`Chan`]
    ///
    /// The value will not be put until this future resolves (a call to `poll` returns
    /// `Poll::Ready`). If this future has not yet resolved, the put operation may be aborted and
    /// its value retrieved by calling [`rescind`](Self::rescind) (or by dropping).
    ///
    /// On a bounded channel, put futures are admitted in the order they were created. Thus, if one
    /// creates a put future and holds it for an extended period without resolving it, it may block
    /// put futures created after it. On an unbounded channel, puts are admitted as they are polled.
    pub struct PutFut<T>(pub(super) core::Put<T>);

    // the value is never pinned
    impl<T> Unpin for PutFut<T> {}

    fn would_block<T>(fut: &mut PutFut<T>) -> TryPutError<T> {
        let value = fut.0.cancel().expect("rescinding unresolved put failed (internal bug)");
        TryPutError::new(value)
    }

    impl<T> Future for PutFut<T> {
        type Output = ();

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
            let this = self.get_mut();
            // for implementation of FusedFuture
            if this.is_terminated() {
                return Poll::Pending;
            }
            this.0.poll(cx)
        }
    }

    impl<T> PutFut<T> {
        /// If the value has not yet been put, abort the put operation and rescind the value
        ///
        /// Returns `Some` if this future had not yet resolved or rescinded.
        pub fn rescind(&mut self) -> Option<T> {
            self.0.cancel()
        }

        /// Try to resolve this future immediately without blocking
        ///
        /// If this fails, the put operation is rescinded and the value is returned in the error.
        /// This method will panic if this future has already resolved or rescinded.
        pub fn try_now(&mut self) -> Result<(), TryPutError<T>> {
            assert!(!self.is_terminated(), "PutFut.try_now called after terminated");
            poll(self, Timeout::NonBlocking).ok_or_else(|| would_block(self))
        }

        /// Block until this future resolves
        ///
        /// Must not be called from within an async task, as it blocks the thread. This method
        /// will panic if this future has already resolved or rescinded.
        pub fn block(&mut self) {
            assert!(!self.is_terminated(), "PutFut.block called after terminated");
            poll(self, Timeout::Never).expect("poll timed out with Timeout::Never")
        }

        /// Block until this future resolves or a timeout elapses
        ///
        /// If the timeout elapses, the put operation is rescinded and the value is returned in the
        /// error. This method will panic if this future has already resolved or rescinded.
        pub fn block_timeout(&mut self, timeout: Duration) -> Result<(), TryPutError<T>> {
            assert!(!self.is_terminated(), "PutFut.block_timeout called after terminated");
            self.block_deadline(Instant::now() + timeout)
        }

        /// Block until this future resolves or the deadline is reached
        ///
        /// If the deadline is reached, the put operation is rescinded and the value is returned in
        /// the error. This method will panic if this future has already resolved or rescinded.
        pub fn block_deadline(&mut self, deadline: Instant) -> Result<(), TryPutError<T>> {
            assert!(!self.is_terminated(), "PutFut.block_deadline called after terminated");
            poll(self, Timeout::At(deadline)).ok_or_else(|| would_block(self))
        }

        /// Whether this future has already resolved or rescinded
        pub fn is_terminated(&self) -> bool {
            self.0.is_terminated()
        }
    }

    impl<T> futures::future::FusedFuture for PutFut<T> {
        fn is_terminated(&self) -> bool {
            Self::is_terminated(self)
        }
    }

    impl<T> Drop for PutFut<T> {
        fn drop(&mut self) {
            self.rescind();
        }
    }


    /// Future for taking from a [`Chan`]
    ///
    /// A value will not be dequeued from the channel until this future resolves (a call to `poll`
    /// returns `Poll::Ready`). If this future has not yet resolved, the take operation may be
    /// aborted by calling [`abort`](Self::abort) (or by dropping), in which case it has no effect
    /// on the channel.
    ///
    /// Take futures are served in the order they were created. Thus, if one creates a take future
    /// and holds it for an extended period without resolving it, it may block take futures created
    /// after it.
    pub struct TakeFut<T>(pub(super) core::Take<T>);

    impl<T> Unpin for TakeFut<T> {}

    impl<T> Future for TakeFut<T> {
        type Output = T;

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<T> {
            let this = self.get_mut();
            // for implementation of FusedFuture
            if this.is_terminated() {
                return Poll::Pending;
            }
            this.0.poll(cx)
        }
    }

    impl<T> TakeFut<T> {
        /// Abort this take operation
        ///
        /// Does nothing if this future has already resolved or aborted. This method never panics.
        pub fn abort(&mut self) {
            self.0.cancel();
        }

        /// Block until this future resolves
        ///
        /// Must not be called from within an async task, as it blocks the thread. This method
        /// will panic if this future has already resolved or aborted.
        pub fn block(&mut self) -> T {
            assert!(!self.is_terminated(), "TakeFut.block called after terminated");
            poll(self, Timeout::Never).expect("poll timed out with Timeout::Never")
        }

        /// Try to resolve this future immediately without blocking
        ///
        /// If this returns [`WouldBlockError`], the take operation remains pending. This method
        /// will panic if this future has already resolved or aborted.
        pub fn try_now(&mut self) -> Result<T, WouldBlockError> {
            assert!(!self.is_terminated(), "TakeFut.try_now called after terminated");
            poll(self, Timeout::NonBlocking).ok_or(WouldBlockError)
        }

        /// Block until this future resolves or a timeout elapses
        ///
        /// If this returns [`WouldBlockError`], the take operation remains pending. This method
        /// will panic if this future has already resolved or aborted.
        pub fn block_timeout(&mut self, timeout: Duration) -> Result<T, WouldBlockError> {
            assert!(!self.is_terminated(), "TakeFut.block_timeout called after terminated");
            self.block_deadline(Instant::now() + timeout)
        }

        /// Block until this future resolves or the deadline is reached
        ///
        /// If this returns [`WouldBlockError`], the take operation remains pending. This method
        /// will panic if this future has already resolved or aborted.
        pub fn block_deadline(&mut self, deadline: Instant) -> Result<T, WouldBlockError> {
            assert!(!self.is_terminated(), "TakeFut.block_deadline called after terminated");
            poll(self, Timeout::At(deadline)).ok_or(WouldBlockError)
        }

        /// Whether this future has already resolved or aborted
        pub fn is_terminated(&self) -> bool {
            self.0.is_terminated()
        }
    }

    impl<T> futures::future::FusedFuture for TakeFut<T> {
        fn is_terminated(&self) -> bool {
            Self::is_terminated(self)
        }
    }

    impl<T> Drop for TakeFut<T> {
        fn drop(&mut self) {
            self.abort();
        }
    }


    /// Stream of values taken from a [`Chan`]
    ///
    /// Created by [`Chan::stream`]. Never ends, since channels are never closed.
    pub struct TakeStream<T> {
        pub(super) chan: Chan<T>,
        pub(super) pending: Option<TakeFut<T>>,
    }

    impl<T> futures::Stream for TakeStream<T> {
        type Item = T;

        fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<T>> {
            let this = self.get_mut();
            let fut = this.pending.get_or_insert_with(|| this.chan.take());
            match Pin::new(fut).poll(cx) {
                Poll::Ready(value) => {
                    this.pending = None;
                    Poll::Ready(Some(value))
                }
                Poll::Pending => Poll::Pending,
            }
        }
    }
}


// ==== tests ====


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashSet,
        thread,
        time::Duration,
    };
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    #[test]
    fn basic_1000_test() {
        let chan = Chan::bounded(500);
        let send = chan.clone();
        let recv = chan;

        let join_1 = thread::spawn(move || {
            for i in 1..=1000 {
                send.put(i).block_timeout(Duration::from_millis(10)).unwrap();
                if i < 1000 && i % 100 == 0 {
                    thread::sleep(Duration::from_millis(50));
                }
            }
        });
        let join_2 = thread::spawn(move || {
            for i in 1..=1000 {
                let j = recv.take().block_timeout(Duration::from_millis(500)).unwrap();
                assert_eq!(i, j);
            }
            assert!(recv.take().block_timeout(Duration::from_millis(10)).is_err());
        });
        join_1.join().unwrap();
        join_2.join().unwrap();
    }

    #[test]
    fn bounded_put_blocks_until_space() {
        let chan = Chan::bounded(1);
        chan.put(1).try_now().unwrap();
        let err = chan.put(2).try_now().unwrap_err();
        assert_eq!(err.into_inner(), 2);
        assert_eq!(chan.try_put(3).unwrap_err().value, 3);

        let recv = chan.clone();
        let join = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            recv.take().block()
        });
        chan.put(4).block_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(join.join().unwrap(), 1);
        assert_eq!(chan.try_take(), Ok(4));
    }

    #[test]
    fn unbounded_put_never_waits_behind_pending_put() {
        let chan = Chan::unbounded();
        let mut held = chan.put("held");
        chan.try_put("first").unwrap();
        held.try_now().unwrap();
        assert_eq!(chan.try_take(), Ok("first"));
        assert_eq!(chan.try_take(), Ok("held"));

        let chan = Chan::bounded(4);
        let _held = chan.put("held");
        assert_eq!(chan.try_put("refused").unwrap_err().into_inner(), "refused");
    }

    #[test]
    fn holding_yields_value_once() {
        let chan = Chan::holding(5);
        assert_eq!(chan.capacity(), None);
        assert_eq!(chan.try_take(), Ok(5));
        assert!(chan.is_empty());
    }

    #[test]
    fn try_take_empty_would_block() {
        let chan = Chan::<u8>::unbounded();
        assert_eq!(chan.try_take(), Err(WouldBlockError));
        assert!(chan.is_empty());
    }

    #[test]
    fn aborted_take_consumes_nothing() {
        let chan = Chan::unbounded();
        let mut first = chan.take();
        let mut second = chan.take();
        chan.try_put("a").unwrap();
        // only the front take may resolve
        assert!(second.try_now().is_err());
        assert_eq!(first.try_now(), Ok("a"));
        assert!(first.is_terminated());
        chan.try_put("b").unwrap();
        assert_eq!(second.try_now(), Ok("b"));

        let mut abandoned = chan.take();
        chan.try_put("c").unwrap();
        abandoned.abort();
        assert_eq!(chan.len(), 1);
        assert_eq!(chan.take().block(), "c");
    }

    #[test]
    fn rescinded_put_admits_next() {
        let chan = Chan::bounded(1);
        let mut first = chan.put(1);
        let mut second = chan.put(2);
        assert!(second.try_now().is_err());
        let mut second = chan.put(2);
        assert_eq!(first.rescind(), Some(1));
        second.try_now().unwrap();
        assert_eq!(chan.try_take(), Ok(2));
    }

    #[test]
    fn debug_shows_state() {
        let chan = Chan::bounded(4);
        chan.try_put(1).unwrap();
        let _waiting = chan.take();
        let shown = format!("{:?}", chan);
        assert!(shown.contains("len: 1"), "{}", shown);
        assert!(shown.contains("capacity: Some(4)"), "{}", shown);
        assert!(shown.contains("pending_takes: 1"), "{}", shown);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _ = Chan::<()>::bounded(0);
    }

    #[test]
    fn stochastic_mpmc_fifo_test() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 3;
        const PER_PRODUCER: usize = 200;

        let chan = Chan::bounded(8);
        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let chan = chan.clone();
            producers.push(thread::spawn(move || {
                let mut rng = Pcg32::seed_from_u64(p as u64);
                for i in 0..PER_PRODUCER {
                    chan.put((p, i)).block_timeout(Duration::from_secs(5)).unwrap();
                    if rng.gen_ratio(1, 20) {
                        thread::sleep(Duration::from_micros(rng.gen_range(0..500)));
                    }
                }
            }));
        }
        let mut consumers = Vec::new();
        for c in 0..CONSUMERS {
            let chan = chan.clone();
            consumers.push(thread::spawn(move || {
                let mut rng = Pcg32::seed_from_u64(1000 + c as u64);
                let mut seen = Vec::new();
                while let Ok(msg) = chan.take().block_timeout(Duration::from_millis(300)) {
                    seen.push(msg);
                    if rng.gen_ratio(1, 20) {
                        thread::sleep(Duration::from_micros(rng.gen_range(0..500)));
                    }
                }
                seen
            }));
        }
        for join in producers {
            join.join().unwrap();
        }

        let mut all = HashSet::new();
        for join in consumers {
            let seen = join.join().unwrap();
            // each consumer observes each producer's values in the order they were put
            for p in 0..PRODUCERS {
                let from_p = seen.iter().filter(|&&(q, _)| q == p).map(|&(_, i)| i);
                let ordered: Vec<usize> = from_p.collect();
                assert!(ordered.windows(2).all(|w| w[0] < w[1]));
            }
            for msg in seen {
                assert!(all.insert(msg), "duplicate {:?}", msg);
            }
        }
        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn await_across_tasks() {
        let chan = Chan::unbounded();
        let recv = chan.clone();
        let join = tokio::spawn(async move {
            let a = recv.take().await;
            let b = recv.take().await;
            a + b
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        chan.put(20).await;
        chan.put(22).await;
        assert_eq!(join.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn stream_yields_in_order() {
        use futures::StreamExt;

        let chan = Chan::unbounded();
        for i in 0..5 {
            chan.try_put(i).unwrap();
        }
        let taken: Vec<i32> = chan.stream().take(5).collect().await;
        assert_eq!(taken, vec![0, 1, 2, 3, 4]);
        assert!(chan.is_empty());
    }
}
