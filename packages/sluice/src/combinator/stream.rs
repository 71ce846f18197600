// combinators that transform one upstream channel into one downstream channel.
//
// each spawns one task which loops forever, taking from upstream and putting downstream. the
// supplied functions run inline on the async workers.

use crate::{
    Chan,
    task::{self, TaskKind},
};
use std::mem::replace;


/// Apply `f` to every value taken from `upstream`
///
/// Output order matches input order. If `f` panics, the task dies and the output stalls.
pub fn map<T, R, F>(mut f: F, upstream: &Chan<T>) -> Chan<R>
where
    F: FnMut(T) -> R + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    let out = Chan::unbounded();
    let (recv, send) = (upstream.clone(), out.clone());
    task::spawn(TaskKind::Map, async move {
        loop {
            let value = recv.take().await;
            send.put(f(value)).await;
        }
    });
    out
}

/// Forward only the values taken from `upstream` for which `predicate` holds
///
/// Other values are discarded. Output order matches input order.
pub fn filter<T, P>(mut predicate: P, upstream: &Chan<T>) -> Chan<T>
where
    P: FnMut(&T) -> bool + Send + 'static,
    T: Send + 'static,
{
    let out = Chan::unbounded();
    let (recv, send) = (upstream.clone(), out.clone());
    task::spawn(TaskKind::Filter, async move {
        loop {
            let value = recv.take().await;
            if predicate(&value) {
                send.put(value).await;
            }
        }
    });
    out
}

/// Batch consecutive values taken from `upstream` into batches of exactly `size`
///
/// A batch is emitted as soon as it is full, and a new one started. An incomplete batch is held
/// until enough values arrive. Panics if `size` is zero.
pub fn chunk<T>(size: usize, upstream: &Chan<T>) -> Chan<Vec<T>>
where
    T: Send + 'static,
{
    assert!(size > 0, "chunk called with size 0");
    let out = Chan::unbounded();
    let (recv, send) = (upstream.clone(), out.clone());
    task::spawn(TaskKind::Chunk, async move {
        // grown as values arrive, since `size` may be far larger than any batch ever filled
        let mut batch = Vec::new();
        loop {
            batch.push(recv.take().await);
            if batch.len() == size {
                let full = replace(&mut batch, Vec::new());
                send.put(full).await;
            }
        }
    });
    out
}

/// Flat-map over channels
///
/// For every value taken from `upstream`, `f` produces a fresh inner channel, and a forwarding task
/// is spawned which drains that inner channel into the output forever. The outer loop does not
/// wait for inner channels. Values of different inner channels may interleave in any order, but
/// each inner channel's own order is preserved.
///
/// Forwarding tasks are never retired, so one task accumulates per upstream value.
pub fn bind<T, R, F>(mut f: F, upstream: &Chan<T>) -> Chan<R>
where
    F: FnMut(T) -> Chan<R> + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    let out = Chan::unbounded();
    let (recv, send) = (upstream.clone(), out.clone());
    task::spawn(TaskKind::Bind, async move {
        loop {
            let value = recv.take().await;
            let inner = f(value);
            let send = send.clone();
            task::spawn(TaskKind::BindForward, async move {
                loop {
                    let value = inner.take().await;
                    send.put(value).await;
                }
            });
        }
    });
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);
    const NOTHING: Duration = Duration::from_millis(100);

    fn fed<T>(values: impl IntoIterator<Item = T>) -> Chan<T> {
        let chan = Chan::unbounded();
        for value in values {
            chan.try_put(value).unwrap_or_else(|_| unreachable!());
        }
        chan
    }

    fn drain<T>(chan: &Chan<T>, n: usize) -> Vec<T> {
        (0..n).map(|_| chan.take().block_timeout(WAIT).unwrap()).collect()
    }

    #[test]
    fn map_preserves_order() {
        let out = map(|x: u32| x * 2, &fed(0..100));
        assert_eq!(drain(&out, 100), (0..100).map(|x| x * 2).collect::<Vec<_>>());
        assert!(out.take().block_timeout(NOTHING).is_err());
    }

    #[test]
    fn map_keeps_state_between_values() {
        let mut total = 0;
        let out = map(move |x: u32| { total += x; total }, &fed([1, 2, 3, 4]));
        assert_eq!(drain(&out, 4), vec![1, 3, 6, 10]);
    }

    #[test]
    fn map_panic_stalls_downstream() {
        let upstream = fed(1..=5);
        let out = map(|x: u32| if x == 3 { panic!("map failure in test") } else { x }, &upstream);
        assert_eq!(drain(&out, 2), vec![1, 2]);
        assert!(out.take().block_timeout(Duration::from_millis(300)).is_err());
        // nothing takes from upstream after the failure
        assert_eq!(upstream.len(), 2);
    }

    #[test]
    fn filter_drops_failing_values() {
        let out = filter(|x: &u32| x % 2 == 0, &fed(0..50));
        assert_eq!(drain(&out, 25), (0..50).step_by(2).collect::<Vec<_>>());
        assert!(out.take().block_timeout(NOTHING).is_err());
    }

    #[test]
    fn chunk_emits_full_batches_in_order() {
        let upstream = fed(0..9);
        let out = chunk(3, &upstream);
        assert_eq!(drain(&out, 3), vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]);

        upstream.try_put(9).unwrap();
        upstream.try_put(10).unwrap();
        assert!(out.take().block_timeout(NOTHING).is_err());
        upstream.try_put(11).unwrap();
        assert_eq!(out.take().block_timeout(WAIT), Ok(vec![9, 10, 11]));
    }

    #[test]
    fn chunk_of_one_passes_every_value() {
        let out = chunk(1, &fed(["a", "b"]));
        assert_eq!(drain(&out, 2), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn chunk_huge_size_holds_values() {
        let upstream = Chan::unbounded();
        let out = chunk(1usize << 40, &upstream);
        for i in 0..3u64 {
            upstream.try_put(i).unwrap();
        }
        assert!(out.take().block_timeout(NOTHING).is_err());
        // the task took every value and is still alive
        assert!(upstream.is_empty());
        assert!(task::live_tasks_of(TaskKind::Chunk) >= 1);
    }

    #[test]
    #[should_panic]
    fn chunk_size_zero_panics() {
        let _ = chunk(0, &Chan::<u8>::unbounded());
    }

    #[test]
    fn bind_delivers_every_inner_value() {
        const N: usize = 50;

        let out = bind(|tag: char| fed((0..N).map(move |i| (tag, i))), &fed(['a', 'b']));
        let all = drain(&out, 2 * N);
        for tag in ['a', 'b'] {
            let group: Vec<usize> = all.iter()
                .filter(|&&(t, _)| t == tag)
                .map(|&(_, i)| i)
                .collect();
            assert_eq!(group, (0..N).collect::<Vec<_>>());
        }
        assert!(out.take().block_timeout(NOTHING).is_err());
        assert!(task::live_tasks_of(TaskKind::BindForward) >= 2);
    }

    #[test]
    fn bind_does_not_wait_for_inner_channels() {
        let first = Chan::unbounded();
        let second = Chan::unbounded();
        let inners = [first.clone(), second.clone()];
        let mut next = 0;
        let out = bind(move |_: ()| {
            next += 1;
            inners[next - 1].clone()
        }, &fed([(), ()]));

        // the first inner channel never produces, yet the second is still forwarded
        second.try_put("from second").unwrap();
        assert_eq!(out.take().block_timeout(WAIT), Ok("from second"));
        first.try_put("from first").unwrap();
        assert_eq!(out.take().block_timeout(WAIT), Ok("from first"));
    }
}
