// the combinators.
//
// every combinator returns immediately, having spawned whatever task feeds the channel it returns.
// the organization of these modules is as such:
//
//      source: originate values (returned, go, go_run, go_async, go_loop)
//      stream: one upstream channel to one downstream channel (map, filter, chunk, bind)
//      race:   first-of-many and the clock (timeout, select, select_async)

mod source;
mod stream;
pub(crate) mod race;

pub use self::{
    source::{returned, go, go_run, go_async, go_loop},
    stream::{map, filter, chunk, bind},
    race::{timeout, select, select_async},
};


/// Sentinel carried by channels which signal completion rather than a payload
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Signal {
    /// The operation is done
    Done,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::Chan;
    use std::{
        thread,
        time::{Duration, Instant},
    };

    // a greeting mapped once, then bound to a producer that repeats it every second
    #[test]
    fn repeating_greeting_pipeline() {
        let greeting = map(|x: String| x + " tom", &returned("howdy".to_owned()));
        let repeated = bind(|x: String| {
            let inner = Chan::unbounded();
            let send = inner.clone();
            go_loop(move || {
                thread::sleep(Duration::from_secs(1));
                send.put(format!("{} poop", x)).block();
            });
            inner
        }, &greeting);

        let start = Instant::now();
        let first = repeated.take().block_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, "howdy tom poop");
        assert!(start.elapsed() >= Duration::from_millis(900), "{:?}", start.elapsed());

        for _ in 0..2 {
            let before = Instant::now();
            let next = repeated.take().block_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(next, "howdy tom poop");
            let gap = before.elapsed();
            assert!(gap >= Duration::from_millis(500), "{:?}", gap);
            assert!(gap <= Duration::from_millis(1800), "{:?}", gap);
        }
    }

    // batches of filtered values, each raced against a deadline
    #[test]
    fn composed_pipeline() {
        let numbers = Chan::unbounded();
        let evens = filter(|x: &u32| x % 2 == 0, &numbers);
        let pairs = chunk(2, &evens);
        let sums = map(|pair: Vec<u32>| pair.iter().sum::<u32>(), &pairs);

        for i in 0..8 {
            numbers.try_put(i).unwrap();
        }
        let sums = map(Some, &sums);
        let or_deadline = || {
            let deadline = map(|_| None, &timeout(Duration::from_secs(2)));
            select(&[sums.clone(), deadline])
        };
        // 0 + 2, then 4 + 6
        assert_eq!(or_deadline().take().block(), Some(2));
        assert_eq!(or_deadline().take().block(), Some(10));
        // nothing else ever arrives
        assert_eq!(or_deadline().take().block(), None);
    }
}
