// implementation of the sluice channel.
//
// the basic architecture is vaguely inspired by flume. it is as such:
//
// channel handles wrap around Arc<shared state>
//                                  |
//          /-----------------------/
//          v
//       shared state
//          |
//          |------ the bound, fixed at construction
//          |
//          \------ a mutex around the lockable state, which contains:
//
//                  - a VecDeque<T> holding the buffered elements
//
//                  - a "put node queue": a FIFO queue of nodes each of which corresponds to a
//                    pending put future. each node has a slot for storing a Waker, and only the
//                    front node may complete, which is used to achieve fairness.
//
//                  - a "take node queue", which is the same idea for take futures.
//
// futures link their node when they are created and unlink it when they resolve or are dropped.
// a dropped take future never consumes an element, which is what lets combinators race takes
// against each other and simply drop the losers.
//
// blocking versions of operations are built as a layer on top of the futures in the polling
// module.
//
// the organization of these modules is as such:
//
//      node_queue<-------------core: Owns the locked state and the poll/cancel logic of put and
//                               ^    take. Panicky and inconvenient.
//                               |
//      polling<----------------api: This is a wrapper around core that adapts it into an API that
//                                   is convenient and defensive. The crate re-exports this API
//                                   publically.
//
// there is also the error module, which contains the relevant error types, which is also
// re-exported publically.

pub(crate) mod error;
pub(crate) mod api;

mod node_queue;
mod polling;
mod core;
