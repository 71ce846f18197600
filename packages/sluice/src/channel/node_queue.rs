// queue of waiting operations part of a channel.

use std::{
    collections::VecDeque,
    task::Waker,
};


// identifier of a node within the queue it was pushed to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct NodeId(u64);

// FIFO queue of nodes, each of which corresponds to a pending put or take future.
//
// the position of a node in the queue is used to achieve fairness: only the front node may
// complete its operation. each node has a slot for storing the waker of its future.
#[derive(Default)]
pub(crate) struct NodeQueue {
    // nodes from front to back.
    nodes: VecDeque<Node>,
    // id to assign to the next pushed node.
    next_id: u64,
}

// a linked node.
struct Node {
    id: NodeId,
    // waker installed by the most recent poll that returned pending, unless already woken.
    waker: Option<Waker>,
}

impl NodeQueue {
    // construct empty queue.
    pub(crate) fn new() -> Self {
        NodeQueue::default()
    }

    // number of linked nodes.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    // link a new node to the back of this queue.
    pub(crate) fn push(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push_back(Node { id, waker: None });
        id
    }

    // whether the node is at the front of the queue.
    pub(crate) fn is_front(&self, id: NodeId) -> bool {
        self.nodes.front().is_some_and(|node| node.id == id)
    }

    // install a waker for the node, unless an equivalent one is already installed.
    //
    // panics if the node is not linked.
    pub(crate) fn set_waker(&mut self, id: NodeId, waker: &Waker) {
        let node = self.nodes.iter_mut()
            .find(|node| node.id == id)
            .expect("set_waker on unlinked node (internal bug)");
        if !node.waker.as_ref().is_some_and(|old| old.will_wake(waker)) {
            node.waker = Some(waker.clone());
        }
    }

    // unlink the node from this queue, dropping its waker. returns whether it was at the front.
    //
    // panics if the node is not linked.
    pub(crate) fn remove(&mut self, id: NodeId) -> bool {
        let idx = self.nodes.iter()
            .position(|node| node.id == id)
            .expect("remove on unlinked node (internal bug)");
        self.nodes.remove(idx);
        idx == 0
    }

    // wake the front node, if there is one and it has a waker.
    pub(crate) fn wake_front(&mut self) {
        if let Some(waker) = self.nodes.front_mut().and_then(|node| node.waker.take()) {
            waker.wake();
        }
    }
}
