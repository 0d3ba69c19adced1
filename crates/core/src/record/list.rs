use std::fmt;

use super::Record;

/// Stable reference to a node inside a [`RecordList`].
///
/// A handle stays valid until its node is removed. Removed slots are reused
/// with a bumped generation, so an old handle never resolves to a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Node {
    record: Record,
    previous: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Doubly linked list of records backed by an arena of slots.
///
/// The list does not enforce time ordering on its own: callers choose the
/// anchor for `insert_after` / `insert_before` so that times stay strictly
/// increasing from `first` to `last`.
#[derive(Default)]
pub struct RecordList {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl RecordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `handle` still refers to a node of this list.
    pub fn contains(&self, handle: RecordHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn get(&self, handle: RecordHandle) -> Option<&Record> {
        self.node(handle).map(|node| &node.record)
    }

    pub fn get_mut(&mut self, handle: RecordHandle) -> Option<&mut Record> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
            .map(|node| &mut node.record)
    }

    pub fn first(&self) -> Option<RecordHandle> {
        self.head.map(|index| self.handle_at(index))
    }

    pub fn last(&self) -> Option<RecordHandle> {
        self.tail.map(|index| self.handle_at(index))
    }

    pub fn next(&self, handle: RecordHandle) -> Option<RecordHandle> {
        self.node(handle)
            .and_then(|node| node.next)
            .map(|index| self.handle_at(index))
    }

    pub fn previous(&self, handle: RecordHandle) -> Option<RecordHandle> {
        self.node(handle)
            .and_then(|node| node.previous)
            .map(|index| self.handle_at(index))
    }

    /// Appends `record` after the current tail.
    pub fn push_back(&mut self, record: Record) -> RecordHandle {
        let index = self.allocate(Node {
            record,
            previous: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.node_at_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.handle_at(index)
    }

    /// Inserts `record` right after `anchor`. Returns `None` when the anchor
    /// is no longer part of the list.
    pub fn insert_after(&mut self, anchor: RecordHandle, record: Record) -> Option<RecordHandle> {
        let next = self.node(anchor)?.next;
        let index = self.allocate(Node {
            record,
            previous: Some(anchor.index),
            next,
        });
        self.node_at_mut(anchor.index).next = Some(index);
        match next {
            Some(next) => self.node_at_mut(next).previous = Some(index),
            None => self.tail = Some(index),
        }
        Some(self.handle_at(index))
    }

    /// Inserts `record` right before `anchor`. Returns `None` when the anchor
    /// is no longer part of the list.
    pub fn insert_before(
        &mut self,
        anchor: RecordHandle,
        record: Record,
    ) -> Option<RecordHandle> {
        let previous = self.node(anchor)?.previous;
        let index = self.allocate(Node {
            record,
            previous,
            next: Some(anchor.index),
        });
        self.node_at_mut(anchor.index).previous = Some(index);
        match previous {
            Some(previous) => self.node_at_mut(previous).next = Some(index),
            None => self.head = Some(index),
        }
        Some(self.handle_at(index))
    }

    /// Unlinks the node behind `handle` and hands back its record.
    pub fn remove(&mut self, handle: RecordHandle) -> Option<Record> {
        self.node(handle)?;
        let slot = &mut self.slots[handle.index];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;

        match node.previous {
            Some(previous) => self.node_at_mut(previous).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_at_mut(next).previous = node.previous,
            None => self.tail = node.previous,
        }
        Some(node.record)
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates records from first to last.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn node(&self, handle: RecordHandle) -> Option<&Node> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_at_mut(&mut self, index: usize) -> &mut Node {
        self.slots[index]
            .node
            .as_mut()
            .expect("linked index must point at an occupied slot")
    }

    fn handle_at(&self, index: usize) -> RecordHandle {
        RecordHandle {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn allocate(&mut self, node: Node) -> usize {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        }
    }
}

impl fmt::Debug for RecordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|record| record.time)).finish()
    }
}

/// Front-to-back iterator over a [`RecordList`].
pub struct Iter<'a> {
    list: &'a RecordList,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.slots[self.cursor?].node.as_ref()?;
        self.cursor = node.next;
        Some(&node.record)
    }
}
