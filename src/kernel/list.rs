// Sorted circular doubly-linked lists over a fixed arena
//
// Every list has an end marker (sentinel) holding MAX_DELAY, so it is
// always last and a walk from the marker wraps back to it. Items carry
// a key, links, the list that holds them and the object that owns them.
// Links are arena indices instead of pointers: a back-reference is an
// array lookup, never a scan.
//
// Ready lists use insert_end (round-robin order), delay and event lists
// use insert (ascending key, FIFO among equal keys).

use core::fmt;

use crate::config::{MAX_DELAY, TickType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u16);

impl ItemId {
    pub const fn new(index: usize) -> Self {
        Self(index as u16)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListId(u8);

impl ListId {
    pub const fn new(index: usize) -> Self {
        Self(index as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A position in a list: either its end marker or a real item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    End,
    Item(ItemId),
}

#[derive(Debug, Clone, Copy)]
pub struct ListItem<O> {
    value: TickType,
    next: Link,
    prev: Link,
    owner: Option<O>,
    container: Option<ListId>,
}

impl<O> ListItem<O> {
    pub const fn new() -> Self {
        Self {
            value: 0,
            next: Link::End,
            prev: Link::End,
            owner: None,
            container: None,
        }
    }
}

impl<O> Default for ListItem<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct List {
    len: usize,
    // roving cursor for round-robin; End when nothing visited yet
    index: Link,
    end_value: TickType,
    end_next: Link,
    end_prev: Link,
}

impl List {
    pub const fn new() -> Self {
        Self {
            len: 0,
            index: Link::End,
            end_value: MAX_DELAY,
            end_next: Link::End,
            end_prev: Link::End,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Key of the end marker, always `MAX_DELAY`.
    pub fn end_value(&self) -> TickType {
        self.end_value
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    /// forward and backward links disagree, or the walk never returns
    Broken,
    /// item count differs from the number of linked items
    Miscounted,
    /// a linked item does not name this list as its container
    WrongContainer,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::Broken => write!(f, "list links broken"),
            IntegrityError::Miscounted => write!(f, "list length mismatch"),
            IntegrityError::WrongContainer => write!(f, "item container mismatch"),
        }
    }
}

/// Fixed storage for `LISTS` lists and the `ITEMS` items that move
/// between them. `O` is the owner back-reference stored in each item.
pub struct ListArena<O, const ITEMS: usize, const LISTS: usize> {
    items: [ListItem<O>; ITEMS],
    lists: [List; LISTS],
}

impl<O: Copy, const ITEMS: usize, const LISTS: usize> ListArena<O, ITEMS, LISTS> {
    pub const fn new() -> Self {
        Self {
            items: [const { ListItem::new() }; ITEMS],
            lists: [const { List::new() }; LISTS],
        }
    }

    /// Reset `list` to the empty circular state.
    pub fn initialise(&mut self, list: ListId) {
        self.lists[list.index()] = List::new();
    }

    /// Mark `item` as not belonging to any list.
    pub fn initialise_item(&mut self, item: ItemId) {
        self.items[item.index()].container = None;
    }

    pub fn list(&self, list: ListId) -> &List {
        &self.lists[list.index()]
    }

    pub fn len(&self, list: ListId) -> usize {
        self.lists[list.index()].len
    }

    pub fn is_empty(&self, list: ListId) -> bool {
        self.lists[list.index()].len == 0
    }

    pub fn value(&self, item: ItemId) -> TickType {
        self.items[item.index()].value
    }

    pub fn set_value(&mut self, item: ItemId, value: TickType) {
        self.items[item.index()].value = value;
    }

    pub fn owner(&self, item: ItemId) -> Option<O> {
        self.items[item.index()].owner
    }

    pub fn set_owner(&mut self, item: ItemId, owner: O) {
        self.items[item.index()].owner = Some(owner);
    }

    pub fn container(&self, item: ItemId) -> Option<ListId> {
        self.items[item.index()].container
    }

    pub fn is_contained_within(&self, list: ListId, item: ItemId) -> bool {
        self.items[item.index()].container == Some(list)
    }

    /// First item after the end marker.
    pub fn head(&self, list: ListId) -> Option<ItemId> {
        match self.lists[list.index()].end_next {
            Link::Item(id) => Some(id),
            Link::End => None,
        }
    }

    pub fn head_value(&self, list: ListId) -> Option<TickType> {
        self.head(list).map(|id| self.items[id.index()].value)
    }

    pub fn head_owner(&self, list: ListId) -> Option<O> {
        self.head(list).and_then(|id| self.items[id.index()].owner)
    }

    /// Insert keeping ascending key order; equal keys go after the
    /// ones already present.
    pub fn insert(&mut self, list: ListId, item: ItemId) {
        debug_assert!(
            self.items[item.index()].container.is_none(),
            "list: item {:?} is already linked",
            item
        );

        let value = self.items[item.index()].value;
        let after = if value == MAX_DELAY {
            // nothing can sort after MAX_DELAY, skip the scan
            self.lists[list.index()].end_prev
        } else {
            let mut it = Link::End;
            loop {
                match self.next(list, it) {
                    Link::Item(n) if self.items[n.index()].value <= value => it = Link::Item(n),
                    _ => break,
                }
            }
            it
        };

        self.link_after(list, after, item);
    }

    /// Insert right before the round-robin cursor, i.e. as the entry the
    /// cursor will reach last. No key comparison.
    pub fn insert_end(&mut self, list: ListId, item: ItemId) {
        debug_assert!(
            self.items[item.index()].container.is_none(),
            "list: item {:?} is already linked",
            item
        );

        let index = self.lists[list.index()].index;
        let after = self.prev(list, index);
        self.link_after(list, after, item);
    }

    /// Unlink `item` from whatever list holds it and return that list's
    /// new length. The item must be linked.
    pub fn remove(&mut self, item: ItemId) -> usize {
        let container = self.items[item.index()].container;
        debug_assert!(
            container.is_some(),
            "list: removing item {:?} that is not linked",
            item
        );
        let Some(list) = container else {
            return 0;
        };

        let ListItem { next, prev, .. } = self.items[item.index()];
        self.set_prev(list, next, prev);
        self.set_next(list, prev, next);

        let l = &mut self.lists[list.index()];
        if l.index == Link::Item(item) {
            l.index = prev;
        }
        l.len -= 1;
        let len = l.len;

        self.items[item.index()].container = None;
        self.verify(list);
        len
    }

    /// Advance the round-robin cursor (stepping over the end marker) and
    /// return the owner it lands on.
    pub fn next_owner(&mut self, list: ListId) -> Option<O> {
        if self.is_empty(list) {
            return None;
        }

        let mut index = self.next(list, self.lists[list.index()].index);
        if index == Link::End {
            index = self.lists[list.index()].end_next;
        }
        self.lists[list.index()].index = index;

        match index {
            Link::Item(id) => self.items[id.index()].owner,
            Link::End => None,
        }
    }

    pub fn iter(&self, list: ListId) -> Iter<'_, O, ITEMS, LISTS> {
        Iter {
            arena: self,
            list,
            cur: Link::End,
            remaining: self.lists[list.index()].len,
        }
    }

    /// True when keys never decrease walking forward from the end marker.
    pub fn is_sorted(&self, list: ListId) -> bool {
        let mut last: Option<TickType> = None;
        for id in self.iter(list) {
            let value = self.items[id.index()].value;
            if last.is_some_and(|l| value < l) {
                return false;
            }
            last = Some(value);
        }
        true
    }

    /// Walk the list checking links, back-references and length.
    pub fn check_integrity(&self, list: ListId) -> Result<(), IntegrityError> {
        let mut prev = Link::End;
        let mut cur = self.lists[list.index()].end_next;
        let mut count = 0usize;

        while let Link::Item(id) = cur {
            if count >= ITEMS {
                return Err(IntegrityError::Broken);
            }
            let item = &self.items[id.index()];
            if item.prev != prev {
                return Err(IntegrityError::Broken);
            }
            if item.container != Some(list) {
                return Err(IntegrityError::WrongContainer);
            }
            count += 1;
            prev = cur;
            cur = item.next;
        }

        if self.lists[list.index()].end_prev != prev {
            return Err(IntegrityError::Broken);
        }
        if count != self.lists[list.index()].len {
            return Err(IntegrityError::Miscounted);
        }
        Ok(())
    }

    fn link_after(&mut self, list: ListId, after: Link, item: ItemId) {
        let next = self.next(list, after);
        {
            let it = &mut self.items[item.index()];
            it.next = next;
            it.prev = after;
            it.container = Some(list);
        }
        self.set_prev(list, next, Link::Item(item));
        self.set_next(list, after, Link::Item(item));
        self.lists[list.index()].len += 1;
        self.verify(list);
    }

    fn next(&self, list: ListId, at: Link) -> Link {
        match at {
            Link::End => self.lists[list.index()].end_next,
            Link::Item(id) => self.items[id.index()].next,
        }
    }

    fn prev(&self, list: ListId, at: Link) -> Link {
        match at {
            Link::End => self.lists[list.index()].end_prev,
            Link::Item(id) => self.items[id.index()].prev,
        }
    }

    fn set_next(&mut self, list: ListId, at: Link, to: Link) {
        match at {
            Link::End => self.lists[list.index()].end_next = to,
            Link::Item(id) => self.items[id.index()].next = to,
        }
    }

    fn set_prev(&mut self, list: ListId, at: Link, to: Link) {
        match at {
            Link::End => self.lists[list.index()].end_prev = to,
            Link::Item(id) => self.items[id.index()].prev = to,
        }
    }

    #[cfg(feature = "list-integrity-check")]
    fn verify(&self, list: ListId) {
        debug_assert_eq!(self.check_integrity(list), Ok(()));
    }

    #[cfg(not(feature = "list-integrity-check"))]
    #[inline(always)]
    fn verify(&self, _list: ListId) {}
}

impl<O: Copy, const ITEMS: usize, const LISTS: usize> Default for ListArena<O, ITEMS, LISTS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward walk from the end marker.
pub struct Iter<'a, O, const ITEMS: usize, const LISTS: usize> {
    arena: &'a ListArena<O, ITEMS, LISTS>,
    list: ListId,
    cur: Link,
    remaining: usize,
}

impl<O: Copy, const ITEMS: usize, const LISTS: usize> Iterator for Iter<'_, O, ITEMS, LISTS> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        if self.remaining == 0 {
            return None;
        }
        self.cur = self.arena.next(self.list, self.cur);
        match self.cur {
            Link::Item(id) => {
                self.remaining -= 1;
                Some(id)
            }
            Link::End => None,
        }
    }
}
