//! Index-linked LRU map
//!
//! An owned doubly-linked list of keys stored in a slot vector, plus a
//! `HashMap` from key to slot index. Both halves are only mutated together
//! through `LruMap`, so every map entry always points at a live, unique
//! list slot. The front of the list is the least recently touched key.

use std::collections::HashMap;

const NIL: usize = usize::MAX;

struct Node {
    key: String,
    prev: usize,
    next: usize,
}

/// Doubly-linked list over a slot vector
struct LinkedSlots {
    slots: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LinkedSlots {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Append at the most recently used end
    fn push_back(&mut self, key: String) -> usize {
        let node = Node {
            key,
            prev: self.tail,
            next: NIL,
        };
        let idx = if let Some(idx) = self.free.pop() {
            self.slots[idx] = node;
            idx
        } else {
            self.slots.push(node);
            self.slots.len() - 1
        };

        if self.tail == NIL {
            self.head = idx;
        } else {
            self.slots[self.tail].next = idx;
        }
        self.tail = idx;
        idx
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    /// Detach a slot and return its key
    fn remove(&mut self, idx: usize) -> String {
        self.unlink(idx);
        self.free.push(idx);
        std::mem::take(&mut self.slots[idx].key)
    }

    fn move_to_back(&mut self, idx: usize) {
        if self.tail == idx {
            return;
        }
        self.unlink(idx);
        let old_tail = self.tail;
        self.slots[idx].prev = old_tail;
        if old_tail == NIL {
            self.head = idx;
        } else {
            self.slots[old_tail].next = idx;
        }
        self.tail = idx;
    }

    fn front(&self) -> Option<usize> {
        (self.head != NIL).then_some(self.head)
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

struct Slot<V> {
    pos: usize,
    value: V,
}

/// Bounded-by-caller LRU map keyed by string
pub(crate) struct LruMap<V> {
    map: HashMap<String, Slot<V>>,
    order: LinkedSlots,
}

impl<V> LruMap<V> {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: LinkedSlots::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key).map(|slot| &slot.value)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.map.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Insert or replace, moving the key to the most recently used end
    pub(crate) fn insert(&mut self, key: &str, value: V) {
        if let Some(slot) = self.map.get_mut(key) {
            slot.value = value;
            self.order.move_to_back(slot.pos);
            return;
        }
        let pos = self.order.push_back(key.to_string());
        self.map.insert(key.to_string(), Slot { pos, value });
    }

    /// Move a key to the most recently used end
    pub(crate) fn touch(&mut self, key: &str) -> bool {
        match self.map.get(key) {
            Some(slot) => {
                self.order.move_to_back(slot.pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<V> {
        let slot = self.map.remove(key)?;
        self.order.remove(slot.pos);
        Some(slot.value)
    }

    /// Evict least recently used keys until `len() <= max`. Stops early
    /// rather than evicting `protect`. Returns the number evicted.
    pub(crate) fn evict_over(&mut self, max: usize, protect: &str) -> usize {
        let mut evicted = 0;
        while self.map.len() > max {
            let Some(idx) = self.order.front() else {
                break;
            };
            if self.order.slots[idx].key == protect {
                break;
            }
            let key = self.order.remove(idx);
            self.map.remove(&key);
            evicted += 1;
        }
        evicted
    }

    /// Entries from least to most recently used
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        let mut cursor = self.order.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let node = &self.order.slots[cursor];
            cursor = node.next;
            self.map
                .get(&node.key)
                .map(|slot| (node.key.as_str(), &slot.value))
        })
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(lru: &LruMap<V>) -> Vec<String> {
        lru.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_insert_orders_by_recency() {
        let mut lru = LruMap::new();
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.insert("c", 3);
        assert_eq!(keys(&lru), vec!["a", "b", "c"]);

        lru.touch("a");
        assert_eq!(keys(&lru), vec!["b", "c", "a"]);

        lru.insert("b", 20);
        assert_eq!(keys(&lru), vec!["c", "a", "b"]);
        assert_eq!(lru.get("b"), Some(&20));
        assert_eq!(lru.len(), 3);
    }

    #[test]
    fn test_remove_reuses_slots() {
        let mut lru = LruMap::new();
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.remove("a"), Some(1));
        assert_eq!(lru.remove("a"), None);

        lru.insert("c", 3);
        assert_eq!(lru.order.slots.len(), 2);
        assert_eq!(keys(&lru), vec!["b", "c"]);
    }

    #[test]
    fn test_evict_over_drops_oldest() {
        let mut lru = LruMap::new();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            lru.insert(key, i);
        }
        assert_eq!(lru.evict_over(2, "d"), 2);
        assert_eq!(keys(&lru), vec!["c", "d"]);
        assert!(!lru.contains("a"));
    }

    #[test]
    fn test_evict_over_protects_key() {
        let mut lru = LruMap::new();
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.insert("c", 3);

        // The oldest key is the one being touched: nothing goes
        assert_eq!(lru.evict_over(1, "a"), 0);
        assert_eq!(lru.len(), 3);
    }

    #[test]
    fn test_single_element_and_clear() {
        let mut lru = LruMap::new();
        lru.insert("only", ());
        lru.touch("only");
        assert_eq!(keys(&lru), vec!["only"]);
        lru.remove("only");
        assert_eq!(lru.len(), 0);
        assert!(lru.iter().next().is_none());

        lru.insert("x", ());
        lru.insert("y", ());
        lru.clear();
        assert_eq!(lru.len(), 0);
        lru.insert("z", ());
        assert_eq!(keys(&lru), vec!["z"]);
    }

    #[test]
    fn test_get_mut() {
        let mut lru = LruMap::new();
        lru.insert("a", 1);
        *lru.get_mut("a").unwrap() += 5;
        assert_eq!(lru.get("a"), Some(&6));
        assert!(lru.get_mut("missing").is_none());
    }
}
