//! Balanced 2-3 search tree keyed by terms.
//!
//! Every node holds one or two sorted keys and one payload list per key.
//! Internal nodes have exactly `keys + 1` children and all leaves sit at the
//! same depth. The tree only grows: a node that reaches three keys splits in
//! two and pushes its middle key into the parent, and a split of the root is
//! the only way the height increases.
//!
//! The same tree backs two indexes: the document tree (`V` = document id) and
//! the permuterm index (`V` = original term).

use std::fmt;

#[derive(Clone)]
struct Node<V> {
    keys: Vec<String>,
    payloads: Vec<Vec<V>>,
    children: Vec<Node<V>>,
}

/// Middle key pushed out of a split node, with the new right sibling.
struct Promotion<V> {
    key: String,
    payload: Vec<V>,
    right: Node<V>,
}

enum Insertion<V> {
    /// Key was already stored; payload merged into its list.
    Existing,
    /// New key placed without overflowing this node.
    Added,
    /// New key placed and this node split.
    Split(Promotion<V>),
}

impl<V> Node<V> {
    fn leaf(key: String, payload: V) -> Self {
        Self { keys: vec![key], payloads: vec![vec![payload]], children: Vec::new() }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `Ok(i)` if `key == keys[i]`, otherwise `Err(i)` where `i` is the child
    /// slot whose range holds `key`.
    fn locate(&self, key: &str) -> Result<usize, usize> {
        self.keys.binary_search_by(|k| k.as_str().cmp(key))
    }

    /// Splits an overflowing node: `self` keeps the smallest key (and the two
    /// leftmost children), the largest key moves to a new right node and the
    /// middle key is handed back for the parent.
    fn split(&mut self) -> Promotion<V> {
        debug_assert_eq!(self.keys.len(), 3);
        let right_children = if self.is_leaf() { Vec::new() } else { self.children.split_off(2) };
        let right = Node {
            keys: self.keys.split_off(2),
            payloads: self.payloads.split_off(2),
            children: right_children,
        };
        let key = self.keys.remove(1);
        let payload = self.payloads.remove(1);
        Promotion { key, payload, right }
    }

    /// Whether child `i` can hold a key starting with `prefix`.
    ///
    /// Keys with a common prefix form one contiguous run in sorted order, so a
    /// child is skipped when its upper bound is at or below `prefix` or its
    /// lower bound already sorts past the whole run.
    fn may_hold_prefix(&self, i: usize, prefix: &str) -> bool {
        if let Some(upper) = self.keys.get(i) {
            if upper.as_str() <= prefix {
                return false;
            }
        }
        if i > 0 {
            let lower = self.keys[i - 1].as_str();
            if lower > prefix && !lower.starts_with(prefix) {
                return false;
            }
        }
        true
    }

    fn scan<'a>(&'a self, prefix: &str, out: &mut PrefixScan<'a, V>) {
        out.nodes_visited += 1;
        for i in 0..=self.keys.len() {
            if let Some(child) = self.children.get(i) {
                if self.may_hold_prefix(i, prefix) {
                    child.scan(prefix, out);
                }
            }
            if let Some(key) = self.keys.get(i) {
                if key.starts_with(prefix) {
                    out.matches.push((key.as_str(), self.payloads[i].as_slice()));
                }
            }
        }
    }

    fn walk<'a>(&'a self, out: &mut Vec<(&'a str, &'a [V])>) {
        for i in 0..=self.keys.len() {
            if let Some(child) = self.children.get(i) {
                child.walk(out);
            }
            if let Some(key) = self.keys.get(i) {
                out.push((key.as_str(), self.payloads[i].as_slice()));
            }
        }
    }

    fn leaf_depths(&self, depth: usize, out: &mut Vec<usize>) {
        if self.is_leaf() {
            out.push(depth);
        }
        for child in &self.children {
            child.leaf_depths(depth + 1, out);
        }
    }
}

impl<V: PartialEq> Node<V> {
    fn insert(&mut self, key: String, payload: V) -> Insertion<V> {
        let slot = match self.locate(&key) {
            Ok(i) => {
                if !self.payloads[i].contains(&payload) {
                    self.payloads[i].push(payload);
                }
                return Insertion::Existing;
            }
            Err(slot) => slot,
        };

        if self.is_leaf() {
            self.keys.insert(slot, key);
            self.payloads.insert(slot, vec![payload]);
        } else {
            match self.children[slot].insert(key, payload) {
                Insertion::Split(p) => {
                    self.keys.insert(slot, p.key);
                    self.payloads.insert(slot, p.payload);
                    self.children.insert(slot + 1, p.right);
                }
                other => return other,
            }
        }

        if self.keys.len() == 3 {
            Insertion::Split(self.split())
        } else {
            Insertion::Added
        }
    }
}

/// Keys found by a prefix query, in ascending key order, and how many nodes
/// the search touched.
#[derive(Debug)]
pub struct PrefixScan<'a, V> {
    pub matches: Vec<(&'a str, &'a [V])>,
    pub nodes_visited: usize,
}

/// A 2-3 tree mapping each term to a deduplicated list of payloads.
#[derive(Clone)]
pub struct TermTree<V> {
    root: Option<Node<V>>,
    len: usize,
}

impl<V> Default for TermTree<V> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<V> TermTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads stored under `key`, empty if the key was never inserted.
    pub fn find(&self, key: &str) -> &[V] {
        self.find_traced(key).0
    }

    /// [`find`](Self::find) plus the number of nodes examined on the way down.
    pub fn find_traced(&self, key: &str) -> (&[V], usize) {
        let mut visited = 0;
        let mut node = match &self.root {
            Some(root) => root,
            None => return (&[], visited),
        };
        loop {
            visited += 1;
            match node.locate(key) {
                Ok(i) => return (&node.payloads[i], visited),
                Err(slot) => match node.children.get(slot) {
                    Some(child) => node = child,
                    None => return (&[], visited),
                },
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        !self.find(key).is_empty()
    }

    /// Every key starting with `prefix`, with its payloads.
    pub fn collect_by_prefix(&self, prefix: &str) -> Vec<(&str, &[V])> {
        self.prefix_scan(prefix).matches
    }

    pub fn prefix_scan(&self, prefix: &str) -> PrefixScan<'_, V> {
        let mut out = PrefixScan { matches: Vec::new(), nodes_visited: 0 };
        if let Some(root) = &self.root {
            root.scan(prefix, &mut out);
        }
        out
    }

    /// All entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[V])> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            root.walk(&mut out);
        }
        out.into_iter()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Levels from the root down to the leaves; 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root.as_ref();
        while let Some(n) = node {
            height += 1;
            node = n.children.first();
        }
        height
    }

    /// True when every leaf is at the same depth.
    pub fn is_balanced(&self) -> bool {
        let mut depths = Vec::new();
        if let Some(root) = &self.root {
            root.leaf_depths(1, &mut depths);
        }
        depths.windows(2).all(|w| w[0] == w[1])
    }
}

impl<V: PartialEq> TermTree<V> {
    /// Stores `payload` under `key`. An existing key gets the payload appended
    /// unless it is already listed; a root split replaces the root.
    pub fn insert(&mut self, key: impl Into<String>, payload: V) {
        let key = key.into();
        let Some(root) = self.root.as_mut() else {
            self.root = Some(Node::leaf(key, payload));
            self.len = 1;
            return;
        };

        match root.insert(key, payload) {
            Insertion::Existing => {}
            Insertion::Added => self.len += 1,
            Insertion::Split(p) => {
                self.len += 1;
                if let Some(left) = self.root.take() {
                    self.root = Some(Node {
                        keys: vec![p.key],
                        payloads: vec![p.payload],
                        children: vec![left, p.right],
                    });
                }
            }
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for TermTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
