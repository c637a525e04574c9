use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe topic trie used to route bus events to listeners.
///
/// Topics and patterns are `/`-separated. Patterns may use:
/// - `+` for exactly one level (`sync/+/B12`)
/// - `#` for all remaining levels, last segment only (`sync/#`)
///
/// ```ignore
/// let trie = TopicTrie::new();
/// trie.insert("sync/layers/B12", 1);
/// trie.insert("sync/+/B12", 2);
/// trie.insert("sync/#", 3);
///
/// assert_eq!(trie.match_topic("sync/layers/B12").len(), 3);
/// ```
pub struct TopicTrie<T> {
    root: RwLock<Node<T>>,
}

struct Node<T> {
    children: HashMap<String, Node<T>>,
    /// `+` child.
    single: Option<Box<Node<T>>>,
    /// `#` child.
    multi: Option<Box<Node<T>>>,
    values: Vec<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            single: None,
            multi: None,
            values: Vec::new(),
        }
    }
}

impl<T: Clone> TopicTrie<T> {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Node::default()),
        }
    }

    /// Store a value under a pattern. Duplicate patterns accumulate values.
    pub fn insert(&self, pattern: &str, value: T) {
        let mut root = self.root.write().unwrap();
        let mut node = &mut *root;
        for segment in pattern.split('/') {
            node = match segment {
                "+" => node.single.get_or_insert_with(Default::default).as_mut(),
                "#" => node.multi.get_or_insert_with(Default::default).as_mut(),
                _ => node.children.entry(segment.to_string()).or_default(),
            };
        }
        node.values.push(value);
    }

    /// Collect every value whose pattern matches the concrete topic.
    ///
    /// Values are cloned out so callers can run them without holding the lock.
    pub fn match_topic(&self, topic: &str) -> Vec<T> {
        let root = self.root.read().unwrap();
        let segments: Vec<&str> = topic.split('/').collect();
        let mut out = Vec::new();
        root.collect(&segments, &mut out);
        out
    }

    /// Remove values stored under exactly `pattern` for which `predicate`
    /// returns true. Returns whether anything was removed.
    pub fn remove<F>(&self, pattern: &str, predicate: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        let mut root = self.root.write().unwrap();
        let segments: Vec<&str> = pattern.split('/').collect();
        root.remove(&segments, &predicate)
    }

    /// Drop every stored value.
    pub fn clear(&self) {
        *self.root.write().unwrap() = Node::default();
    }

    /// Total number of stored values across all patterns.
    pub fn len(&self) -> usize {
        self.root.read().unwrap().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for TopicTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Node<T> {
    fn collect(&self, segments: &[&str], out: &mut Vec<T>) {
        // `#` also matches zero remaining levels ("sync/#" matches "sync").
        if let Some(multi) = &self.multi {
            out.extend(multi.values.iter().cloned());
        }
        let Some((head, rest)) = segments.split_first() else {
            out.extend(self.values.iter().cloned());
            return;
        };
        if let Some(child) = self.children.get(*head) {
            child.collect(rest, out);
        }
        if let Some(single) = &self.single {
            single.collect(rest, out);
        }
    }

    fn remove<F: Fn(&T) -> bool>(&mut self, segments: &[&str], predicate: &F) -> bool {
        let Some((head, rest)) = segments.split_first() else {
            let before = self.values.len();
            self.values.retain(|v| !predicate(v));
            return self.values.len() != before;
        };
        let child = match *head {
            "+" => self.single.as_deref_mut(),
            "#" => self.multi.as_deref_mut(),
            _ => self.children.get_mut(*head),
        };
        child.is_some_and(|c| c.remove(rest, predicate))
    }

    fn count(&self) -> usize {
        self.values.len()
            + self.children.values().map(Node::count).sum::<usize>()
            + self.single.as_ref().map_or(0, |n| n.count())
            + self.multi.as_ref().map_or(0, |n| n.count())
    }
}
