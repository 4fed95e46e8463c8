//! Prefix tree over the full-text vocabulary

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    terminal: bool,
}

/// Set of words supporting prefix enumeration in lexical order.
#[derive(Debug, Default, Clone)]
pub struct Trie {
    root: TrieNode,
    len: usize,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str) {
        let mut node = &mut self.root;
        for c in word.chars() {
            node = node.children.entry(c).or_default();
        }
        if !node.terminal {
            node.terminal = true;
            self.len += 1;
        }
    }

    /// Removes a word, pruning branches that no longer lead anywhere
    pub fn remove(&mut self, word: &str) -> bool {
        let chars: Vec<char> = word.chars().collect();
        let removed = Self::remove_at(&mut self.root, &chars);
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn remove_at(node: &mut TrieNode, rest: &[char]) -> bool {
        let Some((first, tail)) = rest.split_first() else {
            let was = node.terminal;
            node.terminal = false;
            return was;
        };
        let Some(child) = node.children.get_mut(first) else {
            return false;
        };
        let removed = Self::remove_at(child, tail);
        if removed && !child.terminal && child.children.is_empty() {
            node.children.remove(first);
        }
        removed
    }

    fn find(&self, prefix: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for c in prefix.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }

    /// Every word starting with `prefix`, in lexical order
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(node) = self.find(prefix) {
            let mut buf = prefix.to_string();
            Self::collect(node, &mut buf, &mut out);
        }
        out
    }

    fn collect(node: &TrieNode, buf: &mut String, out: &mut Vec<String>) {
        if node.terminal {
            out.push(buf.clone());
        }
        for (c, child) in &node.children {
            buf.push(*c);
            Self::collect(child, buf, out);
            buf.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_enumeration() {
        let mut trie = Trie::new();
        for w in ["villa", "village", "view", "pool"] {
            trie.insert(w);
        }
        trie.insert("villa");

        assert_eq!(trie.len(), 4);
        assert_eq!(trie.with_prefix("vil"), vec!["villa", "village"]);
        assert_eq!(trie.with_prefix("x"), Vec::<String>::new());
        assert_eq!(trie.with_prefix("view"), vec!["view"]);
        assert_eq!(trie.with_prefix("vi").first().map(String::as_str), Some("view"));
    }

    #[test]
    fn test_remove_prunes() {
        let mut trie = Trie::new();
        trie.insert("villa");
        trie.insert("village");

        assert!(trie.remove("village"));
        assert!(!trie.remove("village"));
        assert_eq!(trie.with_prefix("vil"), vec!["villa"]);
        assert!(trie.remove("villa"));
        assert!(trie.is_empty());
        assert!(trie.with_prefix("v").is_empty());
    }
}
