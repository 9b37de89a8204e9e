use alloc::vec::Vec;

use crate::name::{Name, NameComponent};

// A trie over name components. Each node may carry a value; children are kept
//  sorted by component so lookups are binary searches. Nodes that end up with
//  neither a value nor children are pruned on removal.
pub struct NameTree<V> {
    value: Option<V>,
    children: Vec<(NameComponent, NameTree<V>)>,
}

impl<V> Default for NameTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> NameTree<V> {
    pub fn new() -> Self {
        Self {
            value: None,
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.value.is_some() as usize + self.children.iter().map(|c| c.1.len()).sum::<usize>()
    }

    pub fn insert(&mut self, name: &Name, value: V) -> Option<V> {
        self.get_or_insert_node(name).value.replace(value)
    }

    pub fn get_or_insert_with<F>(&mut self, name: &Name, f: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        self.get_or_insert_node(name).value.get_or_insert_with(f)
    }

    pub fn get(&self, name: &Name) -> Option<&V> {
        let mut node = self;
        for component in name.components() {
            node = node.child(component)?;
        }
        node.value.as_ref()
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut V> {
        let mut node = self;
        for component in name.components() {
            node = node.child_mut(component)?;
        }
        node.value.as_mut()
    }

    pub fn remove(&mut self, name: &Name) -> Option<V> {
        self.remove_components(&mut name.components())
    }

    /// The value attached to the longest prefix of `name` that has one,
    ///  together with the length of that prefix.
    pub fn longest_prefix_match(&self, name: &Name) -> Option<(usize, &V)> {
        let mut node = self;
        let mut best = node.value.as_ref().map(|v| (0, v));
        for (depth, component) in name.components().enumerate() {
            match node.child(component) {
                Some(child) => node = child,
                None => break,
            }
            if let Some(v) = node.value.as_ref() {
                best = Some((depth + 1, v));
            }
        }
        best
    }

    pub fn longest_prefix_match_mut(&mut self, name: &Name) -> Option<(usize, &mut V)> {
        // Find the depth first, then walk again mutably to it
        let (depth, _) = self.longest_prefix_match(name)?;
        let mut node = self;
        for component in name.components().take(depth) {
            node = node.child_mut(component)?;
        }
        node.value.as_mut().map(|v| (depth, v))
    }

    pub fn for_each_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut V),
    {
        if let Some(v) = self.value.as_mut() {
            f(v);
        }
        for (_, child) in self.children.iter_mut() {
            child.for_each_mut(f);
        }
    }

    // Keeps only the values for which `f` returns true, pruning emptied nodes
    pub fn retain_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut V) -> bool,
    {
        if let Some(v) = self.value.as_mut() {
            if !f(v) {
                self.value = None;
            }
        }
        for (_, child) in self.children.iter_mut() {
            child.retain_mut(f);
        }
        self.children.retain(|c| !c.1.is_empty());
    }

    fn child(&self, component: &NameComponent) -> Option<&NameTree<V>> {
        match self.children.binary_search_by(|x| x.0.cmp(component)) {
            Ok(idx) => Some(&self.children[idx].1),
            Err(_) => None,
        }
    }

    fn child_mut(&mut self, component: &NameComponent) -> Option<&mut NameTree<V>> {
        match self.children.binary_search_by(|x| x.0.cmp(component)) {
            Ok(idx) => Some(&mut self.children[idx].1),
            Err(_) => None,
        }
    }

    fn get_or_insert_node(&mut self, name: &Name) -> &mut NameTree<V> {
        let mut node = self;
        for component in name.components() {
            let idx = match node.children.binary_search_by(|x| x.0.cmp(component)) {
                Ok(idx) => idx,
                Err(idx) => {
                    node.children
                        .insert(idx, (component.clone(), NameTree::new()));
                    idx
                }
            };
            node = &mut node.children[idx].1;
        }
        node
    }

    fn remove_components<'a, I>(&mut self, remaining_components: &mut I) -> Option<V>
    where
        I: Iterator<Item = &'a NameComponent>,
    {
        if let Some(component) = remaining_components.next() {
            // There are more components, so we need to go to children
            let idx = self
                .children
                .binary_search_by(|x| x.0.cmp(component))
                .ok()?;
            let removed = self.children[idx].1.remove_components(remaining_components);
            // Clean up child if its empty
            if self.children[idx].1.is_empty() {
                self.children.remove(idx);
            }
            removed
        } else {
            self.value.take()
        }
    }
}
