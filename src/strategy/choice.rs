use alloc::boxed::Box;

use crate::{
    face::FaceToken,
    name::Name,
    strategy::{BestRoute, Strategy},
    tables::tree::NameTree,
};

/// Which strategy handles which part of the namespace.
///
/// The root prefix always has a strategy, so every name resolves to one.
pub struct StrategyChoice {
    tree: NameTree<Box<dyn Strategy>>,
}

impl Default for StrategyChoice {
    fn default() -> Self {
        Self::new(Box::new(BestRoute))
    }
}

impl StrategyChoice {
    pub fn new(default: Box<dyn Strategy>) -> Self {
        let mut tree = NameTree::new();
        tree.insert(&Name::new(), default);
        Self { tree }
    }

    // Binding the same prefix again replaces the previous strategy, which is returned
    pub fn bind(&mut self, prefix: &Name, strategy: Box<dyn Strategy>) -> Option<Box<dyn Strategy>> {
        tracing::debug!(prefix = %prefix, strategy = strategy.name(), "binding strategy");
        self.tree.insert(prefix, strategy)
    }

    // Replaces the default, more specific bindings stay in place
    pub fn bind_all(&mut self, strategy: Box<dyn Strategy>) -> Option<Box<dyn Strategy>> {
        self.bind(&Name::new(), strategy)
    }

    /// Removes the binding of exactly `prefix`.
    ///
    /// The root binding cannot be removed, only replaced with [`Self::bind_all`].
    pub fn unbind(&mut self, prefix: &Name) -> Option<Box<dyn Strategy>> {
        if prefix.is_empty() {
            return None;
        }
        self.tree.remove(prefix)
    }

    pub fn find_effective_mut(&mut self, name: &Name) -> Option<&mut dyn Strategy> {
        match self.tree.longest_prefix_match_mut(name) {
            Some((_, strategy)) => Some(strategy.as_mut()),
            None => None,
        }
    }

    pub fn effective_strategy_name(&self, name: &Name) -> Option<&str> {
        self.tree
            .longest_prefix_match(name)
            .map(|(_, strategy)| strategy.name())
    }

    /// The strategy bound to exactly `prefix`, if any.
    pub fn get(&self, prefix: &Name) -> Option<&dyn Strategy> {
        self.tree.get(prefix).map(|strategy| strategy.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub(crate) fn face_removed(&mut self, face: FaceToken) {
        self.tree
            .for_each_mut(&mut |strategy: &mut Box<dyn Strategy>| strategy.on_face_removed(face));
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, vec::Vec};
    use core::cell::RefCell;

    use super::*;
    use crate::strategy::{
        Broadcast, DropAll, Propagated, Propagation, BEST_ROUTE, BROADCAST, DROP,
    };

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_longest_prefix_binding() {
        let mut choice = StrategyChoice::default();
        assert_eq!(choice.effective_strategy_name(&name("/a/b")), Some(BEST_ROUTE));

        assert!(choice.bind(&name("/a"), Box::new(Broadcast)).is_none());
        choice.bind(&name("/a/b/c"), Box::new(DropAll));
        assert_eq!(choice.len(), 3);

        assert_eq!(choice.effective_strategy_name(&name("/a/b")), Some(BROADCAST));
        assert_eq!(choice.effective_strategy_name(&name("/a/b/c/d")), Some(DROP));
        assert_eq!(choice.effective_strategy_name(&name("/z")), Some(BEST_ROUTE));

        // Rebinding the exact prefix overrides it
        let previous = choice.bind(&name("/a"), Box::new(DropAll)).unwrap();
        assert_eq!(previous.name(), BROADCAST);
        assert_eq!(choice.effective_strategy_name(&name("/a")), Some(DROP));

        assert_eq!(choice.unbind(&name("/a")).unwrap().name(), DROP);
        assert_eq!(choice.effective_strategy_name(&name("/a/b")), Some(BEST_ROUTE));
        assert!(choice.get(&name("/a/b/c")).is_some());
    }

    #[test]
    fn test_root_is_replaced_not_removed() {
        let mut choice = StrategyChoice::default();
        choice.bind(&name("/a"), Box::new(DropAll));

        assert!(choice.unbind(&Name::new()).is_none());
        assert_eq!(choice.bind_all(Box::new(Broadcast)).unwrap().name(), BEST_ROUTE);
        assert_eq!(choice.effective_strategy_name(&name("/z")), Some(BROADCAST));
        assert_eq!(choice.effective_strategy_name(&name("/a/x")), Some(DROP));
        assert!(choice.find_effective_mut(&name("/q")).is_some());
    }

    struct Forgetful {
        removed: Rc<RefCell<Vec<FaceToken>>>,
    }

    impl Strategy for Forgetful {
        fn name(&self) -> &str {
            "/test/forgetful"
        }

        fn after_receive_interest(&mut self, _ctx: &mut Propagation<'_>) -> Propagated {
            Propagated::Exhausted
        }

        fn on_face_removed(&mut self, face: FaceToken) {
            self.removed.borrow_mut().push(face);
        }
    }

    #[test]
    fn test_face_removal_reaches_every_strategy() {
        let removed = Rc::new(RefCell::new(Vec::new()));
        let mut choice = StrategyChoice::new(Box::new(Forgetful {
            removed: removed.clone(),
        }));
        choice.bind(
            &name("/a"),
            Box::new(Forgetful {
                removed: removed.clone(),
            }),
        );

        choice.face_removed(FaceToken(4));
        assert_eq!(*removed.borrow(), [FaceToken(4), FaceToken(4)]);
    }
}
