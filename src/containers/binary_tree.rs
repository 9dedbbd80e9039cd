//! BinaryTree / AVLTree (spec.md §4.2).
//!
//! Nodes live in a flat `Vec` arena addressed by index rather than
//! `Rc<RefCell<Node>>` links, so rotations are plain index swaps and
//! traversals walk the arena with an explicit stack (spec.md §4.2:
//! "Traversals must be produced iteratively... to avoid deep recursion").

use crate::error::EngineError;
use crate::value::Binder;

struct Node {
    value: Binder,
    left: Option<usize>,
    right: Option<usize>,
    height: i32,
}

/// Comparator-based tree; `avl` selects whether `insert` rebalances.
#[derive(Default)]
pub struct TreeContainer {
    nodes: Vec<Node>,
    root: Option<usize>,
    avl: bool,
}

impl std::fmt::Debug for TreeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeContainer").field("avl", &self.avl).field("len", &self.nodes.len()).finish()
    }
}

fn height_of(nodes: &[Node], idx: Option<usize>) -> i32 {
    idx.map_or(0, |i| nodes[i].height)
}

fn balance_factor(nodes: &[Node], idx: usize) -> i32 {
    height_of(nodes, nodes[idx].left) - height_of(nodes, nodes[idx].right)
}

fn update_height(nodes: &mut [Node], idx: usize) {
    let h = 1 + height_of(nodes, nodes[idx].left).max(height_of(nodes, nodes[idx].right));
    nodes[idx].height = h;
}

impl TreeContainer {
    #[must_use]
    pub fn new(avl: bool) -> Self {
        Self { nodes: Vec::new(), root: None, avl }
    }

    fn cmp(a: &Binder, b: &Binder) -> Result<std::cmp::Ordering, EngineError> {
        a.partial_cmp_primitive(b).ok_or_else(|| EngineError::type_error("tree elements must be comparable primitives"))
    }

    pub fn insert(&mut self, value: Binder) -> Result<(), EngineError> {
        let Some(root) = self.root else {
            self.nodes.push(Node { value, left: None, right: None, height: 1 });
            self.root = Some(0);
            return Ok(());
        };
        self.root = Some(self.insert_at(root, value)?);
        Ok(())
    }

    fn insert_at(&mut self, idx: usize, value: Binder) -> Result<usize, EngineError> {
        let ord = Self::cmp(&value, &self.nodes[idx].value)?;
        if ord.is_lt() {
            match self.nodes[idx].left {
                Some(l) => {
                    let new_l = self.insert_at(l, value)?;
                    self.nodes[idx].left = Some(new_l);
                }
                None => {
                    self.nodes.push(Node { value, left: None, right: None, height: 1 });
                    self.nodes[idx].left = Some(self.nodes.len() - 1);
                }
            }
        } else {
            match self.nodes[idx].right {
                Some(r) => {
                    let new_r = self.insert_at(r, value)?;
                    self.nodes[idx].right = Some(new_r);
                }
                None => {
                    self.nodes.push(Node { value, left: None, right: None, height: 1 });
                    self.nodes[idx].right = Some(self.nodes.len() - 1);
                }
            }
        }
        update_height(&mut self.nodes, idx);
        if self.avl { Ok(self.rebalance(idx)) } else { Ok(idx) }
    }

    /// The four AVL rotation cases (spec.md §4.2).
    fn rebalance(&mut self, idx: usize) -> usize {
        let bf = balance_factor(&self.nodes, idx);
        if bf > 1 {
            let left = self.nodes[idx].left.unwrap();
            if balance_factor(&self.nodes, left) < 0 {
                let new_left = self.rotate_left(left);
                self.nodes[idx].left = Some(new_left);
            }
            return self.rotate_right(idx);
        }
        if bf < -1 {
            let right = self.nodes[idx].right.unwrap();
            if balance_factor(&self.nodes, right) > 0 {
                let new_right = self.rotate_right(right);
                self.nodes[idx].right = Some(new_right);
            }
            return self.rotate_left(idx);
        }
        idx
    }

    fn rotate_left(&mut self, idx: usize) -> usize {
        let pivot = self.nodes[idx].right.expect("rotate_left requires a right child");
        let moved = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(idx);
        self.nodes[idx].right = moved;
        update_height(&mut self.nodes, idx);
        update_height(&mut self.nodes, pivot);
        pivot
    }

    fn rotate_right(&mut self, idx: usize) -> usize {
        let pivot = self.nodes[idx].left.expect("rotate_right requires a left child");
        let moved = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(idx);
        self.nodes[idx].left = moved;
        update_height(&mut self.nodes, idx);
        update_height(&mut self.nodes, pivot);
        pivot
    }

    pub fn search(&self, value: &Binder) -> Result<bool, EngineError> {
        let mut cur = self.root;
        while let Some(idx) = cur {
            let ord = Self::cmp(value, &self.nodes[idx].value)?;
            match ord {
                std::cmp::Ordering::Equal => return Ok(true),
                std::cmp::Ordering::Less => cur = self.nodes[idx].left,
                std::cmp::Ordering::Greater => cur = self.nodes[idx].right,
            }
        }
        Ok(false)
    }

    #[must_use]
    pub fn get_height(&self) -> i32 {
        height_of(&self.nodes, self.root)
    }

    #[must_use]
    pub fn in_order(&self) -> Vec<Binder> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        let mut cur = self.root;
        while cur.is_some() || !stack.is_empty() {
            while let Some(idx) = cur {
                stack.push(idx);
                cur = self.nodes[idx].left;
            }
            let idx = stack.pop().unwrap();
            out.push(self.nodes[idx].value.clone());
            cur = self.nodes[idx].right;
        }
        out
    }

    #[must_use]
    pub fn pre_order(&self) -> Vec<Binder> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        if let Some(root) = self.root {
            stack.push(root);
        }
        while let Some(idx) = stack.pop() {
            out.push(self.nodes[idx].value.clone());
            if let Some(r) = self.nodes[idx].right {
                stack.push(r);
            }
            if let Some(l) = self.nodes[idx].left {
                stack.push(l);
            }
        }
        out
    }

    #[must_use]
    pub fn post_order(&self) -> Vec<Binder> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, false));
        }
        while let Some((idx, visited)) = stack.pop() {
            if visited {
                out.push(self.nodes[idx].value.clone());
                continue;
            }
            stack.push((idx, true));
            if let Some(l) = self.nodes[idx].left {
                stack.push((l, false));
            }
            if let Some(r) = self.nodes[idx].right {
                stack.push((r, false));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_tree_in_order_is_sorted() {
        let mut t = TreeContainer::new(false);
        for v in [5, 3, 8, 1, 4, 7, 9] {
            t.insert(Binder::int(v)).unwrap();
        }
        let values: Vec<i64> = t.in_order().into_iter().map(|b| match b.value {
            crate::value::Value::Int(i) => i,
            _ => unreachable!(),
        }).collect();
        assert_eq!(values, vec![1, 3, 4, 5, 7, 8, 9]);
    }

    #[test]
    fn avl_tree_stays_balanced_on_sorted_insert() {
        let mut t = TreeContainer::new(true);
        for v in 1..=15 {
            t.insert(Binder::int(v)).unwrap();
        }
        // A balanced 15-node AVL tree has height 4 (not the 15 a plain BST would have).
        assert_eq!(t.get_height(), 4);
        assert!(t.search(&Binder::int(7)).unwrap());
        assert!(!t.search(&Binder::int(42)).unwrap());
    }
}
