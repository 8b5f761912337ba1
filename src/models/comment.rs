//! Article comment reply trees
//!
//! Comments are stored flat with an optional `parent_id`. `CommentTree`
//! builds an adjacency index over one article's comments so that a whole
//! thread can be removed children-first without recursion.

use std::collections::{HashMap, HashSet, VecDeque};

/// The part of a comment row needed to rebuild reply threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentLink {
    pub id: i64,
    pub parent_id: Option<i64>,
}

/// Adjacency index over a set of comments
#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    ids: Vec<i64>,
    roots: Vec<i64>,
    children: HashMap<i64, Vec<i64>>,
}

impl CommentTree {
    /// Build the index. A comment whose parent is absent from `links` is
    /// treated as a root.
    pub fn build(links: &[CommentLink]) -> Self {
        let known: HashSet<i64> = links.iter().map(|l| l.id).collect();
        let mut tree = CommentTree {
            ids: links.iter().map(|l| l.id).collect(),
            ..Default::default()
        };

        for link in links {
            match link.parent_id {
                Some(parent) if known.contains(&parent) && parent != link.id => {
                    tree.children.entry(parent).or_default().push(link.id);
                }
                _ => tree.roots.push(link.id),
            }
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `root` and every reply below it, breadth-first.
    pub fn subtree(&self, root: i64) -> Vec<i64> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(kids) = self.children.get(&id) {
                queue.extend(kids.iter().copied());
            }
        }
        out
    }

    /// Batches of ids to delete in order: the deepest replies first, roots
    /// last. Rows caught in a parent cycle cannot be reached from a root and
    /// are returned together as the final batch.
    pub fn deletion_order(&self) -> Vec<Vec<i64>> {
        let mut levels: Vec<Vec<i64>> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut frontier: Vec<i64> = self.roots.clone();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            let mut level = Vec::new();
            for id in frontier {
                if !seen.insert(id) {
                    continue;
                }
                level.push(id);
                if let Some(kids) = self.children.get(&id) {
                    next.extend(kids.iter().copied());
                }
            }
            if !level.is_empty() {
                levels.push(level);
            }
            frontier = next;
        }
        levels.reverse();

        let stranded = self.stranded();
        if !stranded.is_empty() {
            levels.push(stranded);
        }
        levels
    }

    /// Comments that no root reaches, i.e. members of a parent cycle and
    /// their replies. Their parent links must be cleared before deletion.
    pub fn stranded(&self) -> Vec<i64> {
        let mut reached = HashSet::new();
        for root in &self.roots {
            reached.extend(self.subtree(*root));
        }
        self.ids
            .iter()
            .copied()
            .filter(|id| !reached.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn link(id: i64, parent_id: Option<i64>) -> CommentLink {
        CommentLink { id, parent_id }
    }

    #[test]
    fn test_deletion_order_children_first() {
        let tree = CommentTree::build(&[
            link(1, None),
            link(2, Some(1)),
            link(3, Some(2)),
            link(4, Some(1)),
            link(5, None),
        ]);

        let order = tree.deletion_order();
        assert_eq!(order, vec![vec![3], vec![2, 4], vec![1, 5]]);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_subtree_is_breadth_first() {
        let tree = CommentTree::build(&[
            link(1, None),
            link(2, Some(1)),
            link(3, Some(1)),
            link(4, Some(2)),
            link(9, None),
        ]);
        assert_eq!(tree.subtree(1), vec![1, 2, 3, 4]);
        assert_eq!(tree.subtree(9), vec![9]);
    }

    #[test]
    fn test_cycle_goes_to_final_batch() {
        let tree = CommentTree::build(&[link(1, None), link(2, Some(3)), link(3, Some(2))]);
        let order = tree.deletion_order();
        assert_eq!(order.first(), Some(&vec![1]));
        let mut last = order.last().cloned().unwrap();
        last.sort();
        assert_eq!(last, vec![2, 3]);

        let mut stranded = tree.stranded();
        stranded.sort();
        assert_eq!(stranded, vec![2, 3]);
    }

    #[test]
    fn test_empty_tree() {
        let tree = CommentTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.deletion_order().is_empty());
    }

    /// Random forests: each comment replies to an earlier one or starts a thread.
    fn forest_strategy() -> impl Strategy<Value = Vec<CommentLink>> {
        prop::collection::vec(prop::option::of(any::<prop::sample::Index>()), 0..60).prop_map(
            |parents| {
                parents
                    .into_iter()
                    .enumerate()
                    .map(|(i, parent)| {
                        let id = i as i64 + 1;
                        let parent_id = match parent {
                            Some(idx) if i > 0 => Some(idx.index(i) as i64 + 1),
                            _ => None,
                        };
                        link(id, parent_id)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn every_reply_is_deleted_before_its_parent(links in forest_strategy()) {
            let tree = CommentTree::build(&links);
            let order = tree.deletion_order();

            let mut position = HashMap::new();
            for (batch, ids) in order.iter().enumerate() {
                for id in ids {
                    prop_assert!(position.insert(*id, batch).is_none(), "id {} listed twice", id);
                }
            }
            prop_assert_eq!(position.len(), links.len());

            for l in &links {
                if let Some(parent) = l.parent_id {
                    prop_assert!(position[&l.id] < position[&parent]);
                }
            }
        }
    }
}
