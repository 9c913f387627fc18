//! Ascending range iteration.
//!
//! Leaves are not chained on disk, so a scan that runs off the end of one
//! leaf re-descends from the root using the last emitted key (plus one) as
//! the new lower bound, rather than following a sibling pointer.

use crate::error::Result;
use crate::store::PageStore;
use crate::tree::BTree;
use crate::types::PageId;

/// Iterator over `(key, data)` pairs with keys in `[lower, upper]`, either
/// bound optional, produced by [`BTree::range`].
pub struct RangeIter<'a, S: PageStore> {
    tree: &'a mut BTree<S>,
    lower: Option<u64>,
    upper: Option<u64>,
    current_leaf: Option<(PageId, usize)>,
    next_key: Option<u64>,
    started: bool,
    done: bool,
}

impl<'a, S: PageStore> RangeIter<'a, S> {
    pub(crate) fn new(tree: &'a mut BTree<S>, lower: Option<u64>, upper: Option<u64>) -> Self {
        Self { tree, lower, upper, current_leaf: None, next_key: None, started: false, done: false }
    }

    fn seek_key(&self) -> u64 {
        self.next_key.or(self.lower).unwrap_or(0)
    }
}

impl<'a, S: PageStore> Iterator for RangeIter<'a, S> {
    type Item = Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Some((leaf_id, idx)) = self.current_leaf {
                match self.tree.leaf_entry_at(leaf_id, idx) {
                    Ok(Some((k, data))) => {
                        if let Some(u) = self.upper {
                            if k > u {
                                self.done = true;
                                return None;
                            }
                        }
                        self.current_leaf = Some((leaf_id, idx + 1));
                        self.next_key = k.checked_add(1);
                        self.started = true;
                        return Some(Ok((k, data)));
                    }
                    Ok(None) => {
                        self.current_leaf = None;
                        if self.started && self.next_key.is_none() {
                            self.done = true;
                            return None;
                        }
                        continue;
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }

            let seek = self.seek_key();
            match self.tree.descend_to_leaf_ge(seek) {
                Ok(Some((leaf_id, pos))) => {
                    self.current_leaf = Some((leaf_id, pos));
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::MemPageStore;
    use crate::tree::BTree;
    use crate::types::Config;

    fn open() -> BTree<MemPageStore> {
        let cfg = Config::new(512, 4, 16, 4, 12);
        BTree::open(MemPageStore::new(), cfg).unwrap()
    }

    #[test]
    fn test_range_over_empty_tree() {
        let mut tree = open();
        let out: Vec<_> = tree.range(None, None).collect::<Result<Vec<_>, _>>().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_range_covers_insertion_order_independent_of_insert_order() {
        let mut tree = open();
        for k in (0..300u64).rev() {
            tree.put(k, &vec![(k % 250) as u8; 12]).unwrap();
        }

        let out: Vec<(u64, Vec<u8>)> = tree.range(Some(40), Some(299)).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(out.len(), 260);
        assert_eq!(out.first().unwrap().0, 40);
        assert_eq!(out.last().unwrap().0, 299);
        for w in out.windows(2) {
            assert!(w[0].0 < w[1].0);
        }
    }

    #[test]
    fn test_range_with_no_upper_bound_runs_to_the_end() {
        let mut tree = open();
        for k in 0..50u64 {
            tree.put(k, &vec![k as u8; 12]).unwrap();
        }
        let out: Vec<_> = tree.range(Some(45), None).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(out.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![45, 46, 47, 48, 49]);
    }

    #[test]
    fn test_probe_past_the_end_returns_empty() {
        let mut tree = open();
        tree.put(10, &vec![1u8; 12]).unwrap();
        let out: Vec<_> = tree.range(Some(1_000_000), None).collect::<Result<Vec<_>, _>>().unwrap();
        assert!(out.is_empty());
    }
}
