//! The B-tree engine: descent, point lookup, and insert with split
//! propagation along a bounded active path.
//!
//! Leaves are always copy-on-write — every `put` that touches a leaf writes
//! a brand-new physical page for it, even a plain value overwrite. Interior
//! nodes are patched in place with a single positioned write when a child
//! below them changed id but nothing below them split; they are only
//! rewritten (or themselves split) when a split actually needs to be woven
//! into their key/child arrays. This mirrors the original engine's
//! distinction between `writeBytes` (cheap, in place) and `writePage` /
//! `overWritePage` (a new or fully rewritten page).

use crate::buffer::BufferPool;
use crate::error::{Result, StorageError};
use crate::node::NodeLayout;
use crate::store::PageStore;
use crate::types::{Config, PageId, MAX_ACTIVE_PATH, FLAG_LEAF, FLAG_ROOT};

/// Bounded stack of interior page ids visited on the way down to a leaf.
#[derive(Debug)]
struct ActivePath {
    ids: [PageId; MAX_ACTIVE_PATH],
    len: usize,
}

impl ActivePath {
    fn new() -> Self {
        Self { ids: [PageId::NONE; MAX_ACTIVE_PATH], len: 0 }
    }

    fn push(&mut self, id: PageId) -> Result<()> {
        if self.len >= MAX_ACTIVE_PATH {
            return Err(StorageError::NoSpace("active path exhausted".into()));
        }
        self.ids[self.len] = id;
        self.len += 1;
        Ok(())
    }

    fn as_slice(&self) -> &[PageId] {
        &self.ids[..self.len]
    }
}

/// An open B-tree: a buffer pool plus the geometry needed to interpret the
/// pages it hands back.
pub struct BTree<S: PageStore> {
    pool: BufferPool<S>,
    layout: NodeLayout,
    config: Config,
    root: PageId,
    height: usize,
}

impl<S: PageStore> BTree<S> {
    /// Recover (or create) a tree over `store`.
    pub fn open(store: S, config: Config) -> Result<Self> {
        let (mut pool, root) = BufferPool::recover(store, &config)?;
        let layout = NodeLayout::from_config(&config);
        let height = Self::measure_height(&mut pool, &layout, root)?;
        Ok(Self { pool, layout, config, root, height })
    }

    /// Count the number of levels from `root` down to (and including) a
    /// leaf, by descending along the leftmost child at each level.
    fn measure_height(pool: &mut BufferPool<S>, layout: &NodeLayout, root: PageId) -> Result<usize> {
        let mut current = root;
        let mut height = 1;
        loop {
            let idx = pool.read_page(current, root)?;
            let buf = pool.frame(idx);
            if layout.is_leaf(buf) {
                return Ok(height);
            }
            let count = layout.count(buf);
            current = layout.interior_child(buf, count, 0);
            height += 1;
        }
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stats(&self) -> crate::buffer::Stats {
        self.pool.stats()
    }

    pub fn close(self) -> Result<()> {
        self.pool.close()
    }

    /// Reclaim the backing store without flushing through [`BTree::close`].
    pub fn into_store(self) -> S {
        self.pool.into_store()
    }

    /// Look up `key`, returning its data if present.
    pub fn get(&mut self, key: u64) -> Result<Option<Vec<u8>>> {
        let mut current = self.root;
        loop {
            let idx = self.pool.read_page(current, self.root)?;
            let buf = self.pool.frame(idx);
            if self.layout.is_leaf(buf) {
                let count = self.layout.count(buf);
                return match self.layout.leaf_search(buf, count, key) {
                    Ok(pos) => Ok(Some(self.layout.leaf_data(buf, pos).to_vec())),
                    Err(_) => Ok(None),
                };
            }
            let count = self.layout.count(buf);
            let child = self.layout.find_child_index(buf, count, key);
            current = self.layout.interior_child(buf, count, child);
        }
    }

    /// Insert or overwrite `key` with `data` (`data.len()` must equal the
    /// configured `data_size`).
    pub fn put(&mut self, key: u64, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), self.config.data_size, "data length must equal the configured data_size");

        let old_root_id = self.root;
        let root_idx = self.pool.read_page(old_root_id, self.root)?;
        let old_root_flags = self.layout.flags(self.pool.frame(root_idx));

        let mut path = ActivePath::new();
        let mut current = old_root_id;
        loop {
            let idx = self.pool.read_page(current, self.root)?;
            let buf = self.pool.frame(idx);
            if self.layout.is_leaf(buf) {
                break;
            }
            let count = self.layout.count(buf);
            let child_index = self.layout.find_child_index(buf, count, key);
            let next = self.layout.interior_child(buf, count, child_index);
            path.push(current)?;
            current = next;
        }
        let leaf_id = current;

        let (new_leaf_id, mut pending) = self.put_into_leaf(leaf_id, key, data)?;
        let mut incoming_child_id = new_leaf_id;
        let mut stopped_early = false;

        for &page_id in path.as_slice().iter().rev() {
            // Staged into the scratch frame rather than the general pool:
            // this copy is read once to build the patched/rebuilt version
            // and then discarded, so it has no business evicting something
            // still useful in the cache.
            self.pool.read_page_into(page_id, 0)?;
            let buf = self.pool.frame(0).to_vec();
            let count = self.layout.count(&buf);
            let child_index = self.layout.find_child_index(&buf, count, key);

            match pending.take() {
                Some((sep, right_id)) => {
                    let mut keys: Vec<u64> = (0..count).map(|i| self.layout.interior_key(&buf, i)).collect();
                    let mut children: Vec<PageId> = (0..count + 1).map(|i| self.layout.interior_child(&buf, count, i)).collect();
                    children[child_index] = incoming_child_id;
                    keys.insert(child_index, sep);
                    children.insert(child_index + 1, right_id);

                    if keys.len() <= self.layout.interior_capacity() {
                        let flags = self.layout.flags(&buf);
                        let mut new_buf = vec![0u8; self.config.page_size];
                        self.layout.init_page(&mut new_buf, page_id, flags);
                        self.layout.set_interior_entries(&mut new_buf, &keys, &children);
                        self.pool.overwrite_page(page_id, &new_buf)?;
                        stopped_early = true;
                        break;
                    } else {
                        let (left_id, right_id2, promoted) = self.split_interior(&keys, &children)?;
                        incoming_child_id = left_id;
                        pending = Some((promoted, right_id2));
                    }
                }
                None => {
                    let offset = self.layout.interior_child_byte_offset(count, child_index);
                    self.pool.write_bytes(page_id, offset, &incoming_child_id.value().to_be_bytes())?;
                    stopped_early = true;
                    break;
                }
            }
        }

        if !stopped_early {
            match pending {
                Some((sep, right_id)) => {
                    let mut new_root_buf = vec![0u8; self.config.page_size];
                    self.layout.init_page(&mut new_root_buf, PageId::new(0), FLAG_ROOT);
                    self.layout.set_interior_entries(&mut new_root_buf, &[sep], &[incoming_child_id, right_id]);
                    let new_root_id = self.pool.write_page(&mut new_root_buf)?;

                    let cleared = old_root_flags & !FLAG_ROOT;
                    self.pool.write_bytes(old_root_id, 4, &[cleared])?;

                    self.root = new_root_id;
                    self.height += 1;
                }
                None => {
                    self.root = incoming_child_id;
                }
            }
        }

        Ok(())
    }

    /// Copy-on-write a leaf with `key`/`data` merged in, splitting it if it
    /// has no room. Returns the leaf's new id and, on a split, the promoted
    /// separator and the new right sibling's id.
    fn put_into_leaf(&mut self, leaf_id: PageId, key: u64, data: &[u8]) -> Result<(PageId, Option<(u64, PageId)>)> {
        self.pool.read_page_into(leaf_id, 0)?;
        let leaf_buf = self.pool.frame(0).to_vec();
        let flags = self.layout.flags(&leaf_buf);
        let count = self.layout.count(&leaf_buf);

        match self.layout.leaf_search(&leaf_buf, count, key) {
            Ok(pos) => {
                let mut new_buf = leaf_buf;
                self.layout.set_leaf_record(&mut new_buf, pos, key, data);
                let new_id = self.pool.write_page(&mut new_buf)?;
                Ok((new_id, None))
            }
            Err(pos) => {
                if count < self.layout.leaf_capacity() {
                    let mut new_buf = leaf_buf;
                    let record_size = self.config.record_size;
                    let start = crate::node::HEADER_SIZE + pos * record_size;
                    let end = crate::node::HEADER_SIZE + count * record_size;
                    new_buf.copy_within(start..end, start + record_size);
                    self.layout.set_leaf_record(&mut new_buf, pos, key, data);
                    self.layout.set_count(&mut new_buf, count + 1);
                    let new_id = self.pool.write_page(&mut new_buf)?;
                    Ok((new_id, None))
                } else {
                    let mut entries: Vec<(u64, Vec<u8>)> = (0..count)
                        .map(|i| (self.layout.leaf_key(&leaf_buf, i), self.layout.leaf_data(&leaf_buf, i).to_vec()))
                        .collect();
                    entries.insert(pos, (key, data.to_vec()));

                    let mid = entries.len() / 2;
                    let (left, right) = entries.split_at(mid);

                    let mut left_buf = vec![0u8; self.config.page_size];
                    self.layout.init_page(&mut left_buf, PageId::new(0), flags & FLAG_LEAF);
                    for (i, (k, d)) in left.iter().enumerate() {
                        self.layout.set_leaf_record(&mut left_buf, i, *k, d);
                    }
                    self.layout.set_count(&mut left_buf, left.len());
                    let left_id = self.pool.write_page(&mut left_buf)?;

                    let mut right_buf = vec![0u8; self.config.page_size];
                    self.layout.init_page(&mut right_buf, PageId::new(0), flags & FLAG_LEAF);
                    for (i, (k, d)) in right.iter().enumerate() {
                        self.layout.set_leaf_record(&mut right_buf, i, *k, d);
                    }
                    self.layout.set_count(&mut right_buf, right.len());
                    let right_id = self.pool.write_page(&mut right_buf)?;

                    let separator = right[0].0;
                    Ok((left_id, Some((separator, right_id))))
                }
            }
        }
    }

    /// Split an overflowing interior key/child array into two fresh pages,
    /// promoting the median key.
    fn split_interior(&mut self, keys: &[u64], children: &[PageId]) -> Result<(PageId, PageId, u64)> {
        let mid = keys.len() / 2;
        let promoted = keys[mid];

        let mut left_buf = vec![0u8; self.config.page_size];
        self.layout.init_page(&mut left_buf, PageId::new(0), 0);
        self.layout.set_interior_entries(&mut left_buf, &keys[..mid], &children[..mid + 1]);
        let left_id = self.pool.write_page(&mut left_buf)?;

        let mut right_buf = vec![0u8; self.config.page_size];
        self.layout.init_page(&mut right_buf, PageId::new(0), 0);
        self.layout.set_interior_entries(&mut right_buf, &keys[mid + 1..], &children[mid + 1..]);
        let right_id = self.pool.write_page(&mut right_buf)?;

        Ok((left_id, right_id, promoted))
    }

    /// Descend to the leaf that would hold `key`, and return the position
    /// of the first record there with a key `>= key`, if any.
    pub(crate) fn descend_to_leaf_ge(&mut self, key: u64) -> Result<Option<(PageId, usize)>> {
        let mut current = self.root;
        loop {
            let idx = self.pool.read_page(current, self.root)?;
            let buf = self.pool.frame(idx);
            if self.layout.is_leaf(buf) {
                let count = self.layout.count(buf);
                let pos = match self.layout.leaf_search(buf, count, key) {
                    Ok(p) => p,
                    Err(p) => p,
                };
                return Ok(if pos < count { Some((current, pos)) } else { None });
            }
            let count = self.layout.count(buf);
            let child = self.layout.find_child_index(buf, count, key);
            current = self.layout.interior_child(buf, count, child);
        }
    }

    /// Fetch the record at `idx` within `leaf_id`, if it's still within
    /// bounds (the leaf may have been read earlier in a scan and since
    /// shrunk only in the sense that we never delete, so this really only
    /// ever reports "ran off the end").
    pub(crate) fn leaf_entry_at(&mut self, leaf_id: PageId, idx: usize) -> Result<Option<(u64, Vec<u8>)>> {
        let frame = self.pool.read_page(leaf_id, self.root)?;
        let buf = self.pool.frame(frame);
        let count = self.layout.count(buf);
        if idx >= count {
            return Ok(None);
        }
        Ok(Some((self.layout.leaf_key(buf, idx), self.layout.leaf_data(buf, idx).to_vec())))
    }

    /// Iterate over records with keys in `[lower, upper]` (either bound may
    /// be omitted), ascending.
    pub fn range(&mut self, lower: Option<u64>, upper: Option<u64>) -> crate::iter::RangeIter<'_, S> {
        crate::iter::RangeIter::new(self, lower, upper)
    }
}
