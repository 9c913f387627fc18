//! # Microbtree Storage
//!
//! An embedded, disk-backed B-tree index sized for small, memory-constrained
//! devices: fixed-size pages, fixed-width unsigned-integer keys, a tiny
//! explicitly-managed buffer pool, and no background threads.
//!
//! ## Architecture
//!
//! - **`node`** — fixed on-page layout for leaf records and interior
//!   key/child arrays.
//! - **`store`** — positioned block reads/writes against a file.
//! - **`buffer`** — the fixed-frame page cache sitting in front of the
//!   store, and crash recovery by backward scan.
//! - **`tree`** — the B-tree engine: descent, point lookup, insert with
//!   split propagation along a bounded active path.
//! - **`iter`** — ascending range iteration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use microbtree_storage::{Db, Config};
//!
//! let config = Config::new(512, 4, 16, 4, 12);
//! let mut db = Db::open("my_database.db", config)?;
//!
//! db.put(42, b"hello world!".as_slice())?;
//! assert_eq!(db.get(42)?, Some(b"hello world!".to_vec()));
//!
//! for entry in db.range(Some(0), Some(100)) {
//!     let (key, data) = entry?;
//!     println!("{key} -> {data:?}");
//! }
//!
//! db.close()?;
//! # Ok::<(), microbtree_storage::StorageError>(())
//! ```

mod buffer;
mod error;
mod iter;
mod node;
mod store;
mod tree;
mod types;

pub use buffer::Stats;
pub use error::{Result, StorageError};
pub use iter::RangeIter;
pub use store::{FilePageStore, PageStore};
pub use tree::BTree;
pub use types::{Config, PageId};

use std::path::Path;

/// A handle to an open database: a [`BTree`] bound to a file on disk.
///
/// `Db` owns its backing store. There is no internal locking — the engine
/// is single-threaded by design, so callers that need concurrent access
/// are responsible for their own synchronization.
pub struct Db {
    tree: BTree<FilePageStore>,
}

impl Db {
    /// Open (creating if necessary) a database file at `path`, recovering
    /// its most recent root if one exists.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let store = FilePageStore::open(path.as_ref())?;
        let tree = BTree::open(store, config)?;
        Ok(Self { tree })
    }

    /// Look up `key`.
    pub fn get(&mut self, key: u64) -> Result<Option<Vec<u8>>> {
        self.tree.get(key)
    }

    /// Insert or overwrite `key` with `data` (must be exactly the
    /// configured `data_size` bytes long).
    pub fn put(&mut self, key: u64, data: &[u8]) -> Result<()> {
        self.tree.put(key, data)
    }

    /// Iterate ascending over records with keys in `[lower, upper]`, either
    /// bound optional.
    pub fn range(&mut self, lower: Option<u64>, upper: Option<u64>) -> RangeIter<'_, FilePageStore> {
        self.tree.range(lower, upper)
    }

    /// Current tree height (1 for a tree whose root is a leaf).
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Snapshot of cumulative buffer pool I/O counters.
    pub fn stats(&self) -> Stats {
        self.tree.stats()
    }

    /// Flush the backing file and report final statistics.
    pub fn close(self) -> Result<()> {
        self.tree.close()
    }
}
