//! Backing page store: positioned reads and writes against a file.
//!
//! This is deliberately the thinnest possible layer — it knows nothing
//! about node layout or caching, only how to move fixed-size blocks in and
//! out of a file at page-aligned offsets. Swappable behind a trait so the
//! buffer pool can be tested against an in-memory fake.

use crate::error::Result;
use crate::types::PageId;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A block-addressable backing store for fixed-size pages.
pub trait PageStore {
    /// Read `page_size` bytes at `page_id`'s slot into `buf`.
    fn read_block(&mut self, page_id: PageId, page_size: usize, buf: &mut [u8]) -> Result<()>;

    /// Write `data` (exactly `page_size` bytes) to `page_id`'s slot.
    fn write_block(&mut self, page_id: PageId, page_size: usize, data: &[u8]) -> Result<()>;

    /// Write `data` at `offset` bytes into `page_id`'s slot, without
    /// touching the rest of the page.
    fn write_block_at(&mut self, page_id: PageId, page_size: usize, offset: usize, data: &[u8]) -> Result<()>;

    /// Number of whole pages currently stored, given `page_size`.
    fn length_in_pages(&mut self, page_size: usize) -> Result<u32>;

    /// Flush any buffering to the underlying medium.
    fn sync(&mut self) -> Result<()>;
}

/// A [`PageStore`] backed by a single plain file.
pub struct FilePageStore {
    file: File,
}

impl FilePageStore {
    /// Open (creating if necessary) the backing file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self { file })
    }
}

impl PageStore for FilePageStore {
    fn read_block(&mut self, page_id: PageId, page_size: usize, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset(page_size)))?;
        self.file.read_exact(&mut buf[..page_size])?;
        Ok(())
    }

    fn write_block(&mut self, page_id: PageId, page_size: usize, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset(page_size)))?;
        self.file.write_all(&data[..page_size])?;
        Ok(())
    }

    fn write_block_at(&mut self, page_id: PageId, page_size: usize, offset: usize, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset(page_size) + offset as u64))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn length_in_pages(&mut self, page_size: usize) -> Result<u32> {
        let len = self.file.seek(SeekFrom::End(0))?;
        Ok((len / page_size as u64) as u32)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

/// An in-memory [`PageStore`] used by the buffer pool's own unit tests.
#[cfg(test)]
pub struct MemPageStore {
    pages: Vec<u8>,
}

#[cfg(test)]
impl MemPageStore {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }
}

#[cfg(test)]
impl PageStore for MemPageStore {
    fn read_block(&mut self, page_id: PageId, page_size: usize, buf: &mut [u8]) -> Result<()> {
        let off = page_id.file_offset(page_size) as usize;
        if off + page_size > self.pages.len() {
            return Err(crate::error::StorageError::NotFound);
        }
        buf[..page_size].copy_from_slice(&self.pages[off..off + page_size]);
        Ok(())
    }

    fn write_block(&mut self, page_id: PageId, page_size: usize, data: &[u8]) -> Result<()> {
        let off = page_id.file_offset(page_size) as usize;
        if off + page_size > self.pages.len() {
            self.pages.resize(off + page_size, 0);
        }
        self.pages[off..off + page_size].copy_from_slice(&data[..page_size]);
        Ok(())
    }

    fn write_block_at(&mut self, page_id: PageId, page_size: usize, offset: usize, data: &[u8]) -> Result<()> {
        let off = page_id.file_offset(page_size) as usize + offset;
        if off + data.len() > self.pages.len() {
            self.pages.resize(off + data.len(), 0);
        }
        self.pages[off..off + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn length_in_pages(&mut self, page_size: usize) -> Result<u32> {
        Ok((self.pages.len() / page_size) as u32)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_write_read_roundtrip() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.bin");
        let mut store = FilePageStore::open(&path)?;

        let mut data = vec![0u8; 512];
        data[0..5].copy_from_slice(b"hello");
        store.write_block(PageId::new(0), 512, &data)?;

        let mut out = vec![0u8; 512];
        store.read_block(PageId::new(0), 512, &mut out)?;
        assert_eq!(&out[0..5], b"hello");
        assert_eq!(store.length_in_pages(512)?, 1);
        Ok(())
    }

    #[test]
    fn test_write_block_at_patches_in_place() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.bin");
        let mut store = FilePageStore::open(&path)?;

        store.write_block(PageId::new(0), 512, &vec![0u8; 512])?;
        store.write_block_at(PageId::new(0), 512, 4, &[9, 9, 9])?;

        let mut out = vec![0u8; 512];
        store.read_block(PageId::new(0), 512, &mut out)?;
        assert_eq!(&out[4..7], &[9, 9, 9]);
        assert_eq!(out[0], 0);
        Ok(())
    }

    #[test]
    fn test_mem_store_roundtrip() -> Result<()> {
        let mut store = MemPageStore::new();
        store.write_block(PageId::new(2), 64, &vec![7u8; 64])?;
        let mut out = vec![0u8; 64];
        store.read_block(PageId::new(2), 64, &mut out)?;
        assert_eq!(out, vec![7u8; 64]);
        Ok(())
    }
}
