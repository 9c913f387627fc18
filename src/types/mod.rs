//! Common types used throughout the storage engine.

mod page_id;

pub use page_id::PageId;

/// Maximum depth of the active path (root-to-leaf descent cache). Sixteen
/// levels comfortably covers any tree built from pages in the single- to
/// low-double-digit-kilobyte range.
pub const MAX_ACTIVE_PATH: usize = 16;

/// Flag bit: this page is the current root.
pub const FLAG_ROOT: u8 = 0b0000_0001;
/// Flag bit: this page is a leaf (unset means interior).
pub const FLAG_LEAF: u8 = 0b0000_0010;

/// Configuration for a tree instance: page geometry and buffer sizing.
///
/// Defaults mirror the parameters a small embedded device would pick:
/// a 512-byte page, a 3-frame buffer, 4-byte keys and 16-byte records.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size in bytes of one page on the backing store.
    pub page_size: usize,
    /// Number of in-memory frames the buffer pool manages, including the
    /// write-scratch frame and (when `num_pages >= 3`) the reserved root
    /// frame.
    pub num_pages: usize,
    /// Size in bytes of one fixed leaf record.
    pub record_size: usize,
    /// Size in bytes of the on-page key encoding (<= 8; keys are exposed
    /// to callers as `u64` and truncated to this many big-endian bytes).
    pub key_size: usize,
    /// Size in bytes of the data payload within a leaf record.
    pub data_size: usize,
    /// Reserved for caller use; never interpreted by the engine.
    pub parameters: u32,
    /// Size in bytes of the scratch buffer used transiently during split
    /// bookkeeping.
    pub mapping_buffer_size: usize,
}

impl Config {
    /// Build a configuration with the required page/record/key geometry.
    ///
    /// Panics if the geometry is inconsistent: a key must fit in a `u64`
    /// (`key_size <= 8`), a record must hold the key and data it is
    /// configured for (`record_size >= key_size + data_size`), and the
    /// buffer needs at least the write-scratch frame plus one general
    /// frame (`num_pages >= 2`).
    pub fn new(page_size: usize, num_pages: usize, record_size: usize, key_size: usize, data_size: usize) -> Self {
        assert!(key_size >= 1 && key_size <= 8, "key_size must be between 1 and 8 bytes");
        assert!(record_size >= key_size + data_size, "record_size too small for key_size + data_size");
        assert!(num_pages >= 2, "buffer needs at least a scratch frame and one general frame");

        Self {
            page_size,
            num_pages,
            record_size,
            key_size,
            data_size,
            parameters: 0,
            mapping_buffer_size: page_size,
        }
    }

    /// Set the reserved `parameters` word.
    pub fn parameters(mut self, value: u32) -> Self {
        self.parameters = value;
        self
    }

    /// Set the scratch buffer size used during split bookkeeping.
    pub fn mapping_buffer_size(mut self, size: usize) -> Self {
        self.mapping_buffer_size = size;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(512, 3, 16, 4, 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.page_size, 512);
        assert_eq!(cfg.num_pages, 3);
        assert_eq!(cfg.record_size, 16);
        assert_eq!(cfg.key_size, 4);
        assert_eq!(cfg.data_size, 12);
    }

    #[test]
    #[should_panic(expected = "record_size too small")]
    fn test_rejects_undersized_record() {
        Config::new(512, 3, 8, 4, 12);
    }

    #[test]
    #[should_panic(expected = "key_size must be between")]
    fn test_rejects_oversized_key() {
        Config::new(512, 3, 32, 9, 12);
    }
}
