//! Address fixtures for codec tests and benchmarks.

use wisp_core::config::MAX_CHECKED_SHIFT;

/// A heap buffer that hands out addresses of known alignment.
pub struct AddressPool {
    buf: Vec<u8>,
}

impl AddressPool {
    /// A pool spanning `bytes` bytes (at least 64).
    pub fn new(bytes: usize) -> Self {
        Self {
            buf: vec![0; bytes.max(64)],
        }
    }

    fn base(&self) -> usize {
        self.buf.as_ptr() as usize
    }

    /// Up to `count` addresses aligned to 16 bytes, which the default
    /// strategy can store directly once the mask matches.
    pub fn aligned(&self, count: usize) -> Vec<usize> {
        let align = 1usize << (MAX_CHECKED_SHIFT + 1);
        let first = (self.base() + align - 1) & !(align - 1);
        let end = self.base() + self.buf.len();
        (first..end).step_by(align).take(count).collect()
    }

    /// Up to `count` odd addresses, which every checked strategy spills to
    /// the overflow table.
    pub fn misaligned(&self, count: usize) -> Vec<usize> {
        let first = self.base() | 1;
        let end = self.base() + self.buf.len();
        (first..end).step_by(2).take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_addresses_are_sixteen_aligned() {
        let pool = AddressPool::new(256);
        let addrs = pool.aligned(8);
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|a| a % 16 == 0));
    }

    #[test]
    fn misaligned_addresses_are_odd() {
        let pool = AddressPool::new(64);
        let addrs = pool.misaligned(10);
        assert_eq!(addrs.len(), 10);
        assert!(addrs.iter().all(|a| a % 2 == 1));
    }
}
