use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::OnceLock,
};

/// Memory used for buffer exchange
///
/// Buffers are always supplied by the application, by address.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    UserPtr = 2,
}

/// Returns the memory page size of the running system
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    })
}

/// Page aligned userspace memory
///
/// Devices in user pointer mode transfer image data directly into this buffer via DMA, which
/// requires it to start on a page boundary. The buffer over-allocates by one page and exposes
/// the aligned window of the requested length; the oversized backing allocation is owned by the
/// buffer and freed together with it.
///
/// The backing storage is never grown or reallocated, so the address handed to the kernel stays
/// valid for the lifetime of the instance.
pub struct UserPtr {
    backing: Vec<u8>,
    offset: usize,
    len: usize,
}

impl UserPtr {
    /// Returns a zeroed buffer of `size` bytes starting on a page boundary
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::memory::{page_size, UserPtr};
    ///
    /// let buf = UserPtr::new(1280 * 720 * 2);
    /// assert_eq!(buf.as_ptr() as usize % page_size(), 0);
    /// ```
    pub fn new(size: usize) -> Self {
        let page = page_size();
        let backing = vec![0u8; size + page];

        // distance to the next page boundary, zero if already aligned
        let addr = backing.as_ptr() as usize;
        let offset = (page - addr % page) % page;

        UserPtr {
            backing,
            offset,
            len: size,
        }
    }
}

impl fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPtr")
            .field("addr", &self.as_ptr())
            .field("len", &self.len)
            .finish()
    }
}

impl Deref for UserPtr {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.backing[self.offset..self.offset + self.len]
    }
}

impl DerefMut for UserPtr {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.backing[self.offset..self.offset + self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_for_awkward_sizes() {
        let page = page_size();
        for &size in [0, 1, page - 1, page, page + 1, 113].iter() {
            let buf = UserPtr::new(size);
            assert_eq!(buf.len(), size, "size {}", size);
            assert_eq!(buf.as_ptr() as usize % page, 0, "size {}", size);
        }
    }

    #[test]
    fn window_is_writable_and_stable() {
        let mut buf = UserPtr::new(113);
        let before = buf.as_ptr();
        buf[112] = 0xAB;
        buf.iter_mut().take(4).for_each(|b| *b = 1);

        assert_eq!(buf.as_ptr(), before);
        assert_eq!(&buf[..4], &[1, 1, 1, 1]);
        assert_eq!(buf[112], 0xAB);
    }

    #[test]
    fn page_size_is_a_power_of_two() {
        assert!(page_size().is_power_of_two());
    }
}
