// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedSegment - System V shared memory wrapper.
//!
//! A segment is identified by a numeric key so that unrelated processes on
//! the same host find it without exchanging names or file descriptors. It is
//! never removed by ringlog: it outlives every reader and writer process.
//! All unsafe operations are encapsulated here.

use std::ptr::NonNull;

use crate::error::SegmentError;
use crate::types::SegmentKey;

/// How the mapping was obtained, which decides how it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    /// `shmget` + `shmat`, released with `shmdt`.
    SysV,
    /// Anonymous `MAP_SHARED` mapping, shared with forked children only.
    Anonymous,
}

/// A mapped shared memory segment.
///
/// Dropping the handle detaches it from this process; the segment itself
/// stays in the kernel.
pub struct SharedSegment {
    /// Key the segment was created under (`None` for anonymous mappings).
    key: Option<SegmentKey>,
    /// Start of the mapping.
    ptr: NonNull<u8>,
    /// Size of the mapping in bytes.
    size: usize,
    /// Whether this call created the segment.
    created: bool,
    backing: Backing,
}

// SAFETY: SharedSegment owns its mapping; moving it between threads is fine.
unsafe impl Send for SharedSegment {}

// SAFETY: All concurrent access goes through the atomic indices in RingLayout.
unsafe impl Sync for SharedSegment {}

impl SharedSegment {
    /// Create the segment for `key`, or attach to it if it already exists.
    ///
    /// A freshly created segment is zero-filled by the kernel, which is the
    /// empty ring state. An existing segment must have exactly `size` bytes;
    /// any other size means the attaching processes disagree on the ring
    /// geometry and the call fails with [`SegmentError::SizeMismatch`].
    pub fn create_or_attach(key: SegmentKey, size: usize) -> Result<Self, SegmentError> {
        let raw_key = key.value();
        if size == 0 {
            return Err(SegmentError::CreateFailed {
                key: raw_key,
                reason: "Size cannot be zero".to_string(),
            });
        }

        // SAFETY: shmget has no memory-safety preconditions.
        let id = unsafe {
            libc::shmget(
                raw_key as libc::key_t,
                size,
                libc::IPC_CREAT | libc::IPC_EXCL | 0o600,
            )
        };

        let (id, created) = if id >= 0 {
            (id, true)
        } else {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() != Some(libc::EEXIST) {
                return Err(SegmentError::CreateFailed {
                    key: raw_key,
                    reason: format!("shmget failed: {}", errno),
                });
            }

            // SAFETY: as above.
            let id = unsafe { libc::shmget(raw_key as libc::key_t, 0, 0o600) };
            if id < 0 {
                return Err(SegmentError::AttachFailed {
                    key: raw_key,
                    reason: format!("shmget failed: {}", std::io::Error::last_os_error()),
                });
            }

            let actual = Self::segment_size(raw_key, id)?;
            if actual != size {
                return Err(SegmentError::SizeMismatch {
                    key: raw_key,
                    expected: size,
                    actual,
                });
            }
            (id, false)
        };

        // SAFETY: id is a valid segment id; a null address lets the kernel pick.
        let addr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(SegmentError::AttachFailed {
                key: raw_key,
                reason: format!("shmat failed: {}", std::io::Error::last_os_error()),
            });
        }

        let ptr = NonNull::new(addr as *mut u8).ok_or_else(|| SegmentError::AttachFailed {
            key: raw_key,
            reason: "shmat returned null".to_string(),
        })?;

        tracing::debug!(key = %key, size = size, created = created, "Attached shared memory segment");

        Ok(Self {
            key: Some(key),
            ptr,
            size,
            created,
            backing: Backing::SysV,
        })
    }

    /// Map an anonymous shared region of `size` bytes.
    ///
    /// Visible to this process and to children forked after the call. Used
    /// for tests and for embedding a ring without a host-wide key.
    pub fn anonymous(size: usize) -> Result<Self, SegmentError> {
        if size == 0 {
            return Err(SegmentError::CreateFailed {
                key: 0,
                reason: "Size cannot be zero".to_string(),
            });
        }

        // SAFETY: anonymous mapping, no fd, size validated.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(SegmentError::CreateFailed {
                key: 0,
                reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
            });
        }

        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| SegmentError::CreateFailed {
            key: 0,
            reason: "mmap returned null".to_string(),
        })?;

        Ok(Self {
            key: None,
            ptr,
            size,
            created: true,
            backing: Backing::Anonymous,
        })
    }

    fn segment_size(raw_key: i32, id: libc::c_int) -> Result<usize, SegmentError> {
        // SAFETY: shmid_ds is plain old data; zeroed is a valid value.
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        // SAFETY: id is valid and ds points to writable storage.
        let rc = unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) };
        if rc < 0 {
            return Err(SegmentError::AttachFailed {
                key: raw_key,
                reason: format!("shmctl(IPC_STAT) failed: {}", std::io::Error::last_os_error()),
            });
        }
        Ok(ds.shm_segsz as usize)
    }

    /// Key of this segment, if it has one.
    pub fn key(&self) -> Option<SegmentKey> {
        self.key
    }

    /// Size of the mapping in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this handle created the segment rather than attaching.
    pub fn created(&self) -> bool {
        self.created
    }

    /// Raw pointer to the start of the mapping.
    ///
    /// Callers must stay within `size()` bytes and synchronize through the
    /// ring indices.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        match self.backing {
            Backing::SysV => {
                // SAFETY: ptr was returned by shmat and is detached exactly once.
                let result = unsafe { libc::shmdt(self.ptr.as_ptr() as *const libc::c_void) };
                if result < 0 {
                    tracing::error!(
                        key = ?self.key,
                        error = %std::io::Error::last_os_error(),
                        "Failed to detach shared memory segment"
                    );
                }
            }
            Backing::Anonymous => {
                // SAFETY: ptr and size come from the mmap call in `anonymous`.
                let result =
                    unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
                if result < 0 {
                    tracing::error!(
                        error = %std::io::Error::last_os_error(),
                        "Failed to unmap anonymous segment"
                    );
                }
            }
        }
    }
}

/// Mark a keyed segment for removal. Only tests clean up after themselves.
#[cfg(test)]
pub(crate) fn remove_segment(key: SegmentKey) {
    // SAFETY: plain syscalls; a missing segment just returns an error.
    unsafe {
        let id = libc::shmget(key.value() as libc::key_t, 0, 0);
        if id >= 0 {
            libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut());
        }
    }
}

#[cfg(test)]
pub(crate) fn unique_test_key() -> SegmentKey {
    use std::sync::atomic::{AtomicI32, Ordering};
    static NEXT: AtomicI32 = AtomicI32::new(0);
    let pid = std::process::id() as i32 & 0x00FF_FFFF;
    let n = NEXT.fetch_add(1, Ordering::Relaxed) & 0xF;
    SegmentKey::new(0x3000_0000 | ((pid << 4) + n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(SharedSegment::anonymous(0).is_err());
        assert!(SharedSegment::create_or_attach(unique_test_key(), 0).is_err());
    }

    #[test]
    fn test_anonymous_is_zeroed() {
        let segment = SharedSegment::anonymous(4096).unwrap();
        assert!(segment.created());
        assert!(segment.key().is_none());
        // SAFETY: reading inside the mapping.
        let bytes = unsafe { std::slice::from_raw_parts(segment.as_ptr(), segment.size()) };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_create_then_attach_shares_memory() {
        let key = unique_test_key();
        remove_segment(key);

        let first = SharedSegment::create_or_attach(key, 128).unwrap();
        let second = SharedSegment::create_or_attach(key, 128).unwrap();
        assert!(first.created());
        assert!(!second.created());

        // SAFETY: both pointers map the same 128 bytes.
        unsafe {
            *first.as_ptr().add(10) = 0xAB;
            assert_eq!(*second.as_ptr().add(10), 0xAB);
        }

        drop(first);
        drop(second);
        remove_segment(key);
    }

    #[test]
    fn test_attach_with_different_size_is_detected() {
        let key = unique_test_key();
        remove_segment(key);

        let _owner = SharedSegment::create_or_attach(key, 256).unwrap();
        let err = SharedSegment::create_or_attach(key, 512)
            .err()
            .expect("mismatched size must fail");
        assert!(matches!(
            err,
            SegmentError::SizeMismatch {
                expected: 512,
                actual: 256,
                ..
            }
        ));

        remove_segment(key);
    }
}
