//! Named shared-memory segments.
//!
//! A topic created with a capacity keeps its payload bytes in a ring buffer
//! that lives in a POSIX shared-memory object, so readers in other processes
//! can copy them out without the bytes crossing the socket. Clients use the
//! same machinery for one-shot request segments.
//!
//! ## Naming
//!
//! Every segment is `/rmq_<uid>_<owner>_<topic>_<kind>`, with any character
//! outside `[A-Za-z0-9_-]` replaced by `_`. Each segment has a sibling lock
//! object `<segment>_mutex` that serialises access with `flock(2)`:
//!
//! - writers take the lock exclusive for the duration of the copy in,
//! - readers take it shared for the duration of the copy out.
//!
//! Each lock acquisition reopens the lock object, so two handles in one
//! process still exclude each other.
//!
//! ## Lifecycle
//!
//! - **Create**: `shm_open(O_CREAT | O_EXCL | O_RDWR)` + `ftruncate` + `mmap`
//! - **Open**: `shm_open(O_RDONLY)` + `mmap(PROT_READ)`
//! - **Drop**: the creator unlinks both the segment and its lock

#![allow(unsafe_code)]

use std::fs::File;
use std::io;

use bytes::Bytes;
use memmap2::{Mmap, MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg, OFlag};
use nix::sys::mman;
use nix::sys::stat::Mode;
use nix::unistd;
use tracing::{debug, trace, warn};

use crate::error::{Result, RmqError};

/// What a segment is used for. Appears as the last component of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Broker-owned ring buffer backing a topic.
    Ring,
    /// Client-owned segment carrying a single request payload.
    Request,
}

impl SegmentKind {
    fn suffix(self) -> &'static str {
        match self {
            SegmentKind::Ring => "ring",
            SegmentKind::Request => "request",
        }
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Name of the segment owned by `owner` for `topic`.
///
/// ```
/// use robotmq_core::shm::{segment_name, SegmentKind};
///
/// let name = segment_name("/tmp/feeds/0", "camera.left", SegmentKind::Ring);
/// assert!(name.starts_with("/rmq_"));
/// assert!(name.ends_with("__tmp_feeds_0_camera_left_ring"));
/// ```
pub fn segment_name(owner: &str, topic: &str, kind: SegmentKind) -> String {
    format!(
        "/rmq_{}_{}_{}_{}",
        unistd::getuid().as_raw(),
        sanitize(owner),
        sanitize(topic),
        kind.suffix()
    )
}

/// Name of the lock object guarding `segment`.
pub fn lock_name(segment: &str) -> String {
    format!("{segment}_mutex")
}

/// Copy `src` into the ring `dst` starting at `offset`, wrapping at the end.
fn copy_into_ring(dst: &mut [u8], offset: usize, src: &[u8]) {
    let first = src.len().min(dst.len() - offset);
    dst[offset..offset + first].copy_from_slice(&src[..first]);
    let rest = src.len() - first;
    dst[..rest].copy_from_slice(&src[first..]);
}

/// Copy `len` bytes out of the ring `src` starting at `offset`, wrapping at the end.
fn copy_from_ring(src: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let first = len.min(src.len() - offset);
    out.extend_from_slice(&src[offset..offset + first]);
    out.extend_from_slice(&src[..len - first]);
    out
}

fn check_span(segment: &str, capacity: usize, offset: usize, len: usize) -> Result<()> {
    if capacity == 0 || offset >= capacity || len > capacity {
        return Err(RmqError::invalid_descriptor(format!(
            "span offset={offset} len={len} outside `{segment}` (capacity {capacity})"
        )));
    }
    Ok(())
}

/// A named `flock(2)` lock on a shared-memory object.
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    owner: bool,
}

impl NamedLock {
    /// Create the lock object (or reuse a stale one) and own its name.
    pub fn create(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        mman::shm_open(
            name.as_str(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| RmqError::shared_memory(&name, e))?;
        Ok(Self { name, owner: true })
    }

    /// Refer to a lock object created by another handle.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: false,
        }
    }

    /// Lock object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self, arg: FlockArg, flags: OFlag) -> Result<Flock<File>> {
        let fd = mman::shm_open(self.name.as_str(), flags, Mode::empty())
            .map_err(|e| RmqError::shared_memory(&self.name, e))?;
        Flock::lock(File::from(fd), arg).map_err(|(_, e)| RmqError::shared_memory(&self.name, e))
    }

    /// Block until the lock is held exclusively. Released when the guard drops.
    pub fn lock_exclusive(&self) -> Result<Flock<File>> {
        self.acquire(FlockArg::LockExclusive, OFlag::O_RDWR)
    }

    /// Block until the lock is held shared. Released when the guard drops.
    pub fn lock_shared(&self) -> Result<Flock<File>> {
        self.acquire(FlockArg::LockShared, OFlag::O_RDONLY)
    }
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        if self.owner {
            let _ = mman::shm_unlink(self.name.as_str());
        }
    }
}

enum Mapping {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

impl Mapping {
    fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::Writable(map) => &map[..],
            Mapping::ReadOnly(map) => &map[..],
        }
    }
}

/// A mapped shared-memory segment plus its lock.
pub struct ShmSegment {
    name: String,
    capacity: usize,
    map: Mapping,
    lock: NamedLock,
    owner: bool,
}

impl std::fmt::Debug for ShmSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmSegment")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("owner", &self.owner)
            .finish()
    }
}

impl ShmSegment {
    /// Create a fresh segment of `capacity` bytes. A stale segment with the
    /// same name is unlinked and replaced.
    pub fn create(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(RmqError::invalid_argument(format!(
                "segment `{name}` needs a non-zero capacity"
            )));
        }

        let flags = OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR;
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;
        let fd = match mman::shm_open(name.as_str(), flags, mode) {
            Ok(fd) => fd,
            Err(Errno::EEXIST) => {
                warn!("[SHM] Replacing stale segment {}", name);
                let _ = mman::shm_unlink(name.as_str());
                mman::shm_open(name.as_str(), flags, mode)
                    .map_err(|e| RmqError::shared_memory(&name, e))?
            }
            Err(e) => return Err(RmqError::shared_memory(&name, e)),
        };

        if let Err(e) = unistd::ftruncate(&fd, capacity as i64) {
            let _ = mman::shm_unlink(name.as_str());
            return Err(RmqError::shared_memory(&name, e));
        }

        let lock = match NamedLock::create(lock_name(&name)) {
            Ok(lock) => lock,
            Err(e) => {
                let _ = mman::shm_unlink(name.as_str());
                return Err(e);
            }
        };

        let file = File::from(fd);
        // SAFETY: the object was just truncated to `capacity` bytes and is only
        // written through this mapping while the exclusive lock is held.
        let map = match unsafe { MmapOptions::new().len(capacity).map_mut(&file) } {
            Ok(map) => map,
            Err(e) => {
                let _ = mman::shm_unlink(name.as_str());
                return Err(RmqError::shared_memory(&name, e));
            }
        };

        debug!("[SHM] Created segment {} ({} bytes)", name, capacity);
        Ok(Self {
            name,
            capacity,
            map: Mapping::Writable(map),
            lock,
            owner: true,
        })
    }

    /// Map an existing segment read-only. `capacity` must not exceed its size.
    pub fn open_readonly(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(RmqError::invalid_descriptor(format!(
                "segment `{name}` advertised with zero capacity"
            )));
        }

        let fd = mman::shm_open(name.as_str(), OFlag::O_RDONLY, Mode::empty())
            .map_err(|e| RmqError::shared_memory(&name, e))?;
        let file = File::from(fd);
        let size = file
            .metadata()
            .map_err(|e| RmqError::shared_memory(&name, e))?
            .len();
        if (size as usize) < capacity {
            return Err(RmqError::shared_memory(
                &name,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("segment holds {size} bytes, expected {capacity}"),
                ),
            ));
        }

        // SAFETY: the mapping is read-only and bounded by the object size checked above.
        let map = unsafe { MmapOptions::new().len(capacity).map(&file) }
            .map_err(|e| RmqError::shared_memory(&name, e))?;

        trace!("[SHM] Opened segment {} read-only", name);
        Ok(Self {
            lock: NamedLock::open(lock_name(&name)),
            name,
            capacity,
            map: Mapping::ReadOnly(map),
            owner: false,
        })
    }

    /// Segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the mapping in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether this handle created the segment and will unlink it.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Copy `data` in at `offset`, wrapping past the end, under the exclusive lock.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        check_span(&self.name, self.capacity, offset, data.len())?;
        let _guard = self.lock.lock_exclusive()?;
        match &mut self.map {
            Mapping::Writable(map) => {
                copy_into_ring(&mut map[..], offset, data);
                Ok(())
            }
            Mapping::ReadOnly(_) => Err(RmqError::shared_memory(
                &self.name,
                io::Error::from(io::ErrorKind::PermissionDenied),
            )),
        }
    }

    /// Copy `len` bytes out from `offset`, wrapping past the end, under the shared lock.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        check_span(&self.name, self.capacity, offset, len)?;
        let _guard = self.lock.lock_shared()?;
        Ok(Bytes::from(copy_from_ring(self.map.as_slice(), offset, len)))
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        if self.owner {
            debug!("[SHM] Unlinking segment {}", self.name);
            let _ = mman::shm_unlink(self.name.as_str());
        }
    }
}

/// Where a ring write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSpan {
    /// Start offset within the segment.
    pub offset: usize,
    /// Number of bytes written.
    pub len: usize,
    /// Absolute byte position of the write since the ring was created or reset.
    pub position: u64,
}

/// Byte ring over an owned segment.
///
/// Writes always succeed when the payload fits the capacity, overwriting the
/// oldest bytes. The owner tracks which entries survive by comparing each
/// entry's [`RingSpan::position`] with [`ShmRing::head`].
#[derive(Debug)]
pub struct ShmRing {
    segment: ShmSegment,
    write_offset: usize,
    head: u64,
}

impl ShmRing {
    /// Create a ring of `capacity` bytes under `name`.
    pub fn create(name: impl Into<String>, capacity: usize) -> Result<Self> {
        Ok(Self {
            segment: ShmSegment::create(name, capacity)?,
            write_offset: 0,
            head: 0,
        })
    }

    /// Segment name.
    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.segment.capacity()
    }

    /// Absolute position one past the last written byte.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Offset the next write starts at.
    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    /// Whether the bytes written at `position` with length `len` are still intact.
    pub fn is_live(&self, position: u64, len: usize) -> bool {
        position + len as u64 <= self.head && self.head - position <= self.capacity() as u64
    }

    /// Append `data`, wrapping at the end of the segment.
    pub fn write(&mut self, data: &[u8]) -> Result<RingSpan> {
        let capacity = self.capacity();
        if data.len() > capacity {
            return Err(RmqError::invalid_argument(format!(
                "{} bytes do not fit ring `{}` of {} bytes",
                data.len(),
                self.name(),
                capacity
            )));
        }

        let span = RingSpan {
            offset: self.write_offset,
            len: data.len(),
            position: self.head,
        };
        self.segment.write_at(span.offset, data)?;
        self.write_offset = (self.write_offset + data.len()) % capacity;
        self.head += data.len() as u64;
        trace!(
            "[SHM] {} wrote {} bytes at offset {}",
            self.name(),
            span.len,
            span.offset
        );
        Ok(span)
    }

    /// Copy `len` bytes out from `offset`.
    pub fn read(&self, offset: usize, len: usize) -> Result<Bytes> {
        self.segment.read_at(offset, len)
    }

    /// Rewind to an empty ring. Bytes stay in place until overwritten.
    pub fn reset(&mut self) {
        self.write_offset = 0;
        self.head = 0;
    }
}

/// Open `name` read-only and copy out one span.
pub fn read_segment(name: &str, capacity: usize, offset: usize, len: usize) -> Result<Bytes> {
    ShmSegment::open_readonly(name, capacity)?.read_at(offset, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        segment_name(
            &format!("test{}", rand::random::<u32>()),
            tag,
            SegmentKind::Ring,
        )
    }

    #[test]
    fn test_segment_name_sanitizes() {
        let name = segment_name("tcp://127.0.0.1:5555", "a/b c", SegmentKind::Request);
        let uid = unistd::getuid().as_raw();
        assert_eq!(
            name,
            format!("/rmq_{uid}_tcp___127_0_0_1_5555_a_b_c_request")
        );
        assert_eq!(lock_name(&name), format!("{name}_mutex"));
    }

    #[test]
    fn test_wraparound_copy() {
        let mut ring = [0u8; 8];
        copy_into_ring(&mut ring, 6, b"abcd");
        assert_eq!(&ring, b"cd\0\0\0\0ab");
        assert_eq!(copy_from_ring(&ring, 6, 4), b"abcd");
    }

    #[test]
    fn test_ring_write_read() {
        let mut ring = ShmRing::create(unique("rw"), 16).unwrap();
        let a = ring.write(b"hello").unwrap();
        let b = ring.write(b"world!").unwrap();
        assert_eq!(a, RingSpan { offset: 0, len: 5, position: 0 });
        assert_eq!(b, RingSpan { offset: 5, len: 6, position: 5 });
        assert_eq!(&ring.read(a.offset, a.len).unwrap()[..], b"hello");
        assert_eq!(&ring.read(b.offset, b.len).unwrap()[..], b"world!");
        assert_eq!(ring.head(), 11);
    }

    #[test]
    fn test_ring_wraps_and_overwrites() {
        let mut ring = ShmRing::create(unique("wrap"), 10).unwrap();
        let first = ring.write(b"0123456").unwrap();
        let second = ring.write(b"abcdef").unwrap();
        assert_eq!(second.offset, 7);
        assert_eq!(ring.write_offset(), 3);
        assert_eq!(&ring.read(second.offset, second.len).unwrap()[..], b"abcdef");
        assert!(ring.is_live(second.position, second.len));
        assert!(!ring.is_live(first.position, first.len));
    }

    #[test]
    fn test_ring_rejects_oversized() {
        let mut ring = ShmRing::create(unique("big"), 4).unwrap();
        let err = ring.write(b"too large").unwrap_err();
        assert!(matches!(err, RmqError::InvalidArgument(_)));
        assert_eq!(ring.head(), 0);
    }

    #[test]
    fn test_reader_sees_owner_writes() {
        let name = unique("reader");
        let mut ring = ShmRing::create(name.clone(), 32).unwrap();
        let span = ring.write(b"shared bytes").unwrap();
        let bytes = read_segment(&name, 32, span.offset, span.len).unwrap();
        assert_eq!(&bytes[..], b"shared bytes");
    }

    #[test]
    fn test_drop_unlinks() {
        let name = unique("drop");
        {
            let _ring = ShmRing::create(name.clone(), 8).unwrap();
        }
        assert!(ShmSegment::open_readonly(name, 8).is_err());
    }

    #[test]
    fn test_open_larger_than_segment_fails() {
        let name = unique("small");
        let _ring = ShmRing::create(name.clone(), 8).unwrap();
        assert!(ShmSegment::open_readonly(name, 64).is_err());
    }

    #[test]
    fn test_span_outside_capacity() {
        let ring = ShmRing::create(unique("span"), 8).unwrap();
        assert!(matches!(
            ring.read(8, 1).unwrap_err(),
            RmqError::InvalidDescriptor(_)
        ));
        assert!(matches!(
            ring.read(0, 9).unwrap_err(),
            RmqError::InvalidDescriptor(_)
        ));
    }
}
