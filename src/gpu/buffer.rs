//! Typed device buffers with a version counter.
//!
//! A [`DeviceBuffer`] grows (2x) when written with more data than it holds
//! and bumps its version whenever the underlying `wgpu::Buffer` is
//! replaced, so bind groups built against an older version can be
//! recreated. Allocations above the device limit fail with
//! [`ResourceError`] instead of a device validation error.

use std::{fmt, marker::PhantomData};

use wgpu::util::DeviceExt;

/// Minimum allocation, in bytes.
const MIN_CAPACITY: u64 = 64;

/// Allocation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Requested size exceeds the device limit.
    TooLarge {
        /// Buffer or texture label.
        label: String,
        /// Requested size in bytes (or texels for textures).
        requested: u64,
        /// Device limit in the same unit.
        limit: u64,
    },
    /// The device reported an out-of-memory error scope.
    OutOfMemory {
        /// Buffer or texture label.
        label: String,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge {
                label,
                requested,
                limit,
            } => write!(f, "{label}: {requested} exceeds device limit {limit}"),
            Self::OutOfMemory { label } => {
                write!(f, "{label}: device out of memory")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Reject `requested` if it is over `limit`.
///
/// # Errors
///
/// Returns [`ResourceError::TooLarge`].
pub fn check_allocation(
    label: &str,
    requested: u64,
    limit: u64,
) -> Result<(), ResourceError> {
    if requested > limit {
        return Err(ResourceError::TooLarge {
            label: label.to_owned(),
            requested,
            limit,
        });
    }
    Ok(())
}

/// Grown capacity for `needed` bytes given the current capacity.
fn grown_capacity(current: u64, needed: u64) -> u64 {
    if needed <= current {
        current
    } else {
        (needed * 2).max(current + 1024)
    }
}

/// Device buffer holding an array of `T`.
pub struct DeviceBuffer<T> {
    buffer: wgpu::Buffer,
    label: String,
    usage: wgpu::BufferUsages,
    capacity: u64,
    len: usize,
    version: u64,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> DeviceBuffer<T> {
    /// Buffer initialized with `data`, sized exactly (at least 64 bytes).
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TooLarge`] if `data` exceeds
    /// `max_buffer_size`.
    pub fn with_data(
        device: &wgpu::Device,
        label: &str,
        data: &[T],
        usage: wgpu::BufferUsages,
        max_buffer_size: u64,
    ) -> Result<Self, ResourceError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let size = (bytes.len() as u64).max(MIN_CAPACITY);
        check_allocation(label, size, max_buffer_size)?;

        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = if bytes.len() as u64 >= MIN_CAPACITY {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage,
            })
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(MIN_CAPACITY as usize, 0);
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &padded,
                usage,
            })
        };

        Ok(Self {
            buffer,
            label: label.to_owned(),
            usage,
            capacity: size,
            len: data.len(),
            version: 0,
            _marker: PhantomData,
        })
    }

    /// Replace the contents with `data`, reallocating if it does not fit.
    ///
    /// Returns `true` if the buffer was reallocated (bind groups need
    /// recreation).
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TooLarge`] if the grown buffer would exceed
    /// `max_buffer_size`. The old buffer is kept in that case.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[T],
        max_buffer_size: u64,
    ) -> Result<bool, ResourceError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = bytes.len() as u64;

        let reallocated = needed > self.capacity;
        if reallocated {
            let capacity =
                grown_capacity(self.capacity, needed).min(max_buffer_size);
            check_allocation(&self.label, needed, capacity)?;
            self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: capacity,
                usage: self.usage,
                mapped_at_creation: false,
            });
            self.capacity = capacity;
            self.version += 1;
        }
        if needed > 0 {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
        self.len = data.len();
        Ok(reallocated)
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of `T` written last.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the last write was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocation size in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Incremented every time the `wgpu::Buffer` is replaced.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Byte range of the written data, for vertex buffer slices. The whole
    /// allocation when nothing was written.
    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        let bytes = (self.len * size_of::<T>()) as u64;
        if bytes == 0 {
            self.buffer.slice(..)
        } else {
            self.buffer.slice(..bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_over_limit_is_rejected() {
        assert!(check_allocation("atoms", 1024, 1024).is_ok());
        let err = check_allocation("atoms", 1025, 1024).unwrap_err();
        assert_eq!(
            err,
            ResourceError::TooLarge {
                label: "atoms".into(),
                requested: 1025,
                limit: 1024
            }
        );
        assert!(err.to_string().contains("exceeds device limit"));
    }

    #[test]
    fn growth_doubles_and_never_shrinks() {
        assert_eq!(grown_capacity(4096, 100), 4096);
        assert_eq!(grown_capacity(64, 100), 1088);
        assert_eq!(grown_capacity(1024, 4000), 8000);
    }
}
