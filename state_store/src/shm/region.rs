use std::{ffi::c_void, io, mem::size_of, ptr::NonNull, slice};

use log::{debug, warn};
use rustix::{
    fs::{self as rfs, Mode},
    io::Errno,
    mm::{self, MapFlags, ProtFlags},
    shm::{self, ShmOFlags},
};

use crate::{Result, StoreErr};

/// A named, fixed-size cross-process array of `f64`.
///
/// The region is a POSIX shared memory object mapped into this process. Its layout is a flat
/// array of native-endian doubles with no header. Dropping the handle unmaps it, the named
/// object itself survives until `destroy` (or `SharedRegion::unlink`) is called.
#[derive(Debug)]
pub struct SharedRegion {
    name: String,
    len: usize,
    ptr: NonNull<u8>,
    created: bool,
}

impl SharedRegion {
    /// Creates the named region, or attaches to it if it already exists.
    ///
    /// # Arguments
    /// * `name` - The well-known name of the region.
    /// * `len` - The amount of `f64` values the region holds.
    ///
    /// # Returns
    /// The mapped region. `created()` tells whether this call created it, a freshly created
    /// region is zero-filled.
    ///
    /// # Errors
    /// `StoreErr::Unavailable` if the region can't be opened or mapped and
    /// `StoreErr::RegionSize` if an existing region has a different size.
    pub fn open(name: &str, len: usize) -> Result<Self> {
        let size = len * size_of::<f64>();
        let unavailable = |e: Errno| StoreErr::Unavailable {
            region: name.to_string(),
            source: io::Error::from(e),
        };

        let flags = ShmOFlags::CREATE | ShmOFlags::EXCL | ShmOFlags::RDWR;
        let (fd, created) = match shm::shm_open(name, flags, Mode::RUSR | Mode::WUSR) {
            Ok(fd) => {
                if let Err(e) = rfs::ftruncate(&fd, size as u64) {
                    let _ = shm::shm_unlink(name);
                    return Err(unavailable(e));
                }
                (fd, true)
            }
            Err(e) if e == Errno::EXIST => {
                let fd = shm::shm_open(name, ShmOFlags::RDWR, Mode::empty()).map_err(unavailable)?;
                let stat = rfs::fstat(&fd).map_err(unavailable)?;
                let got = usize::try_from(stat.st_size).unwrap_or_default();

                if got != size {
                    return Err(StoreErr::RegionSize {
                        region: name.to_string(),
                        got,
                        expected: size,
                    });
                }
                (fd, false)
            }
            Err(e) => return Err(unavailable(e)),
        };

        // SAFETY: `fd` is a valid shared memory object of exactly `size` bytes (truncated on
        // creation, checked on attach). The mapping outlives `fd` and is unmapped in `Drop`.
        let addr = unsafe {
            mm::mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )
        };

        let addr = match addr {
            Ok(addr) => addr,
            Err(e) => {
                if created {
                    let _ = shm::shm_unlink(name);
                }
                return Err(unavailable(e));
            }
        };

        let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| unavailable(Errno::FAULT))?;
        debug!("mapped region {name} ({size} bytes, created={created})");

        Ok(Self {
            name: name.to_string(),
            len,
            ptr,
            created,
        })
    }

    /// Returns the well-known name of the region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the amount of `f64` values the region holds.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the region holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if this handle created the region instead of attaching to it.
    pub fn created(&self) -> bool {
        self.created
    }

    /// Returns the raw bytes of the region.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `ptr` points to a live mapping of `len * 8` bytes owned by this handle.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len * size_of::<f64>()) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: same mapping as `as_bytes`, borrowed mutably through `&mut self`.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len * size_of::<f64>()) }
    }

    /// Copies the region values into `out`.
    ///
    /// # Errors
    /// `StoreErr::RegionSize` if `out` doesn't have exactly `len()` values.
    pub fn read(&self, out: &mut [f64]) -> Result<()> {
        self.check_len(out.len())?;
        out.copy_from_slice(bytemuck::cast_slice(self.as_bytes()));
        Ok(())
    }

    /// Overwrites the region values with `values`.
    ///
    /// # Errors
    /// `StoreErr::RegionSize` if `values` doesn't have exactly `len()` values.
    pub fn write(&mut self, values: &[f64]) -> Result<()> {
        self.check_len(values.len())?;
        self.as_bytes_mut()
            .copy_from_slice(bytemuck::cast_slice(values));
        Ok(())
    }

    /// Detaches from the region, leaving it available to other processes.
    pub fn release(self) {
        drop(self);
    }

    /// Detaches from the region and removes it.
    ///
    /// # Returns
    /// `true` if the region was removed by this call, `false` if it was already gone.
    ///
    /// # Errors
    /// `StoreErr::Unavailable` if the region exists but can't be removed.
    pub fn destroy(self) -> Result<bool> {
        let name = self.name.clone();
        drop(self);
        Self::unlink(&name)
    }

    /// Removes the named region without attaching to it.
    ///
    /// Processes still mapping the region keep their mapping until they release it.
    ///
    /// # Returns
    /// `true` if the region was removed, `false` if it didn't exist.
    ///
    /// # Errors
    /// `StoreErr::Unavailable` if the region exists but can't be removed.
    pub fn unlink(name: &str) -> Result<bool> {
        match shm::shm_unlink(name) {
            Ok(()) => {
                debug!("removed region {name}");
                Ok(true)
            }
            Err(e) if e == Errno::NOENT => {
                warn!("region {name} was already removed");
                Ok(false)
            }
            Err(e) => Err(StoreErr::Unavailable {
                region: name.to_string(),
                source: io::Error::from(e),
            }),
        }
    }

    fn check_len(&self, got: usize) -> Result<()> {
        if got != self.len {
            return Err(StoreErr::RegionSize {
                region: self.name.clone(),
                got: got * size_of::<f64>(),
                expected: self.len * size_of::<f64>(),
            });
        }

        Ok(())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        let size = self.len * size_of::<f64>();

        // SAFETY: `ptr` and `size` describe the mapping created in `open`, which is only
        // unmapped here.
        if let Err(e) = unsafe { mm::munmap(self.ptr.as_ptr().cast::<c_void>(), size) } {
            warn!("failed to unmap region {}: {e}", self.name);
        }
    }
}
