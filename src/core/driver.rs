use crate::core::tags::{parse_tag_buffer, TagPacket};
use libloading::{Library, Symbol};
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Size of the tag buffer the vendor driver fills on each poll
pub const TAG_BUFFER_SIZE: usize = 9182;

/// Errors raised by the vendor driver wrapper
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("reader driver library not found at {path:?}: {source}")]
    LibraryNotFound {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("driver symbol {name} missing: {source}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("no USB reader detected")]
    NoDevice,

    #[error("failed to open reader at index {0}")]
    OpenFailed(usize),

    #[error("failed to start tag reading")]
    StartFailed,

    #[error("tag buffer read failed (driver code {0})")]
    ReadFailed(i32),
}

/// Source of tag packets, implemented by the vendor driver and by test doubles
pub trait TagSource {
    /// Number of connected USB reader devices
    fn device_count(&mut self) -> Result<usize, DriverError>;

    /// Open and initialize the reader at the given index
    fn open(&mut self, index: usize) -> Result<(), DriverError>;

    /// Clear the tag buffer and start continuous reading
    fn start(&mut self) -> Result<(), DriverError>;

    /// Drain the tag buffer, returning the packets read since the last poll
    fn poll(&mut self) -> Result<Vec<TagPacket>, DriverError>;

    /// Stop reading and close the device
    fn shutdown(&mut self);
}

/// Default file name of the vendor driver library for the current platform
pub fn default_library_path() -> PathBuf {
    PathBuf::from(format!(
        "{}SWHidApi{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    ))
}

/// Wrapper around the vendor-supplied SWHidApi driver library
#[derive(Debug)]
pub struct HidDriver {
    lib: Library,
    opened: bool,
    reading: bool,
}

impl HidDriver {
    /// Load the vendor driver library from the given path
    pub fn load(path: &Path) -> Result<Self, DriverError> {
        let lib = unsafe { Library::new(path) }.map_err(|source| {
            DriverError::LibraryNotFound {
                path: path.to_path_buf(),
                source,
            }
        })?;
        log::info!("Loaded reader driver library from {}", path.display());
        Ok(Self {
            lib,
            opened: false,
            reading: false,
        })
    }

    fn symbol<T>(&self, name: &'static str) -> Result<Symbol<'_, T>, DriverError> {
        unsafe { self.lib.get(name.as_bytes()) }
            .map_err(|source| DriverError::MissingSymbol { name, source })
    }
}

impl TagSource for HidDriver {
    fn device_count(&mut self) -> Result<usize, DriverError> {
        let get_usb_count: Symbol<unsafe extern "C" fn() -> c_int> =
            self.symbol("SWHid_GetUsbCount")?;
        let count = unsafe { get_usb_count() };
        log::info!("Found {count} USB device(s)");
        Ok(count.max(0) as usize)
    }

    fn open(&mut self, index: usize) -> Result<(), DriverError> {
        let open_device: Symbol<unsafe extern "C" fn(c_int) -> c_int> =
            self.symbol("SWHid_OpenDevice")?;
        if unsafe { open_device(index as c_int) } != 1 {
            return Err(DriverError::OpenFailed(index));
        }
        self.opened = true;
        log::info!("Opened RFID reader at index {index}");
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        let clear_tag_buf: Symbol<unsafe extern "C" fn() -> c_int> =
            self.symbol("SWHid_ClearTagBuf")?;
        let start_read: Symbol<unsafe extern "C" fn() -> c_int> =
            self.symbol("SWHid_StartRead")?;

        unsafe { clear_tag_buf() };
        if unsafe { start_read() } != 1 {
            return Err(DriverError::StartFailed);
        }
        self.reading = true;
        log::info!("Started continuous tag reading");
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<TagPacket>, DriverError> {
        let get_tag_buf: Symbol<
            unsafe extern "C" fn(*mut u8, *mut c_int, *mut c_int) -> c_int,
        > = self.symbol("SWHid_GetTagBuf")?;

        let mut buffer = vec![0u8; TAG_BUFFER_SIZE];
        let mut tag_length: c_int = 0;
        let mut tag_number: c_int = 0;

        let ret =
            unsafe { get_tag_buf(buffer.as_mut_ptr(), &mut tag_length, &mut tag_number) };
        log::debug!("GetTagBuf return={ret} tags={tag_number} length={tag_length}");

        match ret {
            // 2 = tags present in the buffer
            2 => Ok(parse_tag_buffer(&buffer, tag_number.max(0) as usize)),
            // 1 = successful read, nothing new
            1 => Ok(Vec::new()),
            other => Err(DriverError::ReadFailed(other)),
        }
    }

    fn shutdown(&mut self) {
        if self.reading {
            if let Ok(stop_read) =
                self.symbol::<unsafe extern "C" fn() -> c_int>("SWHid_StopRead")
            {
                unsafe { stop_read() };
            }
            self.reading = false;
        }
        if self.opened {
            if let Ok(close_device) =
                self.symbol::<unsafe extern "C" fn() -> c_int>("SWHid_CloseDevice")
            {
                unsafe { close_device() };
            }
            self.opened = false;
            log::info!("Reader stopped and device closed");
        }
    }
}

impl Drop for HidDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
