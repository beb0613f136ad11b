// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bindings to the snap7 client library, resolved at runtime.
//!
//! The shared library is loaded once per process and stays loaded until
//! exit, so the resolved entry points are plain `'static` function
//! pointers. Every other module reaches snap7 through [`Snap7Handle`].

#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_void, CString};

use libloading::Library;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{S7Error, S7Result};
use crate::types::{S7Area, WordLength};

/// Opaque snap7 client object.
pub type S7Object = usize;

/// `errCliInvalidParams`, returned for arguments that do not fit the C types
/// and for buffers too small for the requested transfer.
pub const ERR_INVALID_PARAMS: u32 = 0x0020_0000;

type CliCreate = unsafe extern "system" fn() -> S7Object;
type CliDestroy = unsafe extern "system" fn(client: *mut S7Object) -> c_int;
type CliConnectTo = unsafe extern "system" fn(client: S7Object, address: *const c_char, rack: c_int, slot: c_int) -> c_int;
type CliDisconnect = unsafe extern "system" fn(client: S7Object) -> c_int;
type CliGetConnected = unsafe extern "system" fn(client: S7Object, connected: *mut c_int) -> c_int;
type CliAreaIo = unsafe extern "system" fn(
    client: S7Object,
    area: c_int,
    db_number: c_int,
    start: c_int,
    amount: c_int,
    word_len: c_int,
    data: *mut c_void,
) -> c_int;
type CliParam = unsafe extern "system" fn(client: S7Object, number: c_int, value: *mut c_void) -> c_int;
type CliErrorText = unsafe extern "system" fn(code: c_int, text: *mut c_char, len: c_int) -> c_int;

// =============================================================================
// Library
// =============================================================================

/// Entry points of a loaded snap7 library.
pub struct Snap7Library {
    _library: Library,
    name: String,
    create: CliCreate,
    destroy: CliDestroy,
    connect_to: CliConnectTo,
    disconnect: CliDisconnect,
    get_connected: CliGetConnected,
    read_area: CliAreaIo,
    write_area: CliAreaIo,
    get_param: CliParam,
    set_param: CliParam,
    error_text: CliErrorText,
}

static LIBRARY: OnceCell<Snap7Library> = OnceCell::new();

/// Copies an entry point out of `library`.
///
/// # Safety
///
/// `T` must be the exact function type of the symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T, libloading::Error> {
    library.get::<T>(name).map(|s| *s)
}

impl Snap7Library {
    /// Returns the process-wide library, loading it on first use.
    ///
    /// `path` overrides the platform name of the library (`libsnap7.so`,
    /// `snap7.dll`, `libsnap7.dylib`). Only the first successful load
    /// counts; later paths are ignored.
    pub fn get(path: Option<&str>) -> S7Result<&'static Snap7Library> {
        let library = LIBRARY.get_or_try_init(|| Self::load(path))?;
        if let Some(path) = path.filter(|p| *p != library.name) {
            debug!(requested = path, loaded = %library.name, "snap7 already loaded, ignoring path");
        }
        Ok(library)
    }

    fn load(path: Option<&str>) -> S7Result<Self> {
        let name = match path {
            Some(path) => path.to_string(),
            None => libloading::library_filename("snap7").to_string_lossy().into_owned(),
        };
        let load_error = |e: libloading::Error| S7Error::DriverLoad {
            library: name.clone(),
            message: e.to_string(),
        };

        // SAFETY: snap7 has no load-time initialisers with preconditions.
        let library = unsafe { Library::new(&name) }.map_err(load_error)?;

        // SAFETY: the symbol types match the declarations in snap7.h and the
        // pointers stay valid because the library is never unloaded.
        let loaded = unsafe {
            Self {
                create: symbol(&library, b"Cli_Create\0").map_err(load_error)?,
                destroy: symbol(&library, b"Cli_Destroy\0").map_err(load_error)?,
                connect_to: symbol(&library, b"Cli_ConnectTo\0").map_err(load_error)?,
                disconnect: symbol(&library, b"Cli_Disconnect\0").map_err(load_error)?,
                get_connected: symbol(&library, b"Cli_GetConnected\0").map_err(load_error)?,
                read_area: symbol(&library, b"Cli_ReadArea\0").map_err(load_error)?,
                write_area: symbol(&library, b"Cli_WriteArea\0").map_err(load_error)?,
                get_param: symbol(&library, b"Cli_GetParam\0").map_err(load_error)?,
                set_param: symbol(&library, b"Cli_SetParam\0").map_err(load_error)?,
                error_text: symbol(&library, b"Cli_ErrorText\0").map_err(load_error)?,
                _library: library,
                name: name.clone(),
            }
        };
        info!(library = %name, "Loaded snap7 library");
        Ok(loaded)
    }

    /// Library path or name it was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text for a native error code.
    pub fn error_text(&self, code: u32) -> String {
        let mut buffer = [0u8; 256];
        // SAFETY: snap7 writes at most `len` bytes, NUL-terminated.
        unsafe {
            (self.error_text)(code as c_int, buffer.as_mut_ptr().cast(), buffer.len() as c_int);
        }
        let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
        String::from_utf8_lossy(&buffer[..end]).into_owned()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// One snap7 client object, destroyed on drop.
pub struct Snap7Handle {
    library: &'static Snap7Library,
    object: S7Object,
}

/// Converts a snap7 return value into a result.
fn check(code: c_int) -> Result<(), u32> {
    match code as u32 {
        0 => Ok(()),
        code => Err(code),
    }
}

fn to_c_int<T: TryInto<c_int>>(value: T) -> Result<c_int, u32> {
    value.try_into().map_err(|_| ERR_INVALID_PARAMS)
}

/// Converts the start and amount of an area call, refusing transfers that
/// do not fit in `available` bytes.
fn transfer_args(
    area: S7Area,
    word_len: WordLength,
    start: u32,
    amount: u32,
    available: usize,
) -> Result<(c_int, c_int), u32> {
    match area.transfer_len(word_len, amount) {
        Some(needed) if needed <= available => Ok((to_c_int(start)?, to_c_int(amount)?)),
        _ => Err(ERR_INVALID_PARAMS),
    }
}

impl Snap7Handle {
    /// Creates a client object.
    pub fn new(library: &'static Snap7Library) -> S7Result<Self> {
        // SAFETY: Cli_Create has no preconditions.
        let object = unsafe { (library.create)() };
        if object == 0 {
            return Err(S7Error::client("Cli_Create returned a null client"));
        }
        Ok(Self { library, object })
    }

    /// Library this handle belongs to.
    pub fn library(&self) -> &'static Snap7Library {
        self.library
    }

    /// `Cli_ConnectTo`.
    pub fn connect_to(&mut self, host: &str, rack: u16, slot: u16) -> Result<(), u32> {
        let address = CString::new(host).map_err(|_| ERR_INVALID_PARAMS)?;
        // SAFETY: `address` outlives the call.
        check(unsafe {
            (self.library.connect_to)(self.object, address.as_ptr(), c_int::from(rack), c_int::from(slot))
        })
    }

    /// `Cli_Disconnect`.
    pub fn disconnect(&mut self) -> Result<(), u32> {
        // SAFETY: the object is live until drop.
        check(unsafe { (self.library.disconnect)(self.object) })
    }

    /// `Cli_GetConnected`.
    pub fn is_connected(&mut self) -> bool {
        let mut connected: c_int = 0;
        // SAFETY: `connected` is a valid out pointer.
        let code = unsafe { (self.library.get_connected)(self.object, &mut connected) };
        code == 0 && connected != 0
    }

    /// `Cli_ReadArea` into `buffer`.
    ///
    /// Fails with [`ERR_INVALID_PARAMS`] when `buffer` cannot hold `amount`
    /// items of the word length.
    pub fn read_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        amount: u32,
        word_len: WordLength,
        buffer: &mut [u8],
    ) -> Result<(), u32> {
        let (start, amount) = transfer_args(area, word_len, start, amount, buffer.len())?;
        // SAFETY: `buffer` covers the whole transfer, checked above.
        check(unsafe {
            (self.library.read_area)(
                self.object,
                area.code(),
                c_int::from(db),
                start,
                amount,
                word_len.code(),
                buffer.as_mut_ptr().cast(),
            )
        })
    }

    /// `Cli_WriteArea` from `data`.
    ///
    /// Fails with [`ERR_INVALID_PARAMS`] when `data` is shorter than
    /// `amount` items of the word length.
    pub fn write_area(
        &mut self,
        area: S7Area,
        db: u16,
        start: u32,
        amount: u32,
        word_len: WordLength,
        data: &[u8],
    ) -> Result<(), u32> {
        let (start, amount) = transfer_args(area, word_len, start, amount, data.len())?;
        // snap7 takes a mutable pointer but only reads from it
        let mut data = data.to_vec();
        // SAFETY: `data` covers the whole transfer, checked above.
        check(unsafe {
            (self.library.write_area)(
                self.object,
                area.code(),
                c_int::from(db),
                start,
                amount,
                word_len.code(),
                data.as_mut_ptr().cast(),
            )
        })
    }

    /// `Cli_GetParam` with a value of `size` bytes (2 or 4).
    pub fn get_param(&mut self, number: i32, size: usize) -> Result<i64, u32> {
        let mut value = [0u8; 4];
        // SAFETY: `value` has room for the largest parameter type.
        check(unsafe { (self.library.get_param)(self.object, number, value.as_mut_ptr().cast()) })?;
        Ok(match size {
            2 => i64::from(u16::from_ne_bytes([value[0], value[1]])),
            _ => i64::from(i32::from_ne_bytes(value)),
        })
    }

    /// `Cli_SetParam` with `value` already range-checked for its type.
    pub fn set_param(&mut self, number: i32, size: usize, value: i64) -> Result<(), u32> {
        let mut bytes = [0u8; 4];
        match size {
            2 => bytes[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
            _ => bytes.copy_from_slice(&(value as u32).to_ne_bytes()),
        }
        // SAFETY: `bytes` holds a value of the parameter's type.
        check(unsafe { (self.library.set_param)(self.object, number, bytes.as_mut_ptr().cast()) })
    }
}

impl Drop for Snap7Handle {
    fn drop(&mut self) {
        // SAFETY: the object was created by Cli_Create and is destroyed once.
        unsafe {
            (self.library.destroy)(&mut self.object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert_eq!(check(0), Ok(()));
        assert_eq!(check(0x0009), Err(9));
    }

    #[test]
    fn test_int_conversion() {
        assert_eq!(to_c_int(10u32), Ok(10));
        assert_eq!(to_c_int(u32::MAX), Err(ERR_INVALID_PARAMS));
    }

    #[test]
    fn test_transfer_must_fit_buffer() {
        assert_eq!(
            transfer_args(S7Area::DataBlock, WordLength::Byte, 0, 100, 1),
            Err(ERR_INVALID_PARAMS)
        );
        assert_eq!(
            transfer_args(S7Area::DataBlock, WordLength::Real, 4, 2, 7),
            Err(ERR_INVALID_PARAMS)
        );
        assert_eq!(
            transfer_args(S7Area::Timers, WordLength::Byte, 0, 2, 2),
            Err(ERR_INVALID_PARAMS)
        );
        assert_eq!(transfer_args(S7Area::DataBlock, WordLength::Real, 4, 2, 8), Ok((4, 2)));
        assert_eq!(transfer_args(S7Area::Marks, WordLength::Bit, 67, 1, 1), Ok((67, 1)));
        assert_eq!(
            transfer_args(S7Area::DataBlock, WordLength::Byte, u32::MAX, 1, 1),
            Err(ERR_INVALID_PARAMS)
        );
    }

    #[test]
    fn test_missing_library_is_driver_load() {
        let err = Snap7Library::load(Some("/nonexistent/libsnap7-missing.so"))
            .err()
            .unwrap();
        assert!(matches!(err, S7Error::DriverLoad { .. }));
    }
}
