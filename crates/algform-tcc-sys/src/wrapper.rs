//! Safe wrapper over [`crate::TCCState`]: owns the FFI handle, exposes a
//! method surface that returns [`Result`], frees the handle in `Drop` —
//! the same "own the handle, wrap every call, `Drop` frees it" shape as
//! the IPOPT FFI wrapper in `algform-ipopt-sys`.

use crate::{
    tcc_add_include_path, tcc_add_library, tcc_add_library_path, tcc_add_symbol, tcc_compile_string,
    tcc_delete, tcc_get_symbol, tcc_new, tcc_relocate, tcc_set_error_func, tcc_set_output_type,
    TCCState, TCC_OUTPUT_MEMORY, TCC_RELOCATE_AUTO,
};
use std::ffi::{c_void, CStr, CString};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum TccError {
    #[error("failed to create a TCC compiler state")]
    StateCreationFailed,
    #[error("failed to add include path {0:?}")]
    AddIncludePath(String),
    #[error("failed to add library path {0:?}")]
    AddLibraryPath(String),
    #[error("failed to add library {0:?}")]
    AddLibrary(String),
    #[error("failed to set memory output mode")]
    SetOutputType,
    #[error("compilation failed: {0}")]
    CompileFailed(String),
    #[error("relocation failed: {0}")]
    RelocateFailed(String),
    #[error("symbol {0:?} not found after compilation")]
    SymbolNotFound(String),
}

pub type TccResult<T> = Result<T, TccError>;

/// Accumulates error/warning lines libtcc reports through its
/// `error_func` callback, keyed on the instance via the opaque pointer.
static ERROR_SINK: Mutex<Vec<String>> = Mutex::new(Vec::new());

extern "C" fn collect_error(_opaque: *mut c_void, msg: *const std::os::raw::c_char) {
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned();
    if let Ok(mut sink) = ERROR_SINK.lock() {
        sink.push(text);
    }
}

fn drain_errors() -> String {
    ERROR_SINK
        .lock()
        .map(|mut sink| sink.drain(..).collect::<Vec<_>>().join("; "))
        .unwrap_or_default()
}

/// One in-process TinyCC compiler instance, configured for
/// `TCC_OUTPUT_MEMORY` (JIT) output. Compiling twice into the same
/// instance is not supported by libtcc; callers needing to recompile
/// build a fresh [`TccCompiler`] per translation unit, matching
/// `TCCJITCompiler.create_instance()` in `jit_c.py`.
pub struct TccCompiler {
    state: *mut TCCState,
    relocated: bool,
    /// Keeps extra-library `CString`s alive for the lifetime of the
    /// compiler instance, since `tcc_add_library` only borrows the bytes.
    _retained: Vec<CString>,
}

// SAFETY: libtcc serializes access to a given TCCState internally; we
// never expose `&TccCompiler` across threads without synchronization at
// a higher level (the JIT module owns one compiler per compile).
unsafe impl Send for TccCompiler {}

impl TccCompiler {
    pub fn new() -> TccResult<Self> {
        let state = unsafe { tcc_new() };
        if state.is_null() {
            return Err(TccError::StateCreationFailed);
        }
        unsafe {
            tcc_set_error_func(state, std::ptr::null_mut(), collect_error);
            if tcc_set_output_type(state, TCC_OUTPUT_MEMORY) < 0 {
                tcc_delete(state);
                return Err(TccError::SetOutputType);
            }
        }
        Ok(TccCompiler {
            state,
            relocated: false,
            _retained: Vec::new(),
        })
    }

    pub fn add_include_path(&mut self, path: &str) -> TccResult<()> {
        let c = CString::new(path).map_err(|_| TccError::AddIncludePath(path.to_string()))?;
        let rc = unsafe { tcc_add_include_path(self.state, c.as_ptr()) };
        if rc < 0 {
            return Err(TccError::AddIncludePath(path.to_string()));
        }
        Ok(())
    }

    pub fn add_library_path(&mut self, path: &str) -> TccResult<()> {
        let c = CString::new(path).map_err(|_| TccError::AddLibraryPath(path.to_string()))?;
        let rc = unsafe { tcc_add_library_path(self.state, c.as_ptr()) };
        if rc < 0 {
            return Err(TccError::AddLibraryPath(path.to_string()));
        }
        Ok(())
    }

    pub fn add_library(&mut self, name: &str) -> TccResult<()> {
        let c = CString::new(name).map_err(|_| TccError::AddLibrary(name.to_string()))?;
        let rc = unsafe { tcc_add_library(self.state, c.as_ptr()) };
        self._retained.push(c);
        if rc < 0 {
            return Err(TccError::AddLibrary(name.to_string()));
        }
        Ok(())
    }

    /// Binds a host function pointer as a symbol visible to compiled
    /// code, used for e.g. the `azmul`/`sign` prelude if a caller prefers
    /// linking them rather than recompiling their C source each time.
    pub fn add_symbol(&mut self, name: &str, addr: *const c_void) -> TccResult<()> {
        let c = CString::new(name).map_err(|_| TccError::AddLibrary(name.to_string()))?;
        let rc = unsafe { tcc_add_symbol(self.state, c.as_ptr(), addr) };
        self._retained.push(c);
        if rc < 0 {
            return Err(TccError::AddLibrary(name.to_string()));
        }
        Ok(())
    }

    pub fn compile_string(&mut self, source: &str) -> TccResult<()> {
        drain_errors();
        let c = CString::new(source).map_err(|_| TccError::CompileFailed("source contains a NUL byte".into()))?;
        let rc = unsafe { tcc_compile_string(self.state, c.as_ptr()) };
        if rc != 0 {
            return Err(TccError::CompileFailed(drain_errors()));
        }
        Ok(())
    }

    /// Allocates and links executable memory for the compiled code.
    /// Must be called exactly once, after `compile_string`, before any
    /// `get_symbol` call.
    pub fn relocate(&mut self) -> TccResult<()> {
        drain_errors();
        let rc = unsafe { tcc_relocate(self.state, TCC_RELOCATE_AUTO) };
        if rc < 0 {
            return Err(TccError::RelocateFailed(drain_errors()));
        }
        self.relocated = true;
        Ok(())
    }

    /// Resolves a compiled symbol to its in-process function pointer.
    /// Valid only as long as `self` stays alive.
    pub fn get_symbol(&self, name: &str) -> TccResult<*mut c_void> {
        debug_assert!(self.relocated, "get_symbol called before relocate()");
        let c = CString::new(name).map_err(|_| TccError::SymbolNotFound(name.to_string()))?;
        let ptr = unsafe { tcc_get_symbol(self.state, c.as_ptr()) };
        if ptr.is_null() {
            return Err(TccError::SymbolNotFound(name.to_string()));
        }
        Ok(ptr)
    }
}

impl Drop for TccCompiler {
    fn drop(&mut self) {
        unsafe { tcc_delete(self.state) };
    }
}
