//! Raw `extern "C"` bindings to `libtcc.h`, the subset
//! `algform-jit::tcc_jit` needs to compile a C-text translation unit and
//! resolve symbols in-process. Mirrors `algform-ipopt-sys`'s split of a
//! thin, unsafe `lib.rs` against a safe `wrapper.rs`.

#![allow(non_camel_case_types)]

pub mod wrapper;
pub use wrapper::{TccCompiler, TccError, TccResult};

use std::os::raw::{c_char, c_int, c_void};

/// Opaque TinyCC compiler state. Never constructed on the Rust side;
/// only ever seen behind a `*mut TCCState` returned by [`tcc_new`].
#[repr(C)]
pub struct TCCState {
    _private: [u8; 0],
}

pub const TCC_OUTPUT_MEMORY: c_int = 1;
pub const TCC_OUTPUT_EXE: c_int = 2;
pub const TCC_OUTPUT_DLL: c_int = 3;
pub const TCC_OUTPUT_OBJ: c_int = 4;

/// Passed to [`tcc_relocate`] to have TinyCC allocate and manage the
/// executable memory itself.
pub const TCC_RELOCATE_AUTO: *mut c_void = 1 as *mut c_void;

extern "C" {
    pub fn tcc_new() -> *mut TCCState;
    pub fn tcc_delete(s: *mut TCCState);

    pub fn tcc_set_lib_path(s: *mut TCCState, path: *const c_char);
    pub fn tcc_set_options(s: *mut TCCState, str_: *const c_char) -> c_int;
    pub fn tcc_set_error_func(
        s: *mut TCCState,
        error_opaque: *mut c_void,
        error_func: extern "C" fn(*mut c_void, *const c_char),
    );

    pub fn tcc_add_include_path(s: *mut TCCState, pathname: *const c_char) -> c_int;
    pub fn tcc_add_sysinclude_path(s: *mut TCCState, pathname: *const c_char) -> c_int;
    pub fn tcc_add_library_path(s: *mut TCCState, pathname: *const c_char) -> c_int;
    pub fn tcc_add_library(s: *mut TCCState, libraryname: *const c_char) -> c_int;
    pub fn tcc_add_symbol(s: *mut TCCState, name: *const c_char, val: *const c_void) -> c_int;

    pub fn tcc_set_output_type(s: *mut TCCState, output_type: c_int) -> c_int;
    pub fn tcc_compile_string(s: *mut TCCState, buf: *const c_char) -> c_int;
    pub fn tcc_relocate(s: *mut TCCState, ptr: *mut c_void) -> c_int;
    pub fn tcc_get_symbol(s: *mut TCCState, name: *const c_char) -> *mut c_void;
}
