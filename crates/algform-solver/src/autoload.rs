//! §6's `autoload_library()`: probes whether IPOPT's shared library can
//! actually be resolved at runtime, independent of whether this crate
//! itself linked against it at build time (`algform-ipopt-sys/build.rs`
//! already names and links it; this just confirms the dynamic linker
//! can find it on the machine actually running the solve, the same
//! question `original_source/.../ipopt.py`'s `detected_libraries()`/
//! `autoload_library()` answers by trying each OS-default name in turn
//! and logging the first one that loads).

use once_cell::sync::OnceCell;
use std::path::PathBuf;

/// Candidate library names/paths to probe, in trial order, for the
/// running platform. Windows and macOS ship several historical names
/// for the same library (`ipopt-3.dll` alongside `ipopt.dll`); every
/// name in the list is tried until one loads.
fn detected_libraries() -> Vec<PathBuf> {
    let names: &[&str] = if cfg!(target_os = "linux") {
        &["libipopt.so"]
    } else if cfg!(target_os = "macos") {
        &["libipopt.dylib"]
    } else if cfg!(target_os = "windows") {
        &["ipopt-3.dll", "ipopt.dll", "libipopt-3.dll", "libipopt.dll"]
    } else {
        &[]
    };
    names.iter().map(PathBuf::from).collect()
}

static AUTOLOAD_RESULT: OnceCell<Option<PathBuf>> = OnceCell::new();

/// Tries every [`detected_libraries`] candidate with `libloading` until
/// one loads, returning `true` on the first success (the handle itself
/// is dropped — this only answers "is it there", since every real call
/// into IPOPT goes through the statically linked symbols
/// `algform-ipopt-sys` already exposes). Safe to call more than once:
/// only the first call actually probes, later calls replay its result.
pub fn autoload_library() -> bool {
    let result = AUTOLOAD_RESULT.get_or_init(|| {
        for lib in detected_libraries() {
            // SAFETY: loading a shared library by name only maps it
            // into the process and runs its static initializers, which
            // for IPOPT has no observable side effect beyond what
            // linking against it already causes.
            match unsafe { libloading::Library::new(&lib) } {
                Ok(handle) => {
                    tracing::info!(library = %lib.display(), "loaded IPOPT library");
                    drop(handle);
                    return Some(lib);
                }
                Err(err) => {
                    tracing::debug!(library = %lib.display(), error = %err, "candidate IPOPT library did not load");
                }
            }
        }
        None
    });
    result.is_some()
}

/// The library path [`autoload_library`] actually loaded, if any.
pub fn loaded_library() -> Option<&'static PathBuf> {
    AUTOLOAD_RESULT.get().and_then(|r| r.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detected_libraries_is_nonempty_on_supported_platforms() {
        if cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            assert!(!detected_libraries().is_empty());
        }
    }
}
