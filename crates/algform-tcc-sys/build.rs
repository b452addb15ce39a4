//! Build script for algform-tcc-sys.
//!
//! Links against libtcc with the following priority, mirroring
//! `algform-ipopt-sys/build.rs`:
//! 1. Pre-built libraries from vendor/local (preferred for CI reproducibility)
//! 2. System libtcc via pkg-config (fallback for user convenience)
//!
//! # Installing libtcc
//!
//! - Ubuntu/Debian: `sudo apt install libtcc-dev` (or build TinyCC from
//!   source if the distro doesn't package the dev headers)
//! - macOS: `brew install tinycc` (or build from source)

use std::path::PathBuf;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    let workspace_root = manifest_dir.parent().unwrap().parent().unwrap();
    let vendor_local = workspace_root.join("vendor/local");

    if try_vendor_local(&vendor_local) {
        return;
    }

    if try_system_tcc() {
        return;
    }

    panic!(
        "libtcc not found!\n\n\
         Options to install libtcc:\n\
         1. Install system package:\n\
            - Ubuntu: sudo apt install libtcc-dev\n\
            - macOS: brew install tinycc\n\
         2. Place a pre-built libtcc in vendor/local/{{lib,include}}\n"
    );
}

fn try_vendor_local(vendor_local: &PathBuf) -> bool {
    let lib_dir = vendor_local.join("lib");
    let include_dir = vendor_local.join("include");

    let has_shared = lib_dir.join("libtcc.so").exists() || lib_dir.join("libtcc.dylib").exists();
    let has_static = lib_dir.join("libtcc.a").exists();

    if !has_shared && !has_static {
        return false;
    }
    if !include_dir.join("libtcc.h").exists() {
        println!("cargo:warning=libtcc library found but libtcc.h missing in vendor/local");
        return false;
    }

    println!("cargo:warning=Using libtcc from {}", vendor_local.display());
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    if has_shared {
        println!("cargo:rustc-link-lib=tcc");
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
    } else {
        println!("cargo:rustc-link-lib=static=tcc");
        println!("cargo:rustc-link-lib=dl");
        println!("cargo:rustc-link-lib=pthread");
    }
    true
}

fn try_system_tcc() -> bool {
    let output = Command::new("pkg-config").args(["--libs", "--cflags", "libtcc"]).output();
    let output = match output {
        Ok(o) if o.status.success() => o,
        _ => return false,
    };

    let flags = String::from_utf8_lossy(&output.stdout);
    println!("cargo:warning=Using system libtcc via pkg-config");
    for flag in flags.split_whitespace() {
        if let Some(lib) = flag.strip_prefix("-l") {
            println!("cargo:rustc-link-lib={}", lib);
        } else if let Some(path) = flag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={}", path);
        }
    }
    true
}
