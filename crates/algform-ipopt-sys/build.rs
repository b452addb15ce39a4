//! Build script for algform-ipopt-sys.
//!
//! Links against IPOPT with the following priority, mirroring
//! `algform-tcc-sys/build.rs`:
//! 1. Pre-built libraries from vendor/local (preferred for CI reproducibility)
//! 2. System IPOPT via pkg-config (fallback for user convenience)
//!
//! # Installing IPOPT
//!
//! - Ubuntu/Debian: `sudo apt install coinor-libipopt-dev`
//! - macOS: `brew install ipopt`

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

    if try_system_ipopt() {
        return;
    }

    panic!(
        "IPOPT not found!\n\n\
         Options to install IPOPT:\n\
         1. Install system package:\n\
            - Ubuntu: sudo apt install coinor-libipopt-dev\n\
            - macOS: brew install ipopt\n\
         2. Place a pre-built IPOPT in vendor/local/{{lib,include/coin-or}}\n"
    );
}

fn try_vendor_local(vendor_local: &PathBuf) -> bool {
    let lib_dir = vendor_local.join("lib");
    let include_dir = vendor_local.join("include/coin-or");

    let has_shared = lib_dir.join("libipopt.so").exists() || lib_dir.join("libipopt.dylib").exists();
    let has_static = lib_dir.join("libipopt.a").exists();

    if !has_shared && !has_static {
        return false;
    }
    if !include_dir.join("IpStdCInterface.h").exists() {
        println!("cargo:warning=IPOPT library found but headers missing in vendor/local");
        return false;
    }

    println!("cargo:warning=Using IPOPT from {}", vendor_local.display());
    println!("cargo:rustc-link-search=native={}", lib_dir.display());

    if has_shared {
        println!("cargo:rustc-link-lib=ipopt");
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
    } else {
        println!("cargo:rustc-link-lib=static=ipopt");
        emit_static_deps(&lib_dir);
    }
    true
}

fn emit_static_deps(lib_dir: &PathBuf) {
    if lib_dir.join("libcoinmumps.a").exists() {
        println!("cargo:rustc-link-lib=static=coinmumps");
    }
    if lib_dir.join("libcoinmetis.a").exists() {
        println!("cargo:rustc-link-lib=static=coinmetis");
    }
    println!("cargo:rustc-link-lib=lapack");
    println!("cargo:rustc-link-lib=blas");
    println!("cargo:rustc-link-lib=gfortran");
    println!("cargo:rustc-link-lib=m");
    println!("cargo:rustc-link-lib=dl");

    #[cfg(target_os = "linux")]
    println!("cargo:rustc-link-lib=stdc++");
    #[cfg(target_os = "macos")]
    println!("cargo:rustc-link-lib=c++");
}

fn try_system_ipopt() -> bool {
    let output = Command::new("pkg-config").args(["--libs", "--cflags", "ipopt"]).output();
    let output = match output {
        Ok(o) if o.status.success() => o,
        _ => return false,
    };

    let flags = String::from_utf8_lossy(&output.stdout);
    println!("cargo:warning=Using system IPOPT via pkg-config");
    for flag in flags.split_whitespace() {
        if let Some(lib) = flag.strip_prefix("-l") {
            println!("cargo:rustc-link-lib={}", lib);
        } else if let Some(path) = flag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={}", path);
        }
    }
    true
}
