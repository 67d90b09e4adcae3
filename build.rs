//! Build script for detecting system dependencies and providing installation guidance.
//!
//! The `opencv` crate links against a system OpenCV found through
//! pkg-config; the monitor needs its imgproc, videoio and highgui modules.

use std::env;
use std::process::Command;

const OPENCV_PACKAGES: [&str; 2] = ["opencv4", "opencv"];
const REQUIRED_MODULES: [&str; 3] = ["opencv_imgproc", "opencv_videoio", "opencv_highgui"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_PATHS");
    println!("cargo:rerun-if-env-changed=OPENCV_INCLUDE_PATHS");

    if !check_pkg_config() {
        return;
    }

    match find_opencv() {
        Some(package) => check_modules(package),
        None => {
            println!("cargo:warning=OpenCV not found via pkg-config. Make sure OpenCV is installed.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
            println!("cargo:warning=On macOS: brew install opencv");
            println!("cargo:warning=On Fedora: sudo dnf install opencv-devel");
        }
    }

    println!("cargo:rustc-env=BUILD_TARGET={}", env::var("TARGET").unwrap_or_default());
}

fn pkg_config(args: &[&str]) -> Option<String> {
    let output = Command::new("pkg-config").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn check_pkg_config() -> bool {
    if pkg_config(&["--version"]).is_some() {
        return true;
    }
    println!("cargo:warning=pkg-config not found. This is required to find OpenCV.");
    println!("cargo:warning=On Ubuntu: sudo apt-get install pkg-config");
    println!("cargo:warning=On macOS: brew install pkg-config");
    false
}

fn find_opencv() -> Option<&'static str> {
    OPENCV_PACKAGES.into_iter().find(|package| {
        pkg_config(&["--modversion", package]).is_some_and(|version| {
            println!("cargo:warning=Found OpenCV version: {version}");
            true
        })
    })
}

fn check_modules(package: &str) {
    let libs = pkg_config(&["--libs", package]).unwrap_or_default();
    for module in REQUIRED_MODULES {
        if !libs.contains(module) {
            println!("cargo:warning=OpenCV module {module} not listed by pkg-config; camera or window features may fail to link");
        }
    }
}
