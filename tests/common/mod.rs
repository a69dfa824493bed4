//! Common test utilities for interface tests.

use std::path::PathBuf;

use cxxi::{CxxInterface, InterfaceOptions, LanguageVariant};
use tempfile::TempDir;

/// Target every layout expectation in these tests is written for.
pub const LINUX64: &str = "x86_64-unknown-linux-gnu";

/// Write `source` to `name` inside a fresh temporary directory.
#[allow(dead_code)]
pub fn write_header(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).expect("Failed to write header");
    path
}

#[allow(dead_code)]
pub fn options(language: LanguageVariant) -> InterfaceOptions {
    InterfaceOptions::new(language).with_target(LINUX64.parse().expect("Invalid triple"))
}

/// Build a C++ interface over `source`. The directory must outlive it.
#[allow(dead_code)]
pub fn interface(source: &str) -> (TempDir, CxxInterface) {
    interface_with(LanguageVariant::Cxx, source)
}

#[allow(dead_code)]
pub fn interface_with(language: LanguageVariant, source: &str) -> (TempDir, CxxInterface) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let header = write_header(&dir, "test.h", source);
    let interface = CxxInterface::open(&header, options(language)).expect("Failed to build unit");
    (dir, interface)
}
