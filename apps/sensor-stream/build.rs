//! Build Script for Sensor Stream
//!
//! Generates Rust protobuf stubs from workspace proto definitions.
//!
//! # Panics Policy
//!
//! Build scripts use `.expect()` and panic on failure: a missing or
//! malformed proto definition must halt the build, and there is no caller
//! to propagate errors to.
#![allow(clippy::expect_used)]

use std::{env, path::PathBuf};

fn main() {
    // Rerun build script if it changes
    println!("cargo:rerun-if-changed=build.rs");

    // Rerun if proto files change
    println!("cargo:rerun-if-changed=../../packages/proto/sensor/");

    // Emit cfg for coverage detection
    if env::var("CARGO_LLVM_COV").is_ok()
        || env::var("LLVM_PROFILE_FILE").is_ok()
        || env::var("RUSTFLAGS")
            .map(|f| f.contains("instrument-coverage"))
            .unwrap_or(false)
    {
        println!("cargo:rustc-cfg=coverage");
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let proto_root = manifest_dir.join("../../packages/proto");
    let proto_files = ["sensor/v1/sensor_stream.proto"];

    for proto in &proto_files {
        println!("cargo:rerun-if-changed={}", proto_root.join(proto).display());
    }

    // Use protox to produce a file descriptor set (avoids requiring protoc in PATH).
    let mut compiler =
        protox::Compiler::new([&proto_root]).expect("Failed to set up protox include path");
    compiler
        .include_imports(true)
        .open_files(proto_files)
        .expect("Failed to compile proto definitions with protox");
    let fds = compiler.file_descriptor_set();

    tonic_prost_build::configure()
        .build_client(true) // Enable client for integration tests
        .build_server(true)
        .compile_fds(fds)
        .expect("Failed to compile protobuf definitions");
}
