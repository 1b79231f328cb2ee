// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Build script for quarry-proto.
//
// Compiles proto/quarry.proto into message types plus client and server
// stubs. A vendored protoc is used unless PROTOC is already set.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    println!("cargo:rerun-if-changed=proto/quarry.proto");
    tonic_prost_build::compile_protos("proto/quarry.proto")?;
    Ok(())
}
