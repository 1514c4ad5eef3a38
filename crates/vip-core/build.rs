/// Builds the gRPC client and server code for the `vip.proto` definition using
/// `tonic-prost-build`.
///
/// The generated module is exposed as `vip_core::proto`, and a file descriptor
/// set is written next to it so the server can publish the schema through
/// gRPC reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/vip.proto`
/// - Includes: `proto/`
/// - Descriptor: `$OUT_DIR/vip_descriptor.bin`
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or code generation fails. Both abort the build,
/// which is the desired outcome for a build script.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("vip_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/vip.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/vip.proto"], &["proto"])
        .unwrap();
}
