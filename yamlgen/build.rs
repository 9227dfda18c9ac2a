/*!

The `Horreum` custom resource definition is modeled as Rust structs in the model crate. Here we
generate the corresponding k8s yaml file, which is needed to install the CRD before the controller
runs. Crates that depend on this file can add yamlgen as a dependency to ensure it is current.
Scripts can call `cargo build --package yamlgen`.

!*/

use horreum_model::Horreum;
use kube::CustomResourceExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const YAMLGEN_DIR: &str = env!("CARGO_MANIFEST_DIR");
const HEADER: &str = "# This file is generated. Do not edit.\n";

fn main() {
    // Re-run this build script if the model changes.
    println!("cargo:rerun-if-changed=../model/src");

    let dir = PathBuf::from(YAMLGEN_DIR).join("deploy");
    fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("unable to create '{}': {}", dir.display(), e));
    let path = dir.join("horreum-crd.yaml");

    let mut f = File::create(&path)
        .unwrap_or_else(|e| panic!("unable to open file '{}' for writing: {}", path.display(), e));

    f.write_all(HEADER.as_bytes())
        .expect("unable to write file header");
    serde_yaml::to_writer(&f, &Horreum::crd()).expect("unable to write Horreum CRD");
}
