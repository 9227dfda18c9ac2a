/*!

This crate is used to write out the YAML representation of the `Horreum` CRD to
`yamlgen/deploy/horreum-crd.yaml`. Install it with `kubectl apply -f` before starting the
controller.

This `lib.rs` file is intentionally empty as `yamlgen` provides a `build.rs` that is invoked during
builds of other crates that specify `yamlgen` as a dependency.

!*/
