//! Workspace-level integration tests and benchmarks for `lease-lock`.
//!
//! The library itself is empty; see `tests/` and `benches/`.
