//! Workspace-level integration specs: exercises the built binaries against
//! each other (or a mock) end-to-end rather than a single crate's unit
//! tests.

mod support;

mod cli;
