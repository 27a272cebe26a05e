//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the relay core against
//! mock adapters.  All tests run on the host (x86_64) with no radio or
//! flash required.

mod controller_tests;
