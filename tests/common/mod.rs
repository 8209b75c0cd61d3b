#![allow(unused_macros, unused_imports)]

macro_rules! assert_forced {
    ($cell:expr, $v:expr) => {{
        match $cell.force() {
            Ok(v) => assert_eq!(*v, $v, "Cell forced to an unexpected value"),
            Err(e) => panic!("Force failed: {e:?}"),
        }
    }};
}
pub(crate) use assert_forced;

macro_rules! assert_force_fails {
    ($cell:expr, $e:expr) => {{
        match $cell.force() {
            Err(deferred::ForceError::Computation(e)) => assert_eq!(*e, $e),
            other => panic!("Expected a computation error, got {other:?}"),
        }
    }};
}
pub(crate) use assert_force_fails;
