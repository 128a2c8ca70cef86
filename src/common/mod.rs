//! Scene files shared by the runner and the tests.

pub mod scene;
