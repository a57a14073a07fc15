pub mod compare;
pub mod diagnostics;
pub mod log;
pub mod scan;
