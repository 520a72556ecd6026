pub mod format;
pub mod ops;
pub mod round;
pub mod sort;
