pub mod runtime;
pub mod signals;
