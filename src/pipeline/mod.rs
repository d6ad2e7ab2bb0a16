pub mod batch;
pub mod builder;
pub mod defaults;
pub mod runtime;
pub mod storage;
pub mod traits;
