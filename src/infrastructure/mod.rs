pub mod locks;
pub mod logging;
pub mod storage;
