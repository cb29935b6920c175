//! 测试支持 crate
//!
//! 提供 Mock 实现和测试工具。
//!
//! 这里不依赖 `mmu` crate（避免循环依赖），`mmu` 在 `cfg(test)` 下为
//! 这些类型实现自己的 trait。

pub mod logger;
pub mod mock;
