//! 内存空间模块
//!
//! 本模块把翻译管理器与物理内存组合起来，执行读、写、可视化请求，
//! 包括跨页的多字节读写。

mod phys;
mod space;

pub use phys::{PhysMem, Ram};
pub use space::*;
