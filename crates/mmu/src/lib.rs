//! MMU 翻译与帧管理引擎
//!
//! 模拟操作系统的内存管理单元：把 `(pid, 虚拟地址)` 翻译为物理地址，
//! 管理有限的物理帧，并在翻译之上提供一个 TLB 快路径。
//!
//! # 组成
//!
//! - [`frame_allocator`]：位图管理物理帧，无空闲帧时按 LRU 驱逐
//! - [`rmap`]：帧与翻译键之间的双向索引
//! - [`page_table`]：翻译结构，[`PageTable`] trait 及层级、倒排、单级三种实现
//! - [`tlb`]：固定容量的 LRU 缓存
//! - [`mmu`]：按 TLB → 页表 → 帧分配器的顺序完成翻译，持有时钟和计数器
//! - [`memory_space`]：组合翻译管理器与物理内存，执行请求流
//!
//! # 示例
//!
//! ```
//! use mmu::{MemorySpace, MmuConfig, Request, Response};
//!
//! let mut space = MemorySpace::new(MmuConfig::two_level_32()).unwrap();
//! space.execute(Request::write(0, 0x1234, 0x5A)).unwrap();
//! assert_eq!(space.execute(Request::read(0, 0x1234)), Ok(Response::Read(0x5A)));
//! ```

#![no_std]

extern crate alloc;

mod config;
mod error;
mod lru;

pub mod address;
pub mod frame_allocator;
pub mod memory_space;
pub mod mmu;
pub mod page_table;
pub mod request;
pub mod rmap;
pub mod tlb;
pub mod trace;

pub use config::{
    DEFAULT_BUCKETS, DEFAULT_PAGE_SIZE, DEFAULT_TLB_CAPACITY, DEFAULT_TOTAL_FRAMES, MmuConfig,
    SINGLE_LEVEL_MAX_PAGES, TableScheme,
};
pub use error::{ConfigError, MmuError, MmuResult};
pub use lru::{LogicalClock, Tick};

// Re-export 常用类型
pub use address::{DEFAULT_PID, PageNum, Paddr, Pfn, Pid, TranslationKey, Vaddr, Vpn, VpnRange};
pub use frame_allocator::{Eviction, FrameAllocator};
pub use memory_space::{MemorySpace, PhysMem, Ram};
pub use mmu::{Access, InvariantViolation, Mmu, MmuStats, Translation};
pub use page_table::{
    HierarchicalTable, InvertedTable, LinearTable, PageTable, PageTableEntry, PteFlags, Resolved,
};
pub use request::{Operation, Request, Response};
pub use tlb::{Tlb, TlbEntry};
pub use trace::{TraceOutcome, TraceSink, TraceStep, TranslationTrace};
