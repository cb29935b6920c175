//! 页表模块
//!
//! 本模块定义翻译结构的统一接口 [`PageTable`]，以及三种实现：
//!
//! - [`HierarchicalTable`]：固定深度的多级目录树，中间表按需分配
//! - [`InvertedTable`]：`(pid, vpn)` 哈希到固定数量的桶，链地址法解决冲突
//! - [`LinearTable`]：每个进程一张平坦数组
//!
//! ## 设计要点
//!
//! - 上层（[`crate::Mmu`]）只依赖该 trait，不关心具体结构。
//! - [`PageTable::walk`] 是唯一的读路径；[`PageTable::lookup`] 和可视化都经过它。
//! - [`PageTable::resolve`] 是唯一调用帧分配器的路径。驱逐发生时先作废本结构中
//!   牺牲者的项，再把驱逐通知转交给调用方（用于作废 TLB）。
mod entry;
mod hierarchical;
mod inverted;
mod linear;

pub use entry::{PageTableEntry, PteFlags};
pub use hierarchical::HierarchicalTable;
pub use inverted::InvertedTable;
pub use linear::LinearTable;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::address::{Pfn, TranslationKey};
use crate::config::TableScheme;
use crate::error::MmuResult;
use crate::frame_allocator::{Eviction, FrameAllocator};
use crate::lru::Tick;
use crate::trace::{NoTrace, TraceSink};

/// [`PageTable::resolve`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// 映射到的帧
    pub pfn: Pfn,
    /// 本次是否发生了缺页（新分配了帧）
    pub page_fault: bool,
    /// 为腾出帧而发生的驱逐
    pub evicted: Option<Eviction>,
}

/// 翻译结构接口
pub trait PageTable {
    /// 结构名称
    fn kind(&self) -> &'static str;

    /// 检查键是否在结构可表示的地址空间内
    fn check_bounds(&self, key: TranslationKey) -> MmuResult<()>;

    /// 查找键的有效项，并把经过的决策点记录到 `trace`
    ///
    /// 纯读操作：不分配、不修改任何状态。越界或未映射时返回 `None`。
    fn walk(&self, key: TranslationKey, trace: &mut dyn TraceSink) -> Option<PageTableEntry>;

    /// 为键安装到 `pfn` 的有效映射，必要时分配中间结构
    fn insert(&mut self, key: TranslationKey, pfn: Pfn) -> MmuResult<()>;

    /// 作废键的映射，返回作废前的有效项
    fn invalidate(&mut self, key: TranslationKey) -> Option<PageTableEntry>;

    /// 为有效映射置位标志
    fn insert_flags(&mut self, key: TranslationKey, flags: PteFlags) -> MmuResult<()>;

    /// 所有有效映射
    fn mappings(&self) -> Vec<(TranslationKey, PageTableEntry)>;

    /// 查找键映射的帧
    fn lookup(&self, key: TranslationKey) -> Option<Pfn> {
        self.walk(key, &mut NoTrace).map(|entry| entry.pfn())
    }

    /// 查找键映射的帧；未映射时分配帧并安装映射
    ///
    /// 越界的键在分配任何帧之前被拒绝。
    fn resolve(
        &mut self,
        key: TranslationKey,
        frames: &mut FrameAllocator,
        now: Tick,
        on_evict: &mut dyn FnMut(Eviction),
    ) -> MmuResult<Resolved> {
        self.check_bounds(key)?;
        if let Some(pfn) = self.lookup(key) {
            return Ok(Resolved {
                pfn,
                page_fault: false,
                evicted: None,
            });
        }

        let mut evicted = None;
        let pfn = frames.allocate(key, now, |victim, frame| {
            let stale = self.invalidate(victim);
            debug_assert_eq!(
                stale.map(|entry| entry.pfn()),
                Some(frame),
                "reverse map disagrees with table for {victim}"
            );
            let eviction = Eviction {
                key: victim,
                pfn: frame,
                dirty: stale.is_some_and(|entry| entry.is_dirty()),
            };
            on_evict(eviction);
            evicted = Some(eviction);
        });
        self.insert(key, pfn)?;
        log::debug!("page fault: {} -> frame {}", key, pfn);

        Ok(Resolved {
            pfn,
            page_fault: true,
            evicted,
        })
    }
}

/// 按配置构造翻译结构
pub fn build(scheme: &TableScheme) -> Box<dyn PageTable> {
    match scheme {
        TableScheme::Linear { max_pages } => Box::new(LinearTable::new(*max_pages)),
        TableScheme::Hierarchical { level_bits } => Box::new(HierarchicalTable::new(level_bits)),
        TableScheme::Inverted { buckets, vpn_bits } => {
            Box::new(InvertedTable::new(*buckets, *vpn_bits))
        }
    }
}
