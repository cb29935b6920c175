//! TLB 模块
//!
//! 固定容量的全相联缓存，线性扫描查找，LRU 替换。
//!
//! TLB 中的有效项总是页表有效映射的子集：帧被驱逐时，[`crate::Mmu`]
//! 在同一次翻译中作废牺牲者的 TLB 项，然后才安装新映射。
//! 容量为 0 时 TLB 不起作用：查找总是未命中，安装被忽略。

use alloc::vec;
use alloc::vec::Vec;

use crate::address::{Pfn, TranslationKey};
use crate::lru::{self, Tick};
use crate::trace::{NoTrace, TraceSink, TraceStep};

/// TLB 项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlbEntry {
    /// 翻译键
    pub key: TranslationKey,
    /// 缓存的帧号
    pub pfn: Pfn,
    /// 是否有效
    pub valid: bool,
    /// 最后访问时间
    pub last_access: Tick,
}

/// 翻译后备缓冲
#[derive(Debug, Clone)]
pub struct Tlb {
    slots: Vec<TlbEntry>,
}

impl Tlb {
    /// 创建 `capacity` 个空槽的 TLB
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![TlbEntry::default(); capacity],
        }
    }

    /// 槽位数
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 有效项数
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|entry| entry.valid).count()
    }

    /// 是否没有有效项
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部槽位（含无效槽），用于展示
    pub fn slots(&self) -> &[TlbEntry] {
        &self.slots
    }

    /// 有效项
    pub fn entries(&self) -> impl Iterator<Item = &TlbEntry> + '_ {
        self.slots.iter().filter(|entry| entry.valid)
    }

    fn position(&self, key: TranslationKey) -> Option<usize> {
        self.slots
            .iter()
            .position(|entry| entry.valid && entry.key == key)
    }

    /// 查找键，命中时刷新最后访问时间
    pub fn lookup(&mut self, key: TranslationKey, now: Tick) -> Option<Pfn> {
        self.lookup_traced(key, now, &mut NoTrace)
    }

    /// 同 [`Tlb::lookup`]，并把命中或未命中记录到 `trace`
    pub fn lookup_traced(
        &mut self,
        key: TranslationKey,
        now: Tick,
        trace: &mut dyn TraceSink,
    ) -> Option<Pfn> {
        let Some(slot) = self.position(key) else {
            log::trace!("tlb miss: {}", key);
            trace.record(TraceStep::TlbMiss);
            return None;
        };
        let entry = &mut self.slots[slot];
        entry.last_access = now;
        log::trace!("tlb hit: {} -> frame {} (slot {})", key, entry.pfn, slot);
        trace.record(TraceStep::TlbHit {
            slot,
            pfn: entry.pfn,
        });
        Some(entry.pfn)
    }

    /// 不刷新访问时间的查找
    pub fn probe(&self, key: TranslationKey) -> Option<Pfn> {
        self.position(key).map(|slot| self.slots[slot].pfn)
    }

    /// 安装映射，返回被替换掉的有效项
    ///
    /// 键已存在时原地更新；否则优先填充无效槽，没有无效槽时替换
    /// 最后访问时间最小的槽（同值取下标最小）。
    pub fn install(&mut self, key: TranslationKey, pfn: Pfn, now: Tick) -> Option<TlbEntry> {
        let fresh = TlbEntry {
            key,
            pfn,
            valid: true,
            last_access: now,
        };

        if let Some(slot) = self.position(key) {
            self.slots[slot] = fresh;
            return None;
        }
        if let Some(slot) = self.slots.iter().position(|entry| !entry.valid) {
            self.slots[slot] = fresh;
            return None;
        }

        let victim = lru::select_victim(
            self.slots
                .iter()
                .enumerate()
                .map(|(slot, entry)| (slot, entry.last_access)),
        )?;
        let replaced = core::mem::replace(&mut self.slots[victim], fresh);
        log::trace!("tlb replace slot {}: {} -> {}", victim, replaced.key, key);
        Some(replaced)
    }

    /// 作废键的缓存项，返回是否存在
    pub fn invalidate(&mut self, key: TranslationKey) -> bool {
        match self.position(key) {
            Some(slot) => {
                self.slots[slot].valid = false;
                true
            }
            None => false,
        }
    }

    /// 作废全部缓存项
    pub fn flush(&mut self) {
        for entry in &mut self.slots {
            entry.valid = false;
        }
    }
}
