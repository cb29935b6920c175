//! 翻译管理器
//!
//! [`Mmu`] 持有一个翻译结构、帧分配器、TLB、逻辑时钟和计数器，
//! 按 TLB → 页表 → 帧分配器的顺序完成一次翻译：
//!
//! 1. 时钟前进一步
//! 2. 查 TLB，命中即得到帧号
//! 3. 未命中则交给 [`PageTable::resolve`]，缺页时分配（可能驱逐）帧，
//!    驱逐回调在同一次翻译中作废牺牲者的 TLB 项
//! 4. 把结果装入 TLB，刷新帧的访问时间，写访问置 DIRTY
//!
//! 所有状态都是实例字段，没有全局变量，测试中可以同时存在多个实例。

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::address::{Paddr, Pfn, Pid, TranslationKey, Vaddr, VpnRange};
use crate::config::MmuConfig;
use crate::error::MmuResult;
use crate::frame_allocator::{Eviction, FrameAllocator};
use crate::lru::{LogicalClock, Tick};
use crate::page_table::{self, PageTable, PteFlags, Resolved};
use crate::tlb::Tlb;
use crate::trace::{TraceOutcome, TraceStep, TranslationTrace};

/// 访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// 读
    #[default]
    Read,
    /// 写，置位页表项的 DIRTY
    Write,
}

/// 一次翻译的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// 物理地址
    pub paddr: Paddr,
    /// 帧号
    pub pfn: Pfn,
    /// 是否由 TLB 直接给出
    pub tlb_hit: bool,
    /// 是否发生了缺页
    pub page_fault: bool,
    /// 缺页时为腾出帧而发生的驱逐
    pub evicted: Option<Eviction>,
}

/// 翻译计数器
///
/// `tlb_hits + tlb_misses == translations`，段错误的请求计为未命中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmuStats {
    /// 翻译请求数
    pub translations: u64,
    /// TLB 命中数
    pub tlb_hits: u64,
    /// TLB 未命中数
    pub tlb_misses: u64,
    /// 缺页数
    pub page_faults: u64,
    /// 驱逐数
    pub evictions: u64,
    /// 段错误数
    pub segfaults: u64,
}

impl MmuStats {
    /// TLB 命中率，没有请求时为 0
    pub fn hit_rate(&self) -> f64 {
        if self.translations == 0 {
            return 0.0;
        }
        self.tlb_hits as f64 / self.translations as f64
    }
}

/// [`Mmu::check_invariants`] 发现的第一处不一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// 页表把键映射到一个不属于它的帧
    TableFrameNotOwned {
        /// 页表中的键
        key: TranslationKey,
        /// 映射到的帧
        pfn: Pfn,
        /// 分配器记录的占用者
        owner: Option<TranslationKey>,
    },
    /// 分配器记录的占用者在页表中没有指向该帧的有效映射
    OwnerNotMapped {
        /// 帧
        pfn: Pfn,
        /// 占用者
        key: TranslationKey,
    },
    /// 已分配帧数与有占用者的帧数不一致
    FrameAccounting {
        /// 位图中已分配的帧数
        allocated: usize,
        /// 有占用者的帧数
        owned: usize,
    },
    /// TLB 有效项在页表中没有相同的有效映射
    StaleTlbEntry {
        /// TLB 中的键
        key: TranslationKey,
        /// TLB 缓存的帧
        pfn: Pfn,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::TableFrameNotOwned { key, pfn, owner } => match owner {
                Some(owner) => write!(f, "{key} maps frame {pfn} owned by {owner}"),
                None => write!(f, "{key} maps free frame {pfn}"),
            },
            InvariantViolation::OwnerNotMapped { pfn, key } => {
                write!(f, "frame {pfn} owned by {key} but not mapped")
            }
            InvariantViolation::FrameAccounting { allocated, owned } => {
                write!(f, "{allocated} frames allocated but {owned} owned")
            }
            InvariantViolation::StaleTlbEntry { key, pfn } => {
                write!(f, "tlb caches {key} -> frame {pfn} without a table mapping")
            }
        }
    }
}

/// 内存管理单元
pub struct Mmu {
    config: MmuConfig,
    offset_bits: u32,
    table: Box<dyn PageTable>,
    frames: FrameAllocator,
    tlb: Tlb,
    clock: LogicalClock,
    stats: MmuStats,
}

impl Mmu {
    /// 按配置启动
    ///
    /// 配置不合法时返回 [`crate::MmuError::InvalidConfig`]。
    pub fn new(config: MmuConfig) -> MmuResult<Self> {
        config.validate()?;
        let table = page_table::build(&config.scheme);
        log::info!(
            "mmu: {} table, {} frames of {} bytes, {} tlb entries",
            table.kind(),
            config.total_frames,
            config.page_size,
            config.tlb_capacity
        );
        Ok(Self {
            offset_bits: config.offset_bits(),
            frames: FrameAllocator::new(config.total_frames),
            tlb: Tlb::new(config.tlb_capacity),
            clock: LogicalClock::new(),
            stats: MmuStats::default(),
            table,
            config,
        })
    }

    /// 把地址拆成翻译键和页内偏移
    pub fn split(&self, pid: Pid, vaddr: Vaddr) -> (TranslationKey, u64) {
        (
            TranslationKey::new(pid, vaddr.vpn(self.offset_bits)),
            vaddr.page_offset(self.offset_bits),
        )
    }

    /// 读访问的翻译
    pub fn translate(&mut self, pid: Pid, vaddr: Vaddr) -> MmuResult<Translation> {
        self.translate_for(pid, vaddr, Access::Read)
    }

    /// 翻译虚拟地址
    ///
    /// 地址超出翻译结构的范围时返回 [`crate::MmuError::SegmentationFault`]，
    /// 此时不会分配任何帧。缺页对调用方不可见。
    pub fn translate_for(
        &mut self,
        pid: Pid,
        vaddr: Vaddr,
        access: Access,
    ) -> MmuResult<Translation> {
        let now = self.clock.tick();
        self.stats.translations += 1;
        let (key, offset) = self.split(pid, vaddr);

        let (resolved, tlb_hit) = match self.tlb.lookup(key, now) {
            Some(pfn) => {
                self.stats.tlb_hits += 1;
                let resolved = Resolved {
                    pfn,
                    page_fault: false,
                    evicted: None,
                };
                (resolved, true)
            }
            None => {
                self.stats.tlb_misses += 1;
                let resolved = self.resolve(key, now).inspect_err(|err| {
                    log::debug!("translate {} at {}: {}", key, vaddr, err);
                })?;
                self.tlb.install(key, resolved.pfn, now);
                (resolved, false)
            }
        };

        self.frames.touch(resolved.pfn, now);
        if access == Access::Write {
            self.table.insert_flags(key, PteFlags::DIRTY)?;
        }

        Ok(Translation {
            paddr: Paddr::compose(resolved.pfn, offset, self.offset_bits),
            pfn: resolved.pfn,
            tlb_hit,
            page_fault: resolved.page_fault,
            evicted: resolved.evicted,
        })
    }

    /// 页表查找，缺页时分配帧；驱逐的牺牲者同时从 TLB 中作废
    fn resolve(&mut self, key: TranslationKey, now: Tick) -> MmuResult<Resolved> {
        let tlb = &mut self.tlb;
        let resolved = self
            .table
            .resolve(key, &mut self.frames, now, &mut |eviction: Eviction| {
                tlb.invalidate(eviction.key);
            });
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                self.stats.segfaults += 1;
                return Err(err);
            }
        };

        if resolved.page_fault {
            self.stats.page_faults += 1;
        }
        if let Some(eviction) = resolved.evicted {
            self.stats.evictions += 1;
            if eviction.dirty {
                log::warn!(
                    "discarding dirty page {} from frame {}: no backing store",
                    eviction.key,
                    eviction.pfn
                );
            }
        }
        Ok(resolved)
    }

    /// 可视化一次翻译
    ///
    /// 与 [`Mmu::translate`] 走同一条查找路径（TLB 查找会刷新命中项的访问时间），
    /// 但不分配帧、不安装 TLB、不计入命中与未命中。
    pub fn visualize(&mut self, pid: Pid, vaddr: Vaddr) -> TranslationTrace {
        let now = self.clock.tick();
        let (key, offset) = self.split(pid, vaddr);
        let mut steps = vec![TraceStep::Decompose {
            vpn: key.vpn,
            offset,
        }];

        let pfn = match self.tlb.lookup_traced(key, now, &mut steps) {
            Some(pfn) => Some(pfn),
            None => self.table.walk(key, &mut steps).map(|entry| entry.pfn()),
        };
        let outcome = match pfn {
            Some(pfn) => TraceOutcome::Mapped(Paddr::compose(pfn, offset, self.offset_bits)),
            None if self.table.check_bounds(key).is_err() => TraceOutcome::SegmentationFault,
            None => TraceOutcome::PageFault,
        };

        TranslationTrace {
            pid,
            vaddr,
            steps,
            outcome,
        }
    }

    /// 预先映射一段虚拟页，返回每一页的查找结果
    ///
    /// 不经过 TLB，也不计入命中与未命中；缺页与驱逐照常计数。
    /// 范围内任何一页越界时整段拒绝，不分配任何帧。
    pub fn premap(&mut self, pid: Pid, vpns: VpnRange) -> MmuResult<Vec<Resolved>> {
        for vpn in vpns.iter() {
            if let Err(err) = self.table.check_bounds(TranslationKey::new(pid, vpn)) {
                self.stats.segfaults += 1;
                return Err(err);
            }
        }

        let mut resolved = Vec::new();
        for vpn in vpns.iter() {
            let now = self.clock.tick();
            let page = self.resolve(TranslationKey::new(pid, vpn), now)?;
            self.frames.touch(page.pfn, now);
            resolved.push(page);
        }
        log::info!("premapped {} pages for pid {}", resolved.len(), pid);
        Ok(resolved)
    }

    /// 检查帧与页表之间的双射，以及 TLB 是页表的子集
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (key, entry) in self.table.mappings() {
            let pfn = entry.pfn();
            let owner = self.frames.owner(pfn);
            if owner != Some(key) {
                return Err(InvariantViolation::TableFrameNotOwned { key, pfn, owner });
            }
        }

        let mut owned = 0;
        for (pfn, key) in self.frames.owned_frames() {
            owned += 1;
            if self.table.lookup(key) != Some(pfn) {
                return Err(InvariantViolation::OwnerNotMapped { pfn, key });
            }
        }
        let allocated = self.frames.allocated_frames();
        if owned != allocated {
            return Err(InvariantViolation::FrameAccounting { allocated, owned });
        }

        for entry in self.tlb.entries() {
            if self.table.lookup(entry.key) != Some(entry.pfn) {
                return Err(InvariantViolation::StaleTlbEntry {
                    key: entry.key,
                    pfn: entry.pfn,
                });
            }
        }
        Ok(())
    }

    /// 作废全部 TLB 项
    pub fn flush_tlb(&mut self) {
        self.tlb.flush();
    }

    /// 计数器
    pub fn stats(&self) -> MmuStats {
        self.stats
    }

    /// 配置
    pub fn config(&self) -> &MmuConfig {
        &self.config
    }

    /// 页内偏移位数
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    /// 当前逻辑时间
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// TLB
    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    /// 帧分配器
    pub fn frames(&self) -> &FrameAllocator {
        &self.frames
    }

    /// 翻译结构
    pub fn table(&self) -> &dyn PageTable {
        self.table.as_ref()
    }
}

impl fmt::Debug for Mmu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mmu")
            .field("scheme", &self.table.kind())
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
