//! 翻译轨迹
//!
//! 可视化请求返回一条结构化的决策序列（TLB 命中/未命中、目录索引、链表遍历、
//! 最终帧或故障），由外部负责渲染。
//!
//! 轨迹不是另一套查找实现：TLB 和页表的查找函数都接收一个 [`TraceSink`]，
//! 普通查找传入 [`NoTrace`]，可视化传入 `Vec<TraceStep>`，走的是同一段代码。

use alloc::vec::Vec;

use crate::address::{Paddr, Pfn, Pid, Vaddr, Vpn};
use crate::page_table::PteFlags;

/// 一个决策点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStep {
    /// 地址拆分
    Decompose {
        /// 虚拟页码
        vpn: Vpn,
        /// 页内偏移
        offset: u64,
    },
    /// TLB 命中
    TlbHit {
        /// 命中的槽位
        slot: usize,
        /// 缓存的帧号
        pfn: Pfn,
    },
    /// TLB 未命中
    TlbMiss,
    /// 层级页表的一级
    Level {
        /// 级别，0 为根目录
        level: usize,
        /// 本级索引
        index: u64,
        /// 下一级表（或最后一级的有效项）是否存在
        present: bool,
    },
    /// 单级页表的下标
    LinearIndex {
        /// 下标（即虚拟页码）
        index: u64,
        /// 项是否有效
        present: bool,
    },
    /// 倒排页表的哈希桶
    Bucket {
        /// 桶下标
        index: usize,
        /// 桶是否为空
        empty: bool,
    },
    /// 冲突链上的一个节点
    ChainNode {
        /// 在链上的位置，从 1 开始
        position: usize,
        /// 节点所属进程
        pid: Pid,
        /// 节点的虚拟页码
        vpn: Vpn,
        /// 是否与查询的键匹配
        matched: bool,
    },
    /// 找到有效的叶子项
    Leaf {
        /// 帧号
        pfn: Pfn,
        /// 项标志
        flags: PteFlags,
    },
    /// 索引超出结构可表示的地址空间
    OutOfBounds,
}

/// 决策点的接收者
pub trait TraceSink {
    /// 记录一个决策点
    fn record(&mut self, step: TraceStep);
}

/// 丢弃所有决策点，普通查找使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    #[inline]
    fn record(&mut self, _step: TraceStep) {}
}

impl TraceSink for Vec<TraceStep> {
    fn record(&mut self, step: TraceStep) {
        self.push(step);
    }
}

/// 可视化的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    /// 已映射，得到物理地址
    Mapped(Paddr),
    /// 此处会发生缺页（可视化本身不分配帧）
    PageFault,
    /// 此处会发生段错误
    SegmentationFault,
}

/// 一次可视化请求的完整轨迹
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTrace {
    /// 进程
    pub pid: Pid,
    /// 被检查的虚拟地址
    pub vaddr: Vaddr,
    /// 按顺序记录的决策点
    pub steps: Vec<TraceStep>,
    /// 结论
    pub outcome: TraceOutcome,
}

impl TranslationTrace {
    /// 是否由 TLB 直接给出结果
    pub fn tlb_hit(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step, TraceStep::TlbHit { .. }))
    }
}
