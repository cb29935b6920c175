//! 帧分配器模块
//!
//! 本模块管理有限的物理帧集合，并在没有空闲帧时按 LRU 驱逐。
//!
//! ## 分配策略（位图 + LRU 驱逐）
//!
//! 分配器使用位图（bitmap）跟踪每个物理帧的分配状态：
//!
//! - **bitmap**：每个 bit 表示一个物理帧（0=空闲，1=已分配）
//! - **last_access**：每个帧最后一次被访问的逻辑时间
//! - **rmap**：帧与占用者之间的双向索引，见 [`crate::rmap`]
//!
//! 分配流程：
//!
//! 1. 从下标 0 开始查找第一个空闲位（`trailing_zeros`，跳过全满的 u64）
//! 2. 找不到空闲帧时，选择 `last_access` 最小的帧作为牺牲者（同值取下标最小）
//! 3. 先通过回调让调用方作废牺牲者在页表和 TLB 中的映射，再把帧重新绑定给新键
//!
//! 分配总是成功：帧数为 0 是配置错误，在启动时已被 [`crate::MmuConfig::validate`] 拒绝。
//! 翻译路径上没有显式的"释放"操作，帧只会通过驱逐重新变为可用。

use alloc::vec;
use alloc::vec::Vec;

use crate::address::{Pfn, TranslationKey};
use crate::lru::{self, Tick};
use crate::rmap::ReverseMap;

/// 一次驱逐
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    /// 被驱逐的占用者
    pub key: TranslationKey,
    /// 被回收并立即复用的帧
    pub pfn: Pfn,
    /// 被驱逐的页是否被写过（没有交换区，内容直接丢弃）
    pub dirty: bool,
}

/// 物理帧分配器。
pub struct FrameAllocator {
    /// 位图数据（每个 bit 表示一个帧：0=空闲，1=已分配）。
    bitmap: Vec<u64>,
    /// 总帧数。
    total_frames: usize,
    /// 已分配帧数（用于快速统计）。
    allocated_count: usize,
    /// 每个帧的最后访问时间
    last_access: Vec<Tick>,
    /// 帧与占用者的双向索引
    rmap: ReverseMap,
    /// 累计驱逐次数
    evictions: u64,
}

impl FrameAllocator {
    /// 创建一个所有帧均空闲的分配器。
    pub fn new(total_frames: usize) -> Self {
        debug_assert!(total_frames > 0, "frame allocator needs at least one frame");
        FrameAllocator {
            bitmap: vec![0u64; total_frames.div_ceil(64)],
            total_frames,
            allocated_count: 0,
            last_access: vec![0; total_frames],
            rmap: ReverseMap::new(total_frames),
            evictions: 0,
        }
    }

    /// 检查帧是否空闲
    #[inline]
    fn is_free(&self, frame_idx: usize) -> bool {
        let word_idx = frame_idx / 64;
        let bit_idx = frame_idx % 64;
        (self.bitmap[word_idx] & (1u64 << bit_idx)) == 0
    }

    /// 标记帧为已分配
    #[inline]
    fn mark_allocated(&mut self, frame_idx: usize) {
        let word_idx = frame_idx / 64;
        let bit_idx = frame_idx % 64;
        self.bitmap[word_idx] |= 1u64 << bit_idx;
    }

    /// 查找下标最小的空闲帧
    fn find_free(&self) -> Option<usize> {
        for (idx, &word) in self.bitmap.iter().enumerate() {
            // 快速跳过全满的 u64
            if word == u64::MAX {
                continue;
            }
            let frame_idx = idx * 64 + (!word).trailing_zeros() as usize;
            // 最后一个字中超出范围的位恒为 0，落在这里说明已无空闲帧
            return (frame_idx < self.total_frames).then_some(frame_idx);
        }
        None
    }

    /// 为 `key` 分配一个物理帧。
    ///
    /// 有空闲帧时直接使用；否则驱逐最久未访问的帧。驱逐时先调用
    /// `on_evict(牺牲者, 帧)`，调用方必须在回调中作废牺牲者的页表项和 TLB 项，
    /// 回调返回后反向映射才会改绑到 `key`。
    ///
    /// # Panics
    ///
    /// `key` 已经占有帧时（调用方应先查页表）在调试构建下 panic。
    pub fn allocate<F>(&mut self, key: TranslationKey, now: Tick, on_evict: F) -> Pfn
    where
        F: FnOnce(TranslationKey, Pfn),
    {
        debug_assert!(
            self.rmap.frame_of(key).is_none(),
            "allocate: {key} already owns a frame"
        );

        let frame_idx = match self.find_free() {
            Some(frame_idx) => {
                self.mark_allocated(frame_idx);
                self.allocated_count += 1;
                frame_idx
            }
            None => {
                let Some(victim) = lru::select_victim(self.last_access.iter().copied().enumerate())
                else {
                    panic!("frame allocator: no frames configured");
                };
                let pfn = Pfn(victim);
                if let Some(owner) = self.rmap.unbind(pfn) {
                    log::debug!("evicting frame {} from {} for {}", pfn, owner, key);
                    on_evict(owner, pfn);
                    self.evictions += 1;
                }
                victim
            }
        };

        let pfn = Pfn(frame_idx);
        self.last_access[frame_idx] = now;
        self.rmap.bind(key, pfn);
        pfn
    }

    /// 刷新帧的最后访问时间
    pub fn touch(&mut self, pfn: Pfn, now: Tick) {
        debug_assert!(!self.is_free(pfn.index()), "touch: frame {pfn} is free");
        if let Some(last) = self.last_access.get_mut(pfn.index()) {
            *last = now;
        }
    }

    /// 帧是否空闲
    pub fn is_frame_free(&self, pfn: Pfn) -> bool {
        pfn.index() < self.total_frames && self.is_free(pfn.index())
    }

    /// 帧的占用者
    pub fn owner(&self, pfn: Pfn) -> Option<TranslationKey> {
        self.rmap.owner(pfn)
    }

    /// 键占用的帧
    pub fn frame_of(&self, key: TranslationKey) -> Option<Pfn> {
        self.rmap.frame_of(key)
    }

    /// 帧的最后访问时间
    pub fn last_access(&self, pfn: Pfn) -> Option<Tick> {
        if self.is_frame_free(pfn) {
            return None;
        }
        self.last_access.get(pfn.index()).copied()
    }

    /// 按帧号升序遍历已占用的帧
    pub fn owned_frames(&self) -> impl Iterator<Item = (Pfn, TranslationKey)> + '_ {
        self.rmap.iter()
    }

    /// 获取总的物理帧数
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// 获取已分配的帧数
    pub fn allocated_frames(&self) -> usize {
        self.allocated_count
    }

    /// 获取空闲的帧数
    pub fn free_frames(&self) -> usize {
        self.total_frames - self.allocated_count
    }

    /// 累计驱逐次数
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// 获取帧分配器的当前状态
    /// # 返回值
    /// - 总帧数
    /// - 已分配的帧数
    /// - 空闲的帧数
    pub fn get_stats(&self) -> (usize, usize, usize) {
        (
            self.total_frames,
            self.allocated_count,
            self.total_frames - self.allocated_count,
        )
    }
}
