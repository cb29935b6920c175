//! MMU 配置
//!
//! 所有几何参数（页大小、物理帧数、页表级数与各级位宽、哈希桶数、TLB 容量）
//! 都是配置常量而不是运行时状态。[`MmuConfig::validate`] 在启动时检查一次，
//! 不合法的配置直接拒绝启动。
//!
//! 预置配置与各探索程序一致：4 KiB 页、32 个物理帧（128 KiB）、4 项 TLB。

use alloc::vec;
use alloc::vec::Vec;

use crate::error::ConfigError;

/// 默认页大小
pub const DEFAULT_PAGE_SIZE: usize = 4096;
/// 默认物理帧数（128 KiB / 4 KiB）
pub const DEFAULT_TOTAL_FRAMES: usize = 32;
/// 默认 TLB 容量，刻意取小以便触发替换
pub const DEFAULT_TLB_CAPACITY: usize = 4;
/// 倒排页表默认桶数，刻意取小以便触发冲突链
pub const DEFAULT_BUCKETS: usize = 10;
/// 单级页表默认可表示的虚拟页数
pub const SINGLE_LEVEL_MAX_PAGES: u64 = 1000;

/// 单级页表允许的最大页数（限制每个进程的表占用）
pub const MAX_LINEAR_PAGES: u64 = 1 << 20;
/// 层级页表单级最大位宽（单个表节点最多 65536 项）
pub const MAX_LEVEL_BITS: u32 = 16;

/// 翻译结构的选择及其几何参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableScheme {
    /// 单级线性页表，每个进程一张 `max_pages` 项的平坦数组
    Linear {
        /// 可表示的虚拟页数，`vpn >= max_pages` 视为段错误
        max_pages: u64,
    },
    /// 层级页表，`level_bits[0]` 为最高级（根目录）的索引位宽
    Hierarchical {
        /// 自顶向下每一级索引字段的位宽
        level_bits: Vec<u32>,
    },
    /// 倒排页表（哈希 + 链地址法）
    Inverted {
        /// 桶数
        buckets: usize,
        /// 可表示的虚拟页码位宽
        vpn_bits: u32,
    },
}

impl TableScheme {
    /// 结构名称，用于日志
    pub fn name(&self) -> &'static str {
        match self {
            TableScheme::Linear { .. } => "linear",
            TableScheme::Hierarchical { .. } => "hierarchical",
            TableScheme::Inverted { .. } => "inverted",
        }
    }
}

/// MMU 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmuConfig {
    /// 页大小（字节），必须是 2 的幂
    pub page_size: usize,
    /// 物理帧总数，至少为 1
    pub total_frames: usize,
    /// TLB 项数，0 表示不使用 TLB
    pub tlb_capacity: usize,
    /// 翻译结构
    pub scheme: TableScheme,
}

impl MmuConfig {
    /// 以默认页大小、帧数和 TLB 容量创建配置
    pub fn new(scheme: TableScheme) -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            total_frames: DEFAULT_TOTAL_FRAMES,
            tlb_capacity: DEFAULT_TLB_CAPACITY,
            scheme,
        }
    }

    /// 单级页表，1000 个虚拟页
    pub fn single_level() -> Self {
        Self::new(TableScheme::Linear {
            max_pages: SINGLE_LEVEL_MAX_PAGES,
        })
    }

    /// 32 位两级页表：| 目录 (10) | 表 (10) | 偏移 (12) |
    pub fn two_level_32() -> Self {
        Self::new(TableScheme::Hierarchical {
            level_bits: vec![10, 10],
        })
    }

    /// 64 位四级页表：PML4 / PDPT / PD / PT 各 9 位，偏移 12 位
    pub fn four_level_64() -> Self {
        Self::new(TableScheme::Hierarchical {
            level_bits: vec![9, 9, 9, 9],
        })
    }

    /// 倒排页表，10 个桶，覆盖完整的 64 位地址空间
    pub fn inverted() -> Self {
        Self::new(TableScheme::Inverted {
            buckets: DEFAULT_BUCKETS,
            vpn_bits: u64::BITS - DEFAULT_PAGE_SIZE.trailing_zeros(),
        })
    }

    /// 设置物理帧数
    pub fn with_total_frames(mut self, total_frames: usize) -> Self {
        self.total_frames = total_frames;
        self
    }

    /// 设置 TLB 容量
    pub fn with_tlb_capacity(mut self, tlb_capacity: usize) -> Self {
        self.tlb_capacity = tlb_capacity;
        self
    }

    /// 设置页大小
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// 页内偏移位数
    pub fn offset_bits(&self) -> u32 {
        self.page_size.trailing_zeros()
    }

    /// 物理内存字节数
    pub fn memory_size(&self) -> Option<usize> {
        self.total_frames.checked_mul(self.page_size)
    }

    /// 检查配置是否可用于启动
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::PageSizeNotPowerOfTwo(self.page_size));
        }
        if self.total_frames == 0 {
            return Err(ConfigError::NoFrames);
        }
        let memory_size = self.memory_size().ok_or(ConfigError::MemoryTooLarge)?;
        if u64::try_from(memory_size).is_err() {
            return Err(ConfigError::MemoryTooLarge);
        }

        let offset_bits = self.offset_bits();
        match &self.scheme {
            TableScheme::Linear { max_pages } => {
                if *max_pages == 0 || *max_pages > MAX_LINEAR_PAGES {
                    return Err(ConfigError::BadPageCount(*max_pages));
                }
            }
            TableScheme::Hierarchical { level_bits } => {
                if level_bits.is_empty() {
                    return Err(ConfigError::EmptyHierarchy);
                }
                if let Some(&bits) = level_bits
                    .iter()
                    .find(|&&bits| bits == 0 || bits > MAX_LEVEL_BITS)
                {
                    return Err(ConfigError::LevelTooWide(bits));
                }
                let reach = offset_bits + level_bits.iter().sum::<u32>();
                if reach > u64::BITS {
                    return Err(ConfigError::AddressTooWide(reach));
                }
            }
            TableScheme::Inverted { buckets, vpn_bits } => {
                if *buckets == 0 {
                    return Err(ConfigError::NoBuckets);
                }
                let reach = offset_bits + vpn_bits;
                if *vpn_bits == 0 || reach > u64::BITS {
                    return Err(ConfigError::AddressTooWide(reach));
                }
            }
        }
        Ok(())
    }
}
