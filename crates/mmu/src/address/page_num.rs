//! 页码抽象模块
//!
//! 此模块定义了表示页码 (Page Number) 的 Trait 和具体的页码类型 (Vpn, Pfn)，
//! 以及用于处理连续页码的范围结构 (PageNumRange)。
//!
//! 与内核中的页码不同，这里的页大小来自 [`crate::MmuConfig`]，
//! 因此所有与地址互转的操作都显式接收 `offset_bits`。

use core::fmt;

use super::types::{Paddr, Vaddr};

/// [PageNum] Trait
/// ---------------------
/// 表示一个页码的 Trait。Vpn 和 Pfn 都实现此 Trait。
pub trait PageNum: Copy + Clone + PartialEq + PartialOrd + Eq + Ord {
    /// 此页码类型关联的地址类型（例如 Pfn 关联 Paddr，Vpn 关联 Vaddr）。
    type TAddress;

    /// 返回原始整数值
    fn as_u64(&self) -> u64;

    /// 从原始整数创建页码
    fn from_u64(value: u64) -> Self;

    /// 将页码增加 1，到达上限时保持不变。
    fn step(&mut self) {
        *self = Self::from_u64(self.as_u64().saturating_add(1));
    }

    /// 获取该页码对应的起始地址。
    fn start_addr(self, offset_bits: u32) -> Self::TAddress;
}

/// `impl_page_num!` 宏
/// ---------------------
/// 快速为给定类型实现 `PageNum` Trait 和十六进制格式化。
macro_rules! impl_page_num {
    ($type:ident, $inner:ty, $addr_type:ty) => {
        impl PageNum for $type {
            type TAddress = $addr_type;

            fn as_u64(&self) -> u64 {
                self.0 as u64
            }

            fn from_u64(value: u64) -> Self {
                Self(value as $inner)
            }

            fn start_addr(self, offset_bits: u32) -> Self::TAddress {
                <$addr_type>::new((self.0 as u64) << offset_bits)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

/// [Vpn] (Virtual Page Number)
/// ---------------------
/// 虚拟页码，去掉页内偏移后的虚拟地址。
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Vpn(pub u64);
impl_page_num!(Vpn, u64, Vaddr);

/// [Pfn] (Physical Frame Number)
/// ---------------------
/// 物理帧号，取值范围 `0..total_frames`。
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Pfn(pub usize);
impl_page_num!(Pfn, usize, Paddr);

impl Pfn {
    /// 帧下标
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// [PageNumRange]
/// ---------------------
/// 泛型页码范围结构，表示一个半开半闭的区间 `[start, end)`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageNumRange<T>
where
    T: PageNum,
{
    /// 范围的起始页码 (包含)。
    pub start: T,
    /// 范围的结束页码 (不包含)。
    pub end: T,
}

impl<T> PageNumRange<T>
where
    T: PageNum,
{
    /// 创建一个新的页码范围。
    pub fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    /// 从起始页码和长度 (页数) 创建一个页码范围。
    ///
    /// 结束页码在 `u64::MAX` 处截断，因此范围可能比 `len` 短。
    pub fn from_start_len(start: T, len: u64) -> Self {
        Self {
            start,
            end: T::from_u64(start.as_u64().saturating_add(len)),
        }
    }

    /// 获取范围内的页数。
    pub fn len(&self) -> u64 {
        self.end.as_u64().saturating_sub(self.start.as_u64())
    }

    /// 检查范围是否为空 (即 start >= end)。
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// 检查范围是否包含给定的页码。
    pub fn contains(&self, page: T) -> bool {
        page >= self.start && page < self.end
    }

    /// 获取范围的迭代器。
    pub fn iter(&self) -> PageNumRangeIterator<T> {
        PageNumRangeIterator {
            end: self.end,
            current: self.start,
        }
    }
}

impl<T> IntoIterator for PageNumRange<T>
where
    T: PageNum,
{
    type Item = T;
    type IntoIter = PageNumRangeIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// [PageNumRangeIterator]
/// ---------------------
/// 页码范围的迭代器，按升序返回范围内的每个页码。
pub struct PageNumRangeIterator<T>
where
    T: PageNum,
{
    end: T,
    current: T,
}

impl<T> Iterator for PageNumRangeIterator<T>
where
    T: PageNum,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.end {
            return None;
        }
        let result = self.current;
        self.current.step(); // 步进到下一页
        Some(result)
    }
}

/// 虚拟页码范围的类型别名
pub type VpnRange = PageNumRange<Vpn>;
