//! 地址模块
//!
//! 此模块提供了虚拟地址、物理地址、页码以及翻译键的抽象。
//!
//! # 地址类型
//!
//! - [`Vaddr`] - 虚拟地址（始终以 64 位保存，32 位布局只使用低位）
//! - [`Paddr`] - 物理地址，由帧号与页内偏移拼接而成
//!
//! # 页码
//!
//! - [`PageNum`] - 表示页码的 Trait
//! - [`Vpn`] - 虚拟页码（Virtual Page Number）
//! - [`Pfn`] - 物理帧号（Physical Frame Number）
//! - [`VpnRange`] - 虚拟页码范围
//!
//! # 翻译键
//!
//! [`TranslationKey`] 是 `(pid, vpn)` 二元组，TLB、页表和反向映射都以它为键。
pub mod key;
pub mod page_num;
pub mod types;

pub use key::{Pid, TranslationKey, DEFAULT_PID};
pub use page_num::{PageNum, PageNumRange, Pfn, Vpn, VpnRange};
pub use types::{Paddr, Vaddr};

/// 由页内偏移位数得到偏移掩码
#[inline]
pub(crate) const fn offset_mask(offset_bits: u32) -> u64 {
    if offset_bits >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << offset_bits) - 1
    }
}
