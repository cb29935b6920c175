//! 地址类型

use core::fmt;

use super::offset_mask;
use super::page_num::{PageNum, Pfn, Vpn};

/// `impl_address!` 宏
/// ---------------------
/// 为地址新类型实现与 `u64` 的互相转换和十六进制格式化。
macro_rules! impl_address {
    ($type:ident) => {
        impl $type {
            /// 从原始整数创建地址
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// 返回原始整数值
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// 页内偏移
            pub const fn page_offset(self, offset_bits: u32) -> u64 {
                self.0 & offset_mask(offset_bits)
            }

            /// 按字节数前移，溢出时返回 `None`
            pub fn checked_add(self, bytes: u64) -> Option<Self> {
                self.0.checked_add(bytes).map(Self)
            }
        }

        impl From<u64> for $type {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl fmt::LowerHex for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }
    };
}

/// [Vaddr] (Virtual Address)
/// ---------------------
/// 虚拟地址。字段宽度和移位量由配置决定，这里只保存原始值。
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Vaddr(pub u64);
impl_address!(Vaddr);

impl Vaddr {
    /// 去掉偏移位后的虚拟页码
    pub const fn vpn(self, offset_bits: u32) -> Vpn {
        if offset_bits >= u64::BITS {
            Vpn(0)
        } else {
            Vpn(self.0 >> offset_bits)
        }
    }
}

/// [Paddr] (Physical Address)
/// ---------------------
/// 物理地址，`(pfn << offset_bits) | offset`。
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Paddr(pub u64);
impl_address!(Paddr);

impl Paddr {
    /// 由帧号和页内偏移拼出物理地址
    pub fn compose(pfn: Pfn, offset: u64, offset_bits: u32) -> Self {
        debug_assert!(offset <= offset_mask(offset_bits), "offset wider than page");
        Self((pfn.as_u64() << offset_bits) | offset)
    }

    /// 该地址所在的物理帧
    pub fn pfn(self, offset_bits: u32) -> Pfn {
        Pfn::from_u64(self.0 >> offset_bits)
    }

    /// 作为物理内存数组的下标
    #[inline]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vaddr_decompose_4k() {
        let va = Vaddr::new(0x1A00200300);
        assert_eq!(va.vpn(12), Vpn(0x1A00200));
        assert_eq!(va.page_offset(12), 0x300);
    }

    #[test]
    fn test_paddr_compose_matches_shift_or() {
        let pa = Paddr::compose(Pfn(31), 0xFFF, 12);
        assert_eq!(pa.as_u64(), (31 << 12) | 0xFFF);
        assert_eq!(pa.pfn(12), Pfn(31));
        assert_eq!(pa.page_offset(12), 0xFFF);
    }

    #[test]
    fn test_address_display_is_hex() {
        assert_eq!(alloc::format!("{}", Vaddr::new(0x400000)), "0x400000");
    }
}
