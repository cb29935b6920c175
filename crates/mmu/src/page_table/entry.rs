//! 页表项

use bitflags::bitflags;

use crate::address::Pfn;

bitflags! {
    /// 页表项标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PteFlags: u8 {
        /// 映射有效
        const VALID = 1 << 0;
        /// 映射后被写过
        const DIRTY = 1 << 1;
    }
}

/// 页表项：`(帧号, 标志)`
///
/// 只由翻译结构修改，层级页表、倒排页表和单级页表共用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageTableEntry {
    pfn: Pfn,
    flags: PteFlags,
}

impl PageTableEntry {
    /// 无效项
    pub const EMPTY: Self = Self {
        pfn: Pfn(0),
        flags: PteFlags::empty(),
    };

    /// 指向 `pfn` 的有效项
    pub const fn mapped(pfn: Pfn) -> Self {
        Self {
            pfn,
            flags: PteFlags::VALID,
        }
    }

    /// 帧号
    pub const fn pfn(&self) -> Pfn {
        self.pfn
    }

    /// 标志
    pub const fn flags(&self) -> PteFlags {
        self.flags
    }

    /// 是否有效
    pub const fn is_valid(&self) -> bool {
        self.flags.contains(PteFlags::VALID)
    }

    /// 是否被写过
    pub const fn is_dirty(&self) -> bool {
        self.flags.contains(PteFlags::DIRTY)
    }

    /// 置位标志
    pub fn insert_flags(&mut self, flags: PteFlags) {
        self.flags.insert(flags);
    }

    /// 清除全部标志，帧号保留用于可视化
    pub fn invalidate(&mut self) {
        self.flags = PteFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_entry_is_valid_and_clean() {
        let entry = PageTableEntry::mapped(Pfn(7));
        assert!(entry.is_valid());
        assert!(!entry.is_dirty());
        assert_eq!(entry.pfn(), Pfn(7));
    }

    #[test]
    fn test_invalidate_clears_dirty() {
        let mut entry = PageTableEntry::mapped(Pfn(1));
        entry.insert_flags(PteFlags::DIRTY);
        assert!(entry.is_dirty());
        entry.invalidate();
        assert!(!entry.is_valid());
        assert!(!entry.is_dirty());
    }
}
