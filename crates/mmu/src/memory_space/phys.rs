//! 物理内存
//!
//! 字节存储是外部协作者，这里只定义接口并提供一个平坦数组实现。
//! 调用方保证访问不越过 `len()`。

use alloc::vec;
use alloc::vec::Vec;

use crate::address::Paddr;

/// 物理内存接口
pub trait PhysMem {
    /// 字节数
    fn len(&self) -> usize;

    /// 从 `paddr` 起读满 `out`
    fn read(&self, paddr: Paddr, out: &mut [u8]);

    /// 从 `paddr` 起写入 `bytes`
    fn write(&mut self, paddr: Paddr, bytes: &[u8]);

    /// 把 `[paddr, paddr + len)` 清零
    fn zero_range(&mut self, paddr: Paddr, len: usize);

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 平坦数组实现的物理内存
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ram {
    bytes: Vec<u8>,
}

impl Ram {
    /// 创建 `size` 字节、内容为 0 的内存
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// 原始内容
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PhysMem for Ram {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, paddr: Paddr, out: &mut [u8]) {
        let start = paddr.as_index();
        out.copy_from_slice(&self.bytes[start..start + out.len()]);
    }

    fn write(&mut self, paddr: Paddr, bytes: &[u8]) {
        let start = paddr.as_index();
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn zero_range(&mut self, paddr: Paddr, len: usize) {
        let start = paddr.as_index();
        self.bytes[start..start + len].fill(0);
    }
}

#[cfg(test)]
impl PhysMem for test_support::mock::ram::MockPhysMem {
    fn len(&self) -> usize {
        test_support::mock::ram::MockPhysMem::len(self)
    }

    fn read(&self, paddr: Paddr, out: &mut [u8]) {
        self.read_into(paddr.as_u64(), out);
    }

    fn write(&mut self, paddr: Paddr, bytes: &[u8]) {
        self.write_from(paddr.as_u64(), bytes);
    }

    fn zero_range(&mut self, paddr: Paddr, len: usize) {
        self.zero(paddr.as_u64(), len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_read_write() {
        let mut ram = Ram::new(32);
        ram.write(Paddr(4), &[1, 2, 3]);
        let mut out = [0u8; 4];
        ram.read(Paddr(3), &mut out);
        assert_eq!(out, [0, 1, 2, 3]);
        ram.zero_range(Paddr(5), 1);
        assert_eq!(ram.as_bytes()[4..7], [1, 0, 3]);
    }
}
