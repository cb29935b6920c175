//! 物理内存的 Mock 实现
//!
//! 与真实 RAM 一样按字节存储，同时记录每一次访问，
//! 便于断言"某个帧在复用前被清零"之类的顺序性质。

use std::cell::RefCell;

/// 一次物理内存访问
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemAccess {
    /// 读 `len` 字节
    Read { addr: u64, len: usize },
    /// 写 `len` 字节
    Write { addr: u64, len: usize },
    /// 清零 `len` 字节
    Zero { addr: u64, len: usize },
}

/// 记录访问的物理内存
#[derive(Debug)]
pub struct MockPhysMem {
    bytes: Vec<u8>,
    accesses: RefCell<Vec<MemAccess>>,
}

impl MockPhysMem {
    /// 创建 `size` 字节、内容为 0 的内存
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            accesses: RefCell::new(Vec::new()),
        }
    }

    /// 创建以 `fill` 填充的内存，用于检查清零
    pub fn filled(size: usize, fill: u8) -> Self {
        Self {
            bytes: vec![fill; size],
            accesses: RefCell::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read_into(&self, addr: u64, out: &mut [u8]) {
        let start = addr as usize;
        out.copy_from_slice(&self.bytes[start..start + out.len()]);
        self.accesses.borrow_mut().push(MemAccess::Read {
            addr,
            len: out.len(),
        });
    }

    pub fn write_from(&mut self, addr: u64, bytes: &[u8]) {
        let start = addr as usize;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        self.accesses.borrow_mut().push(MemAccess::Write {
            addr,
            len: bytes.len(),
        });
    }

    pub fn zero(&mut self, addr: u64, len: usize) {
        let start = addr as usize;
        self.bytes[start..start + len].fill(0);
        self.accesses
            .borrow_mut()
            .push(MemAccess::Zero { addr, len });
    }

    /// 原始内容，不记录访问
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 取出并清空访问记录
    pub fn take_accesses(&self) -> Vec<MemAccess> {
        self.accesses.take()
    }
}
