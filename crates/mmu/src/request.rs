//! 请求流
//!
//! 菜单或批处理文件最终都只产生 `(操作, pid, 虚拟地址, 可选字节)` 形式的请求，
//! 由 [`crate::MemorySpace::execute`] 逐条执行。

use core::fmt;

use crate::address::{DEFAULT_PID, Paddr, Pid, Vaddr};
use crate::trace::TranslationTrace;

/// 操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// 读一个字节
    Read,
    /// 写一个字节
    Write(u8),
    /// 可视化翻译过程
    Visualize,
}

/// 一条请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// 操作
    pub op: Operation,
    /// 进程，单进程场景为 [`DEFAULT_PID`]
    pub pid: Pid,
    /// 虚拟地址
    pub vaddr: Vaddr,
}

impl Request {
    /// 读请求
    pub const fn read(pid: Pid, vaddr: u64) -> Self {
        Self {
            op: Operation::Read,
            pid,
            vaddr: Vaddr(vaddr),
        }
    }

    /// 写请求
    pub const fn write(pid: Pid, vaddr: u64, value: u8) -> Self {
        Self {
            op: Operation::Write(value),
            pid,
            vaddr: Vaddr(vaddr),
        }
    }

    /// 可视化请求
    pub const fn visualize(pid: Pid, vaddr: u64) -> Self {
        Self {
            op: Operation::Visualize,
            pid,
            vaddr: Vaddr(vaddr),
        }
    }

    /// 默认进程的读请求
    pub const fn read_default(vaddr: u64) -> Self {
        Self::read(DEFAULT_PID, vaddr)
    }

    /// 默认进程的写请求
    pub const fn write_default(vaddr: u64, value: u8) -> Self {
        Self::write(DEFAULT_PID, vaddr, value)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Operation::Read => write!(f, "read pid {} {}", self.pid, self.vaddr),
            Operation::Write(value) => {
                write!(f, "write pid {} {} <- {:#04x}", self.pid, self.vaddr, value)
            }
            Operation::Visualize => write!(f, "visualize pid {} {}", self.pid, self.vaddr),
        }
    }
}

/// 请求的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// 读到的字节
    Read(u8),
    /// 写入的物理地址
    Written(Paddr),
    /// 翻译轨迹
    Trace(TranslationTrace),
}
