//! MMU 错误类型
//!
//! 缺页不是错误：它总是被帧分配器同步解决，对调用方不可见。
//! 真正返回给调用方的只有段错误（地址超出结构可表示范围）和启动期的配置错误。
//! 错误码可通过 [`MmuError::to_code()`] 获取，与探索程序中的错误码保持一致。

use core::fmt;

use crate::address::{Pid, Vpn};

/// 配置错误（启动期检查，致命）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// 物理帧数为 0
    NoFrames,
    /// 页大小不是 2 的幂
    PageSizeNotPowerOfTwo(usize),
    /// 物理内存大小溢出
    MemoryTooLarge,
    /// 层级页表没有任何级
    EmptyHierarchy,
    /// 某一级索引位宽为 0 或过宽
    LevelTooWide(u32),
    /// 偏移位加索引位超过 64 位
    AddressTooWide(u32),
    /// 倒排页表桶数为 0
    NoBuckets,
    /// 单级页表页数为 0 或过大
    BadPageCount(u64),
    /// 提供的物理内存小于 `total_frames * page_size`
    MemoryTooSmall {
        /// 需要的字节数
        required: usize,
        /// 实际的字节数
        actual: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoFrames => write!(f, "physical frame count must be at least 1"),
            ConfigError::PageSizeNotPowerOfTwo(size) => {
                write!(f, "page size {size} is not a power of two")
            }
            ConfigError::MemoryTooLarge => write!(f, "physical memory size overflows"),
            ConfigError::EmptyHierarchy => write!(f, "hierarchical table needs at least one level"),
            ConfigError::LevelTooWide(bits) => write!(f, "level index width {bits} is out of range"),
            ConfigError::AddressTooWide(bits) => {
                write!(f, "address layout needs {bits} bits, more than 64")
            }
            ConfigError::NoBuckets => write!(f, "inverted table needs at least one bucket"),
            ConfigError::BadPageCount(pages) => write!(f, "linear table page count {pages} is out of range"),
            ConfigError::MemoryTooSmall { required, actual } => {
                write!(f, "physical memory has {actual} bytes, {required} required")
            }
        }
    }
}

/// MMU 操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuError {
    /// 虚拟页超出翻译结构可表示的地址空间（例如根目录索引越界）
    SegmentationFault {
        /// 发起请求的进程
        pid: Pid,
        /// 越界的虚拟页码
        vpn: Vpn,
    },
    /// 对没有有效映射的页修改标志
    NotMapped {
        /// 进程
        pid: Pid,
        /// 虚拟页码
        vpn: Vpn,
    },
    /// 地址运算溢出（跨页读写越过 64 位地址末尾）
    InvalidAddress,
    /// 配置不合法
    InvalidConfig(ConfigError),
}

impl MmuError {
    /// 转换为错误码（负数）
    pub fn to_code(&self) -> isize {
        match self {
            MmuError::SegmentationFault { .. } => -1,
            MmuError::NotMapped { .. } => -2,
            MmuError::InvalidAddress => -14,
            MmuError::InvalidConfig(_) => -22,
        }
    }
}

impl fmt::Display for MmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmuError::SegmentationFault { pid, vpn } => {
                write!(f, "segmentation fault: pid {pid} vpn {vpn} is outside the address space")
            }
            MmuError::NotMapped { pid, vpn } => write!(f, "pid {pid} vpn {vpn} is not mapped"),
            MmuError::InvalidAddress => write!(f, "address arithmetic overflow"),
            MmuError::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl core::error::Error for ConfigError {}
impl core::error::Error for MmuError {}

impl From<ConfigError> for MmuError {
    fn from(err: ConfigError) -> Self {
        MmuError::InvalidConfig(err)
    }
}

/// MMU 操作的结果类型
pub type MmuResult<T> = Result<T, MmuError>;
