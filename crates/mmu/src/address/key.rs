//! 翻译键

use core::fmt;

use super::page_num::Vpn;

/// 进程标识
pub type Pid = u64;

/// 单进程场景下使用的进程号
pub const DEFAULT_PID: Pid = 0;

/// 翻译键：`(pid, vpn)`
///
/// 页表、TLB 和反向映射共用同一种键，保证三者对"同一页"的判定一致。
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct TranslationKey {
    /// 所属进程
    pub pid: Pid,
    /// 虚拟页码
    pub vpn: Vpn,
}

impl TranslationKey {
    /// 创建翻译键
    pub const fn new(pid: Pid, vpn: Vpn) -> Self {
        Self { pid, vpn }
    }
}

impl fmt::Display for TranslationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(pid {}, vpn {})", self.pid, self.vpn)
    }
}
