//! 逻辑时钟与 LRU 牺牲者选择
//!
//! 帧分配器和 TLB 共用同一套规则：最后访问时间最小者被替换，
//! 时间相同时取下标最小者，保证测试可复现。

/// 逻辑时间戳
pub type Tick = u64;

/// 单调递增的逻辑时钟
///
/// 由 [`crate::Mmu`] 实例持有，每次翻译请求前进一步。
#[derive(Debug, Clone, Default)]
pub struct LogicalClock {
    now: Tick,
}

impl LogicalClock {
    /// 创建时钟，初始时间为 0
    pub const fn new() -> Self {
        Self { now: 0 }
    }

    /// 前进一步并返回新时间
    pub fn tick(&mut self) -> Tick {
        self.now += 1;
        self.now
    }

    /// 当前时间
    pub fn now(&self) -> Tick {
        self.now
    }
}

/// 从 `(下标, 最后访问时间)` 中选出 LRU 牺牲者
pub(crate) fn select_victim<I>(candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, Tick)>,
{
    candidates
        .into_iter()
        .min_by_key(|&(index, tick)| (tick, index))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_strictly_increases() {
        let mut clock = LogicalClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b > a);
        assert_eq!(clock.now(), b);
    }

    #[test]
    fn test_victim_is_oldest() {
        let ticks = [(0, 7), (1, 3), (2, 9)];
        assert_eq!(select_victim(ticks), Some(1));
    }

    #[test]
    fn test_victim_tie_breaks_to_lowest_index() {
        let ticks = [(2, 4), (0, 5), (1, 4)];
        assert_eq!(select_victim(ticks), Some(1));
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(select_victim(core::iter::empty()), None);
    }
}
