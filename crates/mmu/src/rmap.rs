//! 反向映射
//!
//! 帧 → 键 与 键 → 帧 两个方向的索引只在本模块中维护，
//! 任何绑定或解绑都同时更新两侧，不存在各自独立维护的指针图。

use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::address::{Pfn, TranslationKey};

/// 帧与翻译键之间的双向索引
#[derive(Debug, Clone)]
pub struct ReverseMap {
    /// 帧下标 → 占用者
    owners: Vec<Option<TranslationKey>>,
    /// 占用者 → 帧
    frames: HashMap<TranslationKey, Pfn>,
}

impl ReverseMap {
    /// 创建 `total_frames` 个帧均空闲的索引
    pub fn new(total_frames: usize) -> Self {
        Self {
            owners: vec![None; total_frames],
            frames: HashMap::with_capacity(total_frames),
        }
    }

    /// 将空闲帧绑定给 `key`
    pub fn bind(&mut self, key: TranslationKey, pfn: Pfn) {
        debug_assert!(
            self.owners[pfn.index()].is_none(),
            "rmap: frame {pfn} already owned"
        );
        debug_assert!(
            !self.frames.contains_key(&key),
            "rmap: {key} already bound"
        );
        self.owners[pfn.index()] = Some(key);
        self.frames.insert(key, pfn);
    }

    /// 解除帧的绑定，返回原占用者
    pub fn unbind(&mut self, pfn: Pfn) -> Option<TranslationKey> {
        let key = self.owners.get_mut(pfn.index())?.take()?;
        let removed = self.frames.remove(&key);
        debug_assert_eq!(removed, Some(pfn), "rmap: {key} pointed elsewhere");
        Some(key)
    }

    /// 帧的占用者
    pub fn owner(&self, pfn: Pfn) -> Option<TranslationKey> {
        self.owners.get(pfn.index()).copied().flatten()
    }

    /// 键占用的帧
    pub fn frame_of(&self, key: TranslationKey) -> Option<Pfn> {
        self.frames.get(&key).copied()
    }

    /// 已绑定的帧数
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// 是否没有任何绑定
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 按帧号升序遍历 `(帧, 占用者)`
    pub fn iter(&self) -> impl Iterator<Item = (Pfn, TranslationKey)> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter_map(|(index, owner)| owner.map(|key| (Pfn(index), key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Vpn;

    fn key(pid: u64, vpn: u64) -> TranslationKey {
        TranslationKey::new(pid, Vpn(vpn))
    }

    #[test]
    fn test_bind_is_visible_both_ways() {
        let mut rmap = ReverseMap::new(4);
        rmap.bind(key(1, 10), Pfn(2));
        assert_eq!(rmap.owner(Pfn(2)), Some(key(1, 10)));
        assert_eq!(rmap.frame_of(key(1, 10)), Some(Pfn(2)));
        assert_eq!(rmap.len(), 1);
    }

    #[test]
    fn test_unbind_clears_both_ways() {
        let mut rmap = ReverseMap::new(4);
        rmap.bind(key(0, 5), Pfn(0));
        assert_eq!(rmap.unbind(Pfn(0)), Some(key(0, 5)));
        assert_eq!(rmap.owner(Pfn(0)), None);
        assert_eq!(rmap.frame_of(key(0, 5)), None);
        assert!(rmap.is_empty());
    }

    #[test]
    fn test_unbind_free_frame_is_none() {
        let mut rmap = ReverseMap::new(2);
        assert_eq!(rmap.unbind(Pfn(1)), None);
        assert_eq!(rmap.unbind(Pfn(9)), None);
    }

    #[test]
    fn test_iter_in_frame_order() {
        let mut rmap = ReverseMap::new(3);
        rmap.bind(key(0, 7), Pfn(2));
        rmap.bind(key(0, 3), Pfn(0));
        let pairs: Vec<_> = rmap.iter().collect();
        assert_eq!(pairs, [(Pfn(0), key(0, 3)), (Pfn(2), key(0, 7))]);
    }
}
