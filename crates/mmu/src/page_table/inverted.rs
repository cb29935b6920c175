//! 倒排页表
//!
//! 固定数量的桶，`(pid ^ vpn) % buckets` 选桶，冲突用单链表串起来。
//! 链上每个键至多一个节点：插入先查找，找到就原地更新，否则头插。
//!
//! 作废即从链上摘除节点，所以节点总数等于有效映射数，不超过物理帧数。

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::{PageTable, PageTableEntry, PteFlags};
use crate::address::{Pfn, Pid, TranslationKey, Vpn};
use crate::error::{MmuError, MmuResult};
use crate::trace::{TraceSink, TraceStep};

#[derive(Debug)]
struct ChainNode {
    pid: Pid,
    vpn: Vpn,
    entry: PageTableEntry,
    next: Option<Box<ChainNode>>,
}

impl ChainNode {
    fn matches(&self, key: TranslationKey) -> bool {
        self.pid == key.pid && self.vpn == key.vpn
    }
}

/// 倒排页表
#[derive(Debug)]
pub struct InvertedTable {
    buckets: Vec<Option<Box<ChainNode>>>,
    /// 可表示的虚拟页码位宽
    vpn_bits: u32,
    /// 链上节点总数
    nodes: usize,
}

impl InvertedTable {
    /// 创建 `buckets` 个空桶的倒排页表，`buckets` 由配置校验保证非零
    pub(crate) fn new(buckets: usize, vpn_bits: u32) -> Self {
        debug_assert!(buckets > 0, "inverted table needs at least one bucket");
        Self {
            buckets: (0..buckets).map(|_| None).collect(),
            vpn_bits,
            nodes: 0,
        }
    }

    /// 桶数
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 键所在的桶
    pub fn bucket_of(&self, key: TranslationKey) -> usize {
        ((key.pid ^ key.vpn.0) % self.buckets.len() as u64) as usize
    }

    /// 桶上的链长
    pub fn chain_len(&self, bucket: usize) -> usize {
        let mut len = 0;
        let mut cursor = self.buckets.get(bucket).and_then(|head| head.as_deref());
        while let Some(node) = cursor {
            len += 1;
            cursor = node.next.as_deref();
        }
        len
    }

    /// 链上节点总数
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    fn find_mut(&mut self, key: TranslationKey) -> Option<&mut ChainNode> {
        let bucket = self.bucket_of(key);
        let mut cursor = self.buckets[bucket].as_deref_mut();
        while let Some(node) = cursor {
            if node.matches(key) {
                return Some(node);
            }
            cursor = node.next.as_deref_mut();
        }
        None
    }

    /// 把键的节点从链上摘下
    fn unlink(&mut self, key: TranslationKey) -> Option<Box<ChainNode>> {
        let bucket = self.bucket_of(key);
        let mut link = &mut self.buckets[bucket];
        while link.as_ref().is_some_and(|node| !node.matches(key)) {
            link = &mut link.as_mut()?.next;
        }
        let mut node = link.take()?;
        *link = node.next.take();
        self.nodes -= 1;
        Some(node)
    }
}

impl PageTable for InvertedTable {
    fn kind(&self) -> &'static str {
        "inverted"
    }

    fn check_bounds(&self, key: TranslationKey) -> MmuResult<()> {
        if self.vpn_bits < u64::BITS && key.vpn.0 >> self.vpn_bits != 0 {
            return Err(MmuError::SegmentationFault {
                pid: key.pid,
                vpn: key.vpn,
            });
        }
        Ok(())
    }

    fn walk(&self, key: TranslationKey, trace: &mut dyn TraceSink) -> Option<PageTableEntry> {
        if self.check_bounds(key).is_err() {
            trace.record(TraceStep::OutOfBounds);
            return None;
        }
        let index = self.bucket_of(key);
        let mut cursor = self.buckets[index].as_deref();
        trace.record(TraceStep::Bucket {
            index,
            empty: cursor.is_none(),
        });

        let mut position = 0;
        while let Some(node) = cursor {
            position += 1;
            let matched = node.matches(key);
            trace.record(TraceStep::ChainNode {
                position,
                pid: node.pid,
                vpn: node.vpn,
                matched,
            });
            if matched {
                trace.record(TraceStep::Leaf {
                    pfn: node.entry.pfn(),
                    flags: node.entry.flags(),
                });
                return Some(node.entry);
            }
            cursor = node.next.as_deref();
        }
        None
    }

    fn insert(&mut self, key: TranslationKey, pfn: Pfn) -> MmuResult<()> {
        self.check_bounds(key)?;
        if let Some(node) = self.find_mut(key) {
            node.entry = PageTableEntry::mapped(pfn);
            return Ok(());
        }

        let bucket = self.bucket_of(key);
        let next = self.buckets[bucket].take();
        if next.is_some() {
            log::debug!("bucket {} collision, chaining {}", bucket, key);
        }
        self.buckets[bucket] = Some(Box::new(ChainNode {
            pid: key.pid,
            vpn: key.vpn,
            entry: PageTableEntry::mapped(pfn),
            next,
        }));
        self.nodes += 1;
        Ok(())
    }

    fn invalidate(&mut self, key: TranslationKey) -> Option<PageTableEntry> {
        let node = self.unlink(key)?;
        Some(node.entry)
    }

    fn insert_flags(&mut self, key: TranslationKey, flags: PteFlags) -> MmuResult<()> {
        match self.find_mut(key) {
            Some(node) => {
                node.entry.insert_flags(flags);
                Ok(())
            }
            None => Err(MmuError::NotMapped {
                pid: key.pid,
                vpn: key.vpn,
            }),
        }
    }

    fn mappings(&self) -> Vec<(TranslationKey, PageTableEntry)> {
        let mut out = Vec::new();
        for head in &self.buckets {
            let mut cursor = head.as_deref();
            while let Some(node) = cursor {
                out.push((TranslationKey::new(node.pid, node.vpn), node.entry));
                cursor = node.next.as_deref();
            }
        }
        out.sort_by_key(|(key, _)| *key);
        out
    }
}

impl Drop for InvertedTable {
    // 逐个拆链，避免长链递归析构
    fn drop(&mut self) {
        for head in &mut self.buckets {
            let mut cursor = head.take();
            while let Some(mut node) = cursor {
                cursor = node.next.take();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_allocator::{Eviction, FrameAllocator};
    use alloc::vec;

    fn key(pid: Pid, vpn: u64) -> TranslationKey {
        TranslationKey::new(pid, Vpn(vpn))
    }

    #[test]
    fn test_colliding_keys_share_a_bucket() {
        let mut table = InvertedTable::new(10, 52);
        let a = key(1, 0xA);
        let b = key(1, 0x0);
        assert_eq!(table.bucket_of(a), 1);
        assert_eq!(table.bucket_of(b), 1);

        table.insert(a, Pfn(0)).unwrap();
        table.insert(b, Pfn(1)).unwrap();
        assert_eq!(table.chain_len(1), 2);
        assert_eq!(table.lookup(a), Some(Pfn(0)));
        assert_eq!(table.lookup(b), Some(Pfn(1)));
    }

    #[test]
    fn test_walk_visits_chain_head_first() {
        let mut table = InvertedTable::new(10, 52);
        table.insert(key(1, 0xA), Pfn(0)).unwrap();
        table.insert(key(1, 0x0), Pfn(1)).unwrap();

        let mut steps: Vec<TraceStep> = Vec::new();
        let entry = table.walk(key(1, 0xA), &mut steps);
        assert_eq!(entry.map(|entry| entry.pfn()), Some(Pfn(0)));
        assert_eq!(
            steps[..3],
            [
                TraceStep::Bucket {
                    index: 1,
                    empty: false
                },
                TraceStep::ChainNode {
                    position: 1,
                    pid: 1,
                    vpn: Vpn(0),
                    matched: false
                },
                TraceStep::ChainNode {
                    position: 2,
                    pid: 1,
                    vpn: Vpn(0xA),
                    matched: true
                },
            ]
        );
    }

    #[test]
    fn test_same_vpn_different_pid_is_distinct() {
        let mut table = InvertedTable::new(10, 52);
        table.insert(key(1, 5), Pfn(3)).unwrap();
        table.insert(key(2, 5), Pfn(4)).unwrap();
        assert_eq!(table.lookup(key(1, 5)), Some(Pfn(3)));
        assert_eq!(table.lookup(key(2, 5)), Some(Pfn(4)));
        assert_eq!(table.lookup(key(3, 5)), None);
    }

    #[test]
    fn test_invalidate_unlinks_node() {
        let mut table = InvertedTable::new(10, 52);
        assert_eq!(table.bucket_count(), 10);
        // 三个键都落在 1 号桶，链为 0x14 -> 0x0 -> 0xA
        for (pfn, vpn) in [0xA, 0x0, 0x14].into_iter().enumerate() {
            table.insert(key(1, vpn), Pfn(pfn)).unwrap();
        }
        assert_eq!(table.chain_len(1), 3);

        let middle = key(1, 0x0);
        assert_eq!(table.invalidate(middle).map(|entry| entry.pfn()), Some(Pfn(1)));
        assert_eq!(table.invalidate(middle), None);
        assert_eq!(table.chain_len(1), 2);
        assert_eq!(table.node_count(), 2);
        assert_eq!(table.lookup(middle), None);
        assert_eq!(table.lookup(key(1, 0xA)), Some(Pfn(0)));
        assert_eq!(table.lookup(key(1, 0x14)), Some(Pfn(2)));

        let mut steps: Vec<TraceStep> = Vec::new();
        assert_eq!(table.walk(middle, &mut steps), None);
        assert_eq!(steps.len(), 3);

        table.insert(middle, Pfn(5)).unwrap();
        assert_eq!(table.node_count(), 3);
        assert_eq!(table.lookup(middle), Some(Pfn(5)));
    }

    #[test]
    fn test_node_count_bounded_by_frames() {
        let mut table = InvertedTable::new(10, 52);
        let mut frames = FrameAllocator::new(32);
        for (now, vpn) in (1..).zip(0..10_000) {
            table
                .resolve(key(0, vpn), &mut frames, now, &mut |_: Eviction| {})
                .unwrap();
        }
        assert_eq!(table.node_count(), 32);
        assert_eq!(table.mappings().len(), 32);
        let chained: usize = (0..table.bucket_count())
            .map(|bucket| table.chain_len(bucket))
            .sum();
        assert_eq!(chained, 32);
    }

    #[test]
    fn test_vpn_beyond_width_is_segfault() {
        let table = InvertedTable::new(10, 20);
        assert!(table.check_bounds(key(0, (1 << 20) - 1)).is_ok());
        assert_eq!(
            table.check_bounds(key(0, 1 << 20)),
            Err(MmuError::SegmentationFault {
                pid: 0,
                vpn: Vpn(1 << 20)
            })
        );
        let full = InvertedTable::new(10, 64);
        assert!(full.check_bounds(key(0, u64::MAX)).is_ok());
    }

    #[test]
    fn test_dirty_flag_on_absent_key_is_not_mapped() {
        let mut table = InvertedTable::new(10, 52);
        assert_eq!(
            table.insert_flags(key(0, 1), PteFlags::DIRTY),
            Err(MmuError::NotMapped { pid: 0, vpn: Vpn(1) })
        );
        table.insert(key(0, 1), Pfn(0)).unwrap();
        table.insert_flags(key(0, 1), PteFlags::DIRTY).unwrap();
        assert_eq!(
            table.mappings(),
            vec![(key(0, 1), {
                let mut entry = PageTableEntry::mapped(Pfn(0));
                entry.insert_flags(PteFlags::DIRTY);
                entry
            })]
        );
    }
}
