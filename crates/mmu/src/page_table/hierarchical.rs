//! 层级页表
//!
//! 虚拟页码自顶向下拆成 N 个索引字段（N 为级数），例如 32 位两级布局
//! `| 目录 (10) | 表 (10) | 偏移 (12) |`，或 64 位四级布局每级 9 位。
//! 遍历算法与级数无关，按级循环：
//!
//! - 非最后一级：下一级表不存在即"目录缺失"，插入时惰性分配并清零
//! - 最后一级：项无效即真正的缺页
//!
//! 根目录的索引不做掩码，超出根目录容量的地址视为段错误。
//! 中间表一旦分配就不再回收：驱逐只作废叶子项。每个进程一棵树，
//! 默认进程的根目录在构造时分配，其它进程在首次插入时分配。

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;

use super::{PageTable, PageTableEntry, PteFlags};
use crate::address::{DEFAULT_PID, Pfn, Pid, TranslationKey, Vpn};
use crate::error::{MmuError, MmuResult};
use crate::trace::{TraceSink, TraceStep};

/// 表节点：中间级只使用 `next`，最后一级只使用 `entries`
#[derive(Debug)]
struct TableNode {
    next: Vec<Option<Box<TableNode>>>,
    entries: Vec<PageTableEntry>,
}

impl TableNode {
    fn directory(len: usize) -> Self {
        Self {
            next: (0..len).map(|_| None).collect(),
            entries: Vec::new(),
        }
    }

    fn leaf(len: usize) -> Self {
        Self {
            next: Vec::new(),
            entries: vec![PageTableEntry::EMPTY; len],
        }
    }

    /// 按级别创建清零的节点，`sizes[level]` 为该级项数
    fn for_level(level: usize, sizes: &[usize]) -> Self {
        if level + 1 == sizes.len() {
            Self::leaf(sizes[level])
        } else {
            Self::directory(sizes[level])
        }
    }
}

/// 层级页表
#[derive(Debug)]
pub struct HierarchicalTable {
    /// 自顶向下每级索引位宽
    level_bits: Vec<u32>,
    /// 每级索引在虚拟页码中的移位量
    shifts: Vec<u32>,
    /// 每个进程的根目录
    roots: HashMap<Pid, TableNode>,
    /// 已分配的表节点数（含根目录）
    nodes: usize,
}

impl HierarchicalTable {
    /// 创建层级页表，`level_bits[0]` 为根目录的索引位宽
    ///
    /// 调用方保证 `level_bits` 非空且每级位宽合法，即已通过配置校验。
    pub(crate) fn new(level_bits: &[u32]) -> Self {
        let shifts = (0..level_bits.len())
            .map(|level| level_bits[level + 1..].iter().sum())
            .collect();
        let mut table = Self {
            level_bits: level_bits.to_vec(),
            shifts,
            roots: HashMap::new(),
            nodes: 0,
        };
        let sizes: Vec<usize> = (0..table.depth()).map(|level| table.entries_at(level)).collect();
        table.roots.insert(DEFAULT_PID, TableNode::for_level(0, &sizes));
        table.nodes = 1;
        table
    }

    /// 级数
    pub fn depth(&self) -> usize {
        self.level_bits.len()
    }

    /// 已分配的表节点数
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// 第 `level` 级表的项数
    pub fn entries_at(&self, level: usize) -> usize {
        1 << self.level_bits[level]
    }

    /// 第 `level` 级的索引；根目录不掩码，以便检测越界
    pub fn index(&self, vpn: Vpn, level: usize) -> u64 {
        let raw = vpn.0 >> self.shifts[level];
        if level == 0 {
            raw
        } else {
            raw & ((1u64 << self.level_bits[level]) - 1)
        }
    }

    fn indices(&self, vpn: Vpn) -> Vec<usize> {
        (0..self.depth())
            .map(|level| self.index(vpn, level) as usize)
            .collect()
    }

    fn leaf_mut(&mut self, key: TranslationKey) -> Option<&mut PageTableEntry> {
        if self.check_bounds(key).is_err() {
            return None;
        }
        let indices = self.indices(key.vpn);
        let (&last, path) = indices.split_last()?;
        let mut node = self.roots.get_mut(&key.pid)?;
        for &index in path {
            node = node.next[index].as_deref_mut()?;
        }
        node.entries.get_mut(last)
    }

    fn collect(
        &self,
        node: &TableNode,
        level: usize,
        pid: Pid,
        prefix: u64,
        out: &mut Vec<(TranslationKey, PageTableEntry)>,
    ) {
        if level + 1 == self.depth() {
            for (index, entry) in node.entries.iter().enumerate() {
                if entry.is_valid() {
                    let vpn = Vpn(prefix | ((index as u64) << self.shifts[level]));
                    out.push((TranslationKey::new(pid, vpn), *entry));
                }
            }
            return;
        }
        for (index, next) in node.next.iter().enumerate() {
            if let Some(next) = next {
                let prefix = prefix | ((index as u64) << self.shifts[level]);
                self.collect(next, level + 1, pid, prefix, out);
            }
        }
    }
}

impl PageTable for HierarchicalTable {
    fn kind(&self) -> &'static str {
        "hierarchical"
    }

    fn check_bounds(&self, key: TranslationKey) -> MmuResult<()> {
        if self.index(key.vpn, 0) >= self.entries_at(0) as u64 {
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
        let last = self.depth() - 1;
        let Some(mut node) = self.roots.get(&key.pid) else {
            trace.record(TraceStep::Level {
                level: 0,
                index: self.index(key.vpn, 0),
                present: false,
            });
            return None;
        };

        for level in 0..last {
            let index = self.index(key.vpn, level);
            match node.next[index as usize].as_deref() {
                Some(next) => {
                    trace.record(TraceStep::Level {
                        level,
                        index,
                        present: true,
                    });
                    node = next;
                }
                None => {
                    trace.record(TraceStep::Level {
                        level,
                        index,
                        present: false,
                    });
                    return None;
                }
            }
        }

        let index = self.index(key.vpn, last);
        let entry = node.entries[index as usize];
        trace.record(TraceStep::Level {
            level: last,
            index,
            present: entry.is_valid(),
        });
        if !entry.is_valid() {
            return None;
        }
        trace.record(TraceStep::Leaf {
            pfn: entry.pfn(),
            flags: entry.flags(),
        });
        Some(entry)
    }

    fn insert(&mut self, key: TranslationKey, pfn: Pfn) -> MmuResult<()> {
        self.check_bounds(key)?;
        let indices = self.indices(key.vpn);
        let sizes: Vec<usize> = (0..self.depth()).map(|level| self.entries_at(level)).collect();
        let (&last, path) = indices
            .split_last()
            .ok_or(MmuError::SegmentationFault {
                pid: key.pid,
                vpn: key.vpn,
            })?;
        let mut created = 0;

        let mut node = self.roots.entry(key.pid).or_insert_with(|| {
            created += 1;
            TableNode::for_level(0, &sizes)
        });
        for (level, &index) in path.iter().enumerate() {
            node = node.next[index]
                .get_or_insert_with(|| {
                    created += 1;
                    log::debug!("directory miss at level {} index {} for {}", level, index, key);
                    Box::new(TableNode::for_level(level + 1, &sizes))
                })
                .as_mut();
        }
        node.entries[last] = PageTableEntry::mapped(pfn);

        self.nodes += created;
        Ok(())
    }

    fn invalidate(&mut self, key: TranslationKey) -> Option<PageTableEntry> {
        let entry = self.leaf_mut(key)?;
        if !entry.is_valid() {
            return None;
        }
        let old = *entry;
        entry.invalidate();
        Some(old)
    }

    fn insert_flags(&mut self, key: TranslationKey, flags: PteFlags) -> MmuResult<()> {
        match self.leaf_mut(key) {
            Some(entry) if entry.is_valid() => {
                entry.insert_flags(flags);
                Ok(())
            }
            _ => Err(MmuError::NotMapped {
                pid: key.pid,
                vpn: key.vpn,
            }),
        }
    }

    fn mappings(&self) -> Vec<(TranslationKey, PageTableEntry)> {
        let mut out = Vec::new();
        for (&pid, root) in &self.roots {
            self.collect(root, 0, pid, 0, &mut out);
        }
        out.sort_by_key(|(key, _)| *key);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(vaddr: u64) -> TranslationKey {
        TranslationKey::new(DEFAULT_PID, Vpn(vaddr >> 12))
    }

    #[test]
    fn test_two_level_indices() {
        let table = HierarchicalTable::new(&[10, 10]);
        let vpn = Vpn(0x1234_5678 >> 12);
        assert_eq!(table.index(vpn, 0), 0x048);
        assert_eq!(table.index(vpn, 1), 0x345);
    }

    #[test]
    fn test_four_level_indices() {
        let table = HierarchicalTable::new(&[9, 9, 9, 9]);
        let vpn = Vpn(0x1A_0020_0300 >> 12);
        let indices: Vec<u64> = (0..4).map(|level| table.index(vpn, level)).collect();
        assert_eq!(indices, [0, 104, 1, 0]);
    }

    #[test]
    fn test_directories_allocated_lazily() {
        let mut table = HierarchicalTable::new(&[10, 10]);
        assert_eq!(table.node_count(), 1);

        table.insert(key(0x0000_1000), Pfn(0)).unwrap();
        assert_eq!(table.node_count(), 2);
        // 同一目录下的另一页不再分配
        table.insert(key(0x0000_2000), Pfn(1)).unwrap();
        assert_eq!(table.node_count(), 2);
        table.insert(key(0x0040_0000), Pfn(2)).unwrap();
        assert_eq!(table.node_count(), 3);

        assert_eq!(table.lookup(key(0x0000_2000)), Some(Pfn(1)));
        assert_eq!(table.lookup(key(0x0080_0000)), None);
    }

    #[test]
    fn test_walk_stops_at_missing_directory() {
        let table = HierarchicalTable::new(&[10, 10]);
        let mut steps: Vec<TraceStep> = Vec::new();
        assert_eq!(table.walk(key(0x0040_0000), &mut steps), None);
        assert_eq!(
            steps,
            [TraceStep::Level {
                level: 0,
                index: 1,
                present: false
            }]
        );
    }

    #[test]
    fn test_top_index_beyond_root_is_segfault() {
        let mut table = HierarchicalTable::new(&[10, 10]);
        // 32 位布局之外的地址，根目录索引为 1024
        let outside = key(1 << 32);
        assert_eq!(
            table.insert(outside, Pfn(0)),
            Err(MmuError::SegmentationFault {
                pid: DEFAULT_PID,
                vpn: outside.vpn
            })
        );
        assert_eq!(table.node_count(), 1);
    }

    #[test]
    fn test_other_pid_gets_own_tree() {
        let mut table = HierarchicalTable::new(&[10, 10]);
        let shared = Vpn(5);
        table.insert(TranslationKey::new(3, shared), Pfn(7)).unwrap();
        assert_eq!(table.node_count(), 3);
        assert_eq!(table.lookup(TranslationKey::new(DEFAULT_PID, shared)), None);
        assert_eq!(table.lookup(TranslationKey::new(3, shared)), Some(Pfn(7)));
    }

    #[test]
    fn test_invalidate_and_dirty() {
        let mut table = HierarchicalTable::new(&[9, 9, 9, 9]);
        let k = key(0x1A_0020_0300);
        table.insert(k, Pfn(4)).unwrap();
        table.insert_flags(k, PteFlags::DIRTY).unwrap();
        let old = table.invalidate(k).unwrap();
        assert!(old.is_dirty());
        assert_eq!(table.lookup(k), None);
        assert!(table.mappings().is_empty());
        assert_eq!(
            table.insert_flags(k, PteFlags::DIRTY),
            Err(MmuError::NotMapped {
                pid: DEFAULT_PID,
                vpn: k.vpn
            })
        );
    }

    #[test]
    fn test_mappings_reconstruct_vpn() {
        let mut table = HierarchicalTable::new(&[9, 9, 9, 9]);
        let k = key(0x1A_0020_0300);
        table.insert(k, Pfn(0)).unwrap();
        let mappings = table.mappings();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].0, k);
    }
}
