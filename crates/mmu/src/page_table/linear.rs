//! 单级页表
//!
//! 每个进程一张 `max_pages` 项的平坦数组，虚拟页码直接作下标。
//! `vpn >= max_pages` 视为段错误。默认进程的表在构造时分配，
//! 其它进程的表在首次插入时分配。

use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;

use super::{PageTable, PageTableEntry, PteFlags};
use crate::address::{DEFAULT_PID, Pfn, Pid, TranslationKey, Vpn};
use crate::error::{MmuError, MmuResult};
use crate::trace::{TraceSink, TraceStep};

/// 单级页表
#[derive(Debug)]
pub struct LinearTable {
    max_pages: u64,
    tables: HashMap<Pid, Vec<PageTableEntry>>,
}

impl LinearTable {
    /// 创建可表示 `max_pages` 个虚拟页的单级页表
    pub(crate) fn new(max_pages: u64) -> Self {
        let mut tables = HashMap::new();
        tables.insert(DEFAULT_PID, vec![PageTableEntry::EMPTY; max_pages as usize]);
        Self { max_pages, tables }
    }

    /// 可表示的虚拟页数
    pub fn max_pages(&self) -> u64 {
        self.max_pages
    }

    fn entry_mut(&mut self, key: TranslationKey) -> Option<&mut PageTableEntry> {
        self.tables
            .get_mut(&key.pid)?
            .get_mut(key.vpn.0 as usize)
    }
}

impl PageTable for LinearTable {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn check_bounds(&self, key: TranslationKey) -> MmuResult<()> {
        if key.vpn.0 >= self.max_pages {
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
        let entry = self
            .tables
            .get(&key.pid)
            .and_then(|table| table.get(key.vpn.0 as usize))
            .copied()
            .filter(PageTableEntry::is_valid);
        trace.record(TraceStep::LinearIndex {
            index: key.vpn.0,
            present: entry.is_some(),
        });
        let entry = entry?;
        trace.record(TraceStep::Leaf {
            pfn: entry.pfn(),
            flags: entry.flags(),
        });
        Some(entry)
    }

    fn insert(&mut self, key: TranslationKey, pfn: Pfn) -> MmuResult<()> {
        self.check_bounds(key)?;
        let max_pages = self.max_pages as usize;
        let table = self.tables.entry(key.pid).or_insert_with(|| {
            log::debug!("allocating linear table for pid {}", key.pid);
            vec![PageTableEntry::EMPTY; max_pages]
        });
        table[key.vpn.0 as usize] = PageTableEntry::mapped(pfn);
        Ok(())
    }

    fn invalidate(&mut self, key: TranslationKey) -> Option<PageTableEntry> {
        let entry = self.entry_mut(key)?;
        if !entry.is_valid() {
            return None;
        }
        let old = *entry;
        entry.invalidate();
        Some(old)
    }

    fn insert_flags(&mut self, key: TranslationKey, flags: PteFlags) -> MmuResult<()> {
        match self.entry_mut(key) {
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
        let mut out: Vec<_> = self
            .tables
            .iter()
            .flat_map(|(&pid, table)| {
                table
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.is_valid())
                    .map(move |(vpn, entry)| (TranslationKey::new(pid, Vpn(vpn as u64)), *entry))
            })
            .collect();
        out.sort_by_key(|(key, _)| *key);
        out
    }
}
