use log::Level;
use mmu::{MemorySpace, MmuConfig, Paddr, PhysMem, Request, Vaddr};
use test_support::logger;
use test_support::mock::ram::{MemAccess, MockPhysMem};

/// 集成测试中 `mmu` 不带 `cfg(test)`，需要自己为 Mock 实现接口
struct Recorded(MockPhysMem);

impl PhysMem for Recorded {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn read(&self, paddr: Paddr, out: &mut [u8]) {
        self.0.read_into(paddr.as_u64(), out);
    }

    fn write(&mut self, paddr: Paddr, bytes: &[u8]) {
        self.0.write_from(paddr.as_u64(), bytes);
    }

    fn zero_range(&mut self, paddr: Paddr, len: usize) {
        self.0.zero(paddr.as_u64(), len);
    }
}

impl std::fmt::Debug for Recorded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Recorded").finish()
    }
}

fn one_frame() -> MemorySpace<Recorded> {
    let config = MmuConfig::two_level_32().with_total_frames(1);
    MemorySpace::with_memory(config, Recorded(MockPhysMem::new(4096))).unwrap()
}

#[test]
fn test_dirty_eviction_warns() {
    logger::init();
    let mut space = one_frame();
    space.execute(Request::write_default(0x1000, 1)).unwrap();
    space.execute(Request::read_default(0x2000)).unwrap();

    assert!(logger::contains(Level::Warn, "discarding dirty page"));
    assert!(logger::contains(Level::Debug, "evicting frame"));
    logger::take();
}

#[test]
fn test_clean_eviction_is_quiet() {
    logger::init();
    let mut space = one_frame();
    space.execute(Request::read_default(0x1000)).unwrap();
    space.execute(Request::read_default(0x2000)).unwrap();

    let records = logger::take();
    assert!(records.iter().all(|record| record.level > Level::Warn));
    assert!(
        records
            .iter()
            .any(|record| record.level == Level::Debug && record.message.contains("page fault"))
    );
}

#[test]
fn test_boot_logged_at_info() {
    logger::init();
    let _space = one_frame();
    let records = logger::take();
    assert!(records.iter().any(|record| {
        record.level == Level::Info && record.message.contains("hierarchical table, 1 frames")
    }));
}

#[test]
fn test_reused_frame_zeroed_before_new_owner_writes() {
    logger::init();
    let mut space = one_frame();
    space.store(0, Vaddr(0x1004), 0xAB).unwrap();
    space.memory().0.take_accesses();

    space.store(0, Vaddr(0x2008), 0xCD).unwrap();
    assert_eq!(
        space.memory().0.take_accesses(),
        [
            MemAccess::Zero { addr: 0, len: 4096 },
            MemAccess::Write { addr: 8, len: 1 },
        ]
    );
    assert_eq!(space.load(0, Vaddr(0x2008)).unwrap(), 0xCD);
    logger::take();
}
