use mmu::{Access, Mmu, MmuConfig, TableScheme, Vaddr};

/// 线性同余伪随机数，保证测试可复现
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn configs() -> Vec<MmuConfig> {
    vec![
        MmuConfig::single_level().with_total_frames(8),
        MmuConfig::two_level_32().with_total_frames(8),
        MmuConfig::four_level_64().with_total_frames(8),
        MmuConfig::inverted().with_total_frames(8),
        MmuConfig::new(TableScheme::Inverted {
            buckets: 1,
            vpn_bits: 20,
        })
        .with_total_frames(3)
        .with_tlb_capacity(2),
        MmuConfig::new(TableScheme::Hierarchical {
            level_bits: vec![2, 3, 4],
        })
        .with_total_frames(5)
        .with_tlb_capacity(0),
    ]
}

#[test]
fn test_random_traffic_keeps_invariants() {
    for config in configs() {
        let name = config.scheme.name();
        let mut mmu = Mmu::new(config).unwrap();
        let mut rng = Lcg(0x5EED);
        let mut segfaults = 0;

        for step in 0..2000 {
            let pid = rng.next() % 3;
            // 大部分访问落在少量热点页上，偶尔越界
            let vpn = match rng.next() % 10 {
                0 => rng.next() << 20,
                1..=6 => rng.next() % 6,
                _ => rng.next() % 64,
            };
            let vaddr = Vaddr((vpn << 12) | (rng.next() & 0xFFF));
            let access = if rng.next() % 2 == 0 {
                Access::Read
            } else {
                Access::Write
            };

            match mmu.translate_for(pid, vaddr, access) {
                Ok(translation) => {
                    assert_eq!(translation.paddr.as_u64() & 0xFFF, vaddr.as_u64() & 0xFFF);
                    assert!(translation.pfn.0 < mmu.frames().total_frames());
                }
                Err(err) => {
                    assert_eq!(err.to_code(), -1, "{name}: unexpected {err}");
                    segfaults += 1;
                }
            }
            if let Err(violation) = mmu.check_invariants() {
                panic!("{name}: step {step}: {violation}");
            }
        }

        let stats = mmu.stats();
        assert_eq!(stats.translations, 2000, "{name}");
        assert_eq!(stats.tlb_hits + stats.tlb_misses, stats.translations, "{name}");
        assert_eq!(stats.segfaults, segfaults, "{name}");
        assert!(stats.page_faults >= stats.evictions, "{name}");
        assert_eq!(stats.evictions, mmu.frames().evictions(), "{name}");
        assert!(mmu.frames().allocated_frames() <= mmu.frames().total_frames());
    }
}

#[test]
fn test_distinct_keys_beyond_capacity_evict_oldest() {
    for config in configs() {
        let frames = config.total_frames as u64;
        let name = config.scheme.name();
        let mut mmu = Mmu::new(config).unwrap();
        for vpn in 0..frames {
            mmu.translate(0, Vaddr(vpn << 12)).unwrap();
        }
        // 再触碰第 0 页，第 1 页成为最久未用者
        mmu.translate(0, Vaddr(0)).unwrap();
        let next = mmu.translate(0, Vaddr(frames << 12)).unwrap();
        let evicted = next.evicted.unwrap_or_else(|| panic!("{name}: no eviction"));
        assert_eq!(evicted.key.vpn.0, 1, "{name}");
        assert_eq!(mmu.check_invariants(), Ok(()), "{name}");
    }
}
