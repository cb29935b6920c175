//! 内存空间核心实现

use core::cmp::min;

use alloc::vec::Vec;

use super::phys::{PhysMem, Ram};
use crate::address::{Paddr, Pfn, Pid, Vaddr, VpnRange, offset_mask};
use crate::config::MmuConfig;
use crate::error::{ConfigError, MmuError, MmuResult};
use crate::mmu::{Access, Mmu, Translation};
use crate::request::{Operation, Request, Response};
use crate::trace::TranslationTrace;

/// 翻译管理器与物理内存的组合，执行请求流
#[derive(Debug)]
pub struct MemorySpace<M: PhysMem = Ram> {
    mmu: Mmu,
    memory: M,
}

impl MemorySpace<Ram> {
    /// 按配置启动，物理内存为 `total_frames * page_size` 字节的 [`Ram`]
    pub fn new(config: MmuConfig) -> MmuResult<Self> {
        config.validate()?;
        let size = config.memory_size().ok_or(ConfigError::MemoryTooLarge)?;
        Self::with_memory(config, Ram::new(size))
    }
}

impl<M: PhysMem> MemorySpace<M> {
    /// 使用给定的物理内存启动
    ///
    /// 内存小于 `total_frames * page_size` 时返回 [`ConfigError::MemoryTooSmall`]。
    pub fn with_memory(config: MmuConfig, memory: M) -> MmuResult<Self> {
        let mmu = Mmu::new(config)?;
        let required = mmu
            .config()
            .memory_size()
            .ok_or(ConfigError::MemoryTooLarge)?;
        if memory.len() < required {
            return Err(ConfigError::MemoryTooSmall {
                required,
                actual: memory.len(),
            }
            .into());
        }
        Ok(Self { mmu, memory })
    }

    /// 返回翻译管理器的引用
    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    /// 返回翻译管理器的可变引用
    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    /// 返回物理内存的引用
    pub fn memory(&self) -> &M {
        &self.memory
    }

    fn page_size(&self) -> usize {
        self.mmu.config().page_size
    }

    fn zero_frame(&mut self, pfn: Pfn) {
        let base = Paddr::compose(pfn, 0, self.mmu.offset_bits());
        let page_size = self.page_size();
        self.memory.zero_range(base, page_size);
    }

    /// 翻译一个地址；新分配的帧在返回前清零
    fn access(&mut self, pid: Pid, vaddr: Vaddr, access: Access) -> MmuResult<Translation> {
        let translation = self.mmu.translate_for(pid, vaddr, access)?;
        if translation.page_fault {
            self.zero_frame(translation.pfn);
        }
        Ok(translation)
    }

    /// 写一个字节，返回写入的物理地址
    pub fn store(&mut self, pid: Pid, vaddr: Vaddr, value: u8) -> MmuResult<Paddr> {
        let translation = self.access(pid, vaddr, Access::Write)?;
        self.memory.write(translation.paddr, &[value]);
        Ok(translation.paddr)
    }

    /// 读一个字节
    pub fn load(&mut self, pid: Pid, vaddr: Vaddr) -> MmuResult<u8> {
        let translation = self.access(pid, vaddr, Access::Read)?;
        let mut byte = [0u8; 1];
        self.memory.read(translation.paddr, &mut byte);
        Ok(byte[0])
    }

    /// 向指定虚拟地址写入字节序列（跨页安全）
    pub fn write_bytes_at(&mut self, pid: Pid, vaddr: Vaddr, bytes: &[u8]) -> MmuResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let page_size = self.page_size();
        let mask = offset_mask(self.mmu.offset_bits());
        let mut written = 0usize;
        while written < bytes.len() {
            let cur = vaddr
                .checked_add(written as u64)
                .ok_or(MmuError::InvalidAddress)?;
            let translation = self.access(pid, cur, Access::Write)?;
            let page_off = (translation.paddr.as_u64() & mask) as usize;

            let take = min(bytes.len() - written, page_size - page_off);
            self.memory
                .write(translation.paddr, &bytes[written..written + take]);
            written += take;
        }

        Ok(())
    }

    /// 从指定虚拟地址读取字节序列（跨页安全）
    pub fn read_bytes_at(&mut self, pid: Pid, vaddr: Vaddr, out: &mut [u8]) -> MmuResult<()> {
        if out.is_empty() {
            return Ok(());
        }

        let page_size = self.page_size();
        let mask = offset_mask(self.mmu.offset_bits());
        let mut read = 0usize;
        while read < out.len() {
            let cur = vaddr
                .checked_add(read as u64)
                .ok_or(MmuError::InvalidAddress)?;
            let translation = self.access(pid, cur, Access::Read)?;
            let page_off = (translation.paddr.as_u64() & mask) as usize;

            let take = min(out.len() - read, page_size - page_off);
            self.memory
                .read(translation.paddr, &mut out[read..read + take]);
            read += take;
        }
        Ok(())
    }

    /// 读取 u64
    pub fn read_u64_at(&mut self, pid: Pid, vaddr: Vaddr) -> MmuResult<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes_at(pid, vaddr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// 写入 u64
    pub fn write_u64_at(&mut self, pid: Pid, vaddr: Vaddr, value: u64) -> MmuResult<()> {
        self.write_bytes_at(pid, vaddr, &value.to_le_bytes())
    }

    /// 可视化一次翻译，不分配帧
    pub fn visualize(&mut self, pid: Pid, vaddr: Vaddr) -> TranslationTrace {
        self.mmu.visualize(pid, vaddr)
    }

    /// 预先映射一段虚拟页，新分配的帧清零
    pub fn premap(&mut self, pid: Pid, vpns: VpnRange) -> MmuResult<Vec<Pfn>> {
        let pages = self.mmu.premap(pid, vpns)?;
        let mut pfns = Vec::with_capacity(pages.len());
        for page in pages {
            if page.page_fault {
                self.zero_frame(page.pfn);
            }
            pfns.push(page.pfn);
        }
        Ok(pfns)
    }

    /// 执行一条请求
    pub fn execute(&mut self, request: Request) -> MmuResult<Response> {
        log::debug!("request: {}", request);
        match request.op {
            Operation::Read => self
                .load(request.pid, request.vaddr)
                .map(Response::Read),
            Operation::Write(value) => self
                .store(request.pid, request.vaddr, value)
                .map(Response::Written),
            Operation::Visualize => Ok(Response::Trace(
                self.visualize(request.pid, request.vaddr),
            )),
        }
    }

    /// 依次执行请求流；单条请求失败不影响后续请求
    pub fn run<I>(&mut self, requests: I) -> Vec<MmuResult<Response>>
    where
        I: IntoIterator<Item = Request>,
    {
        requests
            .into_iter()
            .map(|request| self.execute(request))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Vpn;
    use test_support::mock::ram::{MemAccess, MockPhysMem};

    fn small(frames: usize) -> MmuConfig {
        MmuConfig::single_level()
            .with_total_frames(frames)
            .with_tlb_capacity(2)
    }

    #[test]
    fn test_memory_too_small_rejected() {
        let err = MemorySpace::with_memory(small(4), MockPhysMem::new(4096)).unwrap_err();
        assert_eq!(
            err,
            MmuError::InvalidConfig(ConfigError::MemoryTooSmall {
                required: 4 * 4096,
                actual: 4096
            })
        );
    }

    #[test]
    fn test_faulted_frame_zeroed_before_write() {
        let mut space =
            MemorySpace::with_memory(small(2), MockPhysMem::filled(2 * 4096, 0xEE)).unwrap();
        let paddr = space.store(0, Vaddr(0x1010), 0x42).unwrap();
        assert_eq!(paddr, Paddr(0x010));
        assert_eq!(
            space.memory().take_accesses(),
            [
                MemAccess::Zero { addr: 0, len: 4096 },
                MemAccess::Write { addr: 0x10, len: 1 },
            ]
        );
        assert_eq!(space.load(0, Vaddr(0x1011)).unwrap(), 0);
        assert_eq!(space.memory().bytes()[0x1000], 0xEE);
    }

    #[test]
    fn test_cross_page_bytes_round_trip() {
        let mut space = MemorySpace::new(small(4)).unwrap();
        let data: Vec<u8> = (0..16).collect();
        space.write_bytes_at(0, Vaddr(0x2FF8), &data).unwrap();

        let mut out = [0u8; 16];
        space.read_bytes_at(0, Vaddr(0x2FF8), &mut out).unwrap();
        assert_eq!(out[..], data[..]);
        assert_eq!(space.mmu().frames().allocated_frames(), 2);
    }

    #[test]
    fn test_u64_helpers() {
        let mut space = MemorySpace::new(small(4)).unwrap();
        space.write_u64_at(0, Vaddr(0x4FFC), 0x1122_3344_5566_7788).unwrap();
        assert_eq!(space.read_u64_at(0, Vaddr(0x4FFC)).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_address_wraparound_is_invalid() {
        let config = MmuConfig::inverted().with_total_frames(4);
        let mut space = MemorySpace::new(config).unwrap();
        let mut out = [0u8; 2];
        assert_eq!(
            space.read_bytes_at(0, Vaddr(u64::MAX), &mut out),
            Err(MmuError::InvalidAddress)
        );
    }

    #[test]
    fn test_premap_zeroes_new_frames() {
        let mut space =
            MemorySpace::with_memory(small(4), MockPhysMem::filled(4 * 4096, 0xFF)).unwrap();
        let pfns = space
            .premap(0, VpnRange::from_start_len(Vpn(0), 2))
            .unwrap();
        assert_eq!(pfns, [Pfn(0), Pfn(1)]);
        assert_eq!(space.memory().bytes()[..2 * 4096].iter().max(), Some(&0));
        assert_eq!(space.memory().bytes()[2 * 4096], 0xFF);
    }

    #[test]
    fn test_run_continues_after_segfault() {
        let mut space = MemorySpace::new(small(4)).unwrap();
        let results = space.run([
            Request::write_default(0x1000, 7),
            Request::read_default(1000 << 12),
            Request::read_default(0x1000),
        ]);
        assert_eq!(results[0], Ok(Response::Written(Paddr(0))));
        assert_eq!(results[1].as_ref().map_err(MmuError::to_code), Err(-1));
        assert_eq!(results[2], Ok(Response::Read(7)));
    }
}
