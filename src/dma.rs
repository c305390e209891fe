//! DMA descriptor memory and rings for the SDIO slave link

pub mod descriptor;
pub mod ring;

pub use descriptor::{DescriptorMemory, DescriptorOwner, DmaDescriptor};
pub use ring::{Completed, DescriptorRing};

/// DMA buffer alignment requirement (32-bit word)
pub const DMA_ALIGNMENT: usize = 4;

/// Round a length up to the DMA word size
#[inline]
pub const fn align_dma(len: usize) -> usize {
    (len + DMA_ALIGNMENT - 1) & !(DMA_ALIGNMENT - 1)
}

/// Check if an address is DMA-aligned
#[inline]
pub const fn is_dma_aligned(addr: usize) -> bool {
    addr & (DMA_ALIGNMENT - 1) == 0
}

/// Order descriptor/buffer writes before the DMA engine is told about them
#[inline(always)]
pub(crate) fn dma_barrier() {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m::asm::dsb();
    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}
