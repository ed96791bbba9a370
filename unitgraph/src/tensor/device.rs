use serde::{Deserialize, Serialize};

/// Opaque backend tag attached to every tensor.
///
/// The engine never dispatches on the device itself; it only uses the tag to
/// decide buffer padding and whether a zero-copy hand-off is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    CpuAvx,
    CpuAvx2,
    Vulkan,
}

impl Device {
    /// Buffer alignment in bytes.
    pub fn alignment(&self) -> usize {
        match self {
            Device::Cpu => 1,
            Device::CpuAvx | Device::CpuAvx2 => 32,
            Device::Vulkan => 64,
        }
    }

    /// Number of elements to allocate for `len` logical elements of
    /// `elem_size` bytes each.
    pub fn padded_len(&self, len: usize, elem_size: usize) -> usize {
        let align = self.alignment();
        if align <= 1 || elem_size == 0 {
            return len;
        }
        let bytes = len * elem_size;
        let padded = bytes.div_ceil(align) * align;
        padded.div_ceil(elem_size)
    }
}
