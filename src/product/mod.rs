//! GPU product identification.
//!
//! The product id is the upper half of the `GPU_ID` register. Midgard parts
//! use fixed legacy ids, later parts encode the architecture and product
//! major versions.

#[cfg(test)]
mod test;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionStyle {
    LegacyT60x,
    LegacyTxxx,
    ArchProductMajor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GpuFamily {
    Midgard,
    Bifrost,
    Valhall,
}

/// How jobs reach the GPU, which also decides the kbase ioctl flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GpuFrontend {
    /// Job manager.
    Jm,
    /// Command stream frontend.
    Csf,
}

const ID_T60X: u32 = 0x6956;
const LEGACY_MAX: u32 = 0x1000;
const MASK_LEGACY: u32 = 0xffff;
const MASK_MODERN: u32 = 0xf00f;
const ARCH_MAJOR_SHIFT: u32 = 12;
const VERSION_MASK: u32 = 0xf;

const VALHALL_ARCH_MAJOR: u32 = 9;
const CSF_ARCH_MAJOR: u32 = 0xa;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProductId(u32);

impl ProductId {
    pub const T60X: Self = Self(ID_T60X);
    pub const T62X: Self = Self(0x0620);
    pub const T720: Self = Self(0x0720);
    pub const T760: Self = Self(0x0750);
    pub const T820: Self = Self(0x0820);
    pub const T830: Self = Self(0x0830);
    pub const T860: Self = Self(0x0860);
    pub const T880: Self = Self(0x0880);

    pub const G71: Self = Self::from_versions(6, 0);
    pub const G72: Self = Self::from_versions(6, 1);
    pub const G51: Self = Self::from_versions(7, 0);
    pub const G76: Self = Self::from_versions(7, 1);
    pub const G52: Self = Self::from_versions(7, 2);
    pub const G31: Self = Self::from_versions(7, 3);
    pub const G77: Self = Self::from_versions(9, 0);
    pub const G57: Self = Self::from_versions(9, 1);
    pub const G78: Self = Self::from_versions(9, 2);
    pub const G57_2: Self = Self::from_versions(9, 3);
    pub const G68: Self = Self::from_versions(9, 4);
    pub const G78AE: Self = Self::from_versions(9, 5);
    pub const G710: Self = Self::from_versions(10, 2);
    pub const G510: Self = Self::from_versions(10, 3);
    pub const G310: Self = Self::from_versions(10, 4);
    pub const G610: Self = Self::from_versions(10, 7);
    pub const G715: Self = Self::from_versions(11, 2);
    pub const G615: Self = Self::from_versions(11, 3);

    /// Parses a raw product id. Every value is accepted, bits that carry no
    /// meaning for the detected versioning style are dropped.
    pub const fn new(raw: u32) -> Self {
        let mask = match version_style(raw) {
            VersionStyle::LegacyT60x | VersionStyle::LegacyTxxx => MASK_LEGACY,
            VersionStyle::ArchProductMajor => MASK_MODERN,
        };
        Self(raw & mask)
    }

    pub const fn from_versions(arch_major: u32, product_major: u32) -> Self {
        Self(((arch_major & VERSION_MASK) << ARCH_MAJOR_SHIFT) | (product_major & VERSION_MASK))
    }

    /// Extracts the product id from a `GPU_ID` register value.
    pub const fn from_raw_gpu_id(gpu_id: u64) -> Self {
        Self::new(((gpu_id >> 16) & 0xffff) as u32)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn version_style(self) -> VersionStyle {
        version_style(self.0)
    }

    /// Only meaningful for [`VersionStyle::ArchProductMajor`].
    pub const fn arch_major(self) -> u32 {
        (self.0 >> ARCH_MAJOR_SHIFT) & VERSION_MASK
    }

    /// Only meaningful for [`VersionStyle::ArchProductMajor`].
    pub const fn product_major(self) -> u32 {
        self.0 & VERSION_MASK
    }

    pub const fn is_legacy(self) -> bool {
        !matches!(self.version_style(), VersionStyle::ArchProductMajor)
    }

    pub const fn family(self) -> GpuFamily {
        if self.is_legacy() {
            GpuFamily::Midgard
        } else if self.arch_major() < VALHALL_ARCH_MAJOR {
            GpuFamily::Bifrost
        } else {
            GpuFamily::Valhall
        }
    }

    pub const fn frontend(self) -> GpuFrontend {
        if self.is_legacy() || self.arch_major() < CSF_ARCH_MAJOR {
            GpuFrontend::Jm
        } else {
            GpuFrontend::Csf
        }
    }
}

const fn version_style(raw: u32) -> VersionStyle {
    if raw == ID_T60X {
        VersionStyle::LegacyT60x
    } else if raw < LEGACY_MAX {
        VersionStyle::LegacyTxxx
    } else {
        VersionStyle::ArchProductMajor
    }
}

impl From<u32> for ProductId {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}
