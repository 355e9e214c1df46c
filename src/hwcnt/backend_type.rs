use std::env;
use std::io::{Error, ErrorKind, Result};

use bitflags::bitflags;

use crate::product::{ProductId, VersionStyle};
use crate::version::{IoctlIfaceType, KbaseVersion};

/// Environment variable restricting the backend to the one it names.
pub const BACKEND_ENV: &str = "HWCPIPE_BACKEND_INTERFACE";

/// Counter interface used to sample a device, in order of preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendType {
    Vinstr,
    VinstrPreR21,
    KinstrPrfcnt,
    /// Kinstr_prfcnt on drivers reporting sparse shader core indices.
    KinstrPrfcntWa,
    /// Kinstr_prfcnt on drivers with a broken reader setup.
    KinstrPrfcntBad,
}

impl BackendType {
    pub const ALL: [Self; 5] = [
        Self::Vinstr,
        Self::VinstrPreR21,
        Self::KinstrPrfcnt,
        Self::KinstrPrfcntWa,
        Self::KinstrPrfcntBad,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Vinstr => "vinstr",
            Self::VinstrPreR21 => "vinstr_pre_r21",
            Self::KinstrPrfcnt => "kinstr_prfcnt",
            Self::KinstrPrfcntWa => "kinstr_prfcnt_wa",
            Self::KinstrPrfcntBad => "kinstr_prfcnt_bad",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    pub fn is_vinstr(self) -> bool {
        matches!(self, Self::Vinstr | Self::VinstrPreR21)
    }

    fn flag(self) -> BackendTypes {
        match self {
            Self::Vinstr => BackendTypes::VINSTR,
            Self::VinstrPreR21 => BackendTypes::VINSTR_PRE_R21,
            Self::KinstrPrfcnt => BackendTypes::KINSTR_PRFCNT,
            Self::KinstrPrfcntWa => BackendTypes::KINSTR_PRFCNT_WA,
            Self::KinstrPrfcntBad => BackendTypes::KINSTR_PRFCNT_BAD,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BackendTypes: u8 {
        const VINSTR = 1 << 0;
        const VINSTR_PRE_R21 = 1 << 1;
        const KINSTR_PRFCNT = 1 << 2;
        const KINSTR_PRFCNT_WA = 1 << 3;
        const KINSTR_PRFCNT_BAD = 1 << 4;
    }
}

impl From<BackendType> for BackendTypes {
    fn from(ty: BackendType) -> Self {
        ty.flag()
    }
}

// Vinstr cannot describe the 128 counters per block of these GPUs.
fn is_gtux_or_later(product: ProductId) -> bool {
    product.version_style() == VersionStyle::ArchProductMajor && product.arch_major() >= 11
}

fn is_vinstr_available(version: &KbaseVersion, product: ProductId) -> bool {
    if is_gtux_or_later(product) {
        return false;
    }
    match version.ty() {
        IoctlIfaceType::JmPreR21 => true,
        IoctlIfaceType::JmPostR21 => version.is_older_than(IoctlIfaceType::JmPostR21, 11, 40),
        IoctlIfaceType::Csf => version.is_older_than(IoctlIfaceType::Csf, 1, 21),
    }
}

fn is_kinstr_prfcnt_available(version: &KbaseVersion) -> bool {
    version.is_at_least(IoctlIfaceType::JmPostR21, 11, 37)
        || version.is_at_least(IoctlIfaceType::Csf, 1, 17)
}

fn is_kinstr_prfcnt_bad_available(version: &KbaseVersion) -> bool {
    !is_kinstr_prfcnt_available(version)
        && (version.is_at_least(IoctlIfaceType::JmPostR21, 11, 34)
            || version.is_at_least(IoctlIfaceType::Csf, 1, 10))
}

/// Backends the driver supports, restricted by [`BACKEND_ENV`] when it names one.
pub fn discover(version: &KbaseVersion, product: ProductId) -> BackendTypes {
    let name = env::var(BACKEND_ENV).ok();
    apply_override(available(version, product), name.as_deref())
}

pub(crate) fn available(version: &KbaseVersion, product: ProductId) -> BackendTypes {
    if version.is_pre_r21() {
        return BackendTypes::VINSTR_PRE_R21;
    }

    let mut types = BackendTypes::empty();
    if is_vinstr_available(version, product) {
        types |= BackendTypes::VINSTR;
    }
    if is_kinstr_prfcnt_available(version) {
        types |= BackendTypes::KINSTR_PRFCNT;
    }
    if is_kinstr_prfcnt_bad_available(version) {
        types |= BackendTypes::KINSTR_PRFCNT_WA | BackendTypes::KINSTR_PRFCNT_BAD;
    }
    types
}

pub(crate) fn apply_override(types: BackendTypes, name: Option<&str>) -> BackendTypes {
    let Some(name) = name else {
        return types;
    };
    match BackendType::from_name(name) {
        Some(ty) => {
            log::debug!("Backend restricted to {} by {}", ty.name(), BACKEND_ENV);
            types & ty.flag()
        }
        None => {
            log::debug!("Ignoring unknown backend {:?} in {}", name, BACKEND_ENV);
            types
        }
    }
}

/// Picks the preferred backend out of `types`.
pub fn select(types: BackendTypes) -> Result<BackendType> {
    BackendType::ALL
        .into_iter()
        .find(|ty| types.contains(ty.flag()))
        .ok_or_else(|| Error::new(ErrorKind::Unsupported, "no usable counter backend"))
}
