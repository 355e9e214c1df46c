use std::cmp::Ordering;


/// Generation of the kbase ioctl interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IoctlIfaceType {
    /// Job manager driver older than r21, the "UK" interface.
    JmPreR21,
    /// Job manager driver r21 and newer.
    JmPostR21,
    /// Command stream frontend driver.
    Csf,
}

/// Version reported by the kbase `version_check` ioctl.
///
/// Versions are ordered by `(major, minor)` only, the interface type takes
/// no part in comparisons. Compare against a version of the same interface
/// type, see [`KbaseVersion::is_at_least`].
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KbaseVersion {
    major: u16,
    minor: u16,
    ty: IoctlIfaceType,
}

impl KbaseVersion {
    pub const fn new(major: u16, minor: u16, ty: IoctlIfaceType) -> Self {
        Self { major, minor, ty }
    }

    pub const fn major(&self) -> u16 {
        self.major
    }

    pub const fn minor(&self) -> u16 {
        self.minor
    }

    pub const fn ty(&self) -> IoctlIfaceType {
        self.ty
    }

    pub fn is_pre_r21(&self) -> bool {
        self.ty == IoctlIfaceType::JmPreR21
    }

    /// True if this version has interface type `ty` and is not older than
    /// `major.minor`.
    pub fn is_at_least(&self, ty: IoctlIfaceType, major: u16, minor: u16) -> bool {
        self.ty == ty && *self >= Self::new(major, minor, ty)
    }

    /// True if this version has interface type `ty` and is older than
    /// `major.minor`.
    pub fn is_older_than(&self, ty: IoctlIfaceType, major: u16, minor: u16) -> bool {
        self.ty == ty && *self < Self::new(major, minor, ty)
    }
}

impl PartialEq for KbaseVersion {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl Eq for KbaseVersion {}

impl PartialOrd for KbaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KbaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}
