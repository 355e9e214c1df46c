use super::*;

#[test]
fn test_legacy_t60x() {
    let id = ProductId::new(0x6956);
    assert_eq!(id.version_style(), VersionStyle::LegacyT60x);
    assert_eq!(id.family(), GpuFamily::Midgard);
    assert_eq!(id.frontend(), GpuFrontend::Jm);
    assert_eq!(id, ProductId::T60X);
}

#[test]
fn test_legacy_txxx() {
    let id = ProductId::new(0x0880);
    assert_eq!(id.version_style(), VersionStyle::LegacyTxxx);
    assert_eq!(id.family(), GpuFamily::Midgard);
    assert_eq!(id.frontend(), GpuFrontend::Jm);
}

#[test]
fn test_arch_product_major() {
    let id = ProductId::new(0xA004);
    assert_eq!(id.version_style(), VersionStyle::ArchProductMajor);
    assert_eq!(id.arch_major(), 0xa);
    assert_eq!(id.product_major(), 0x4);
    assert_eq!(id.family(), GpuFamily::Valhall);
    assert_eq!(id.frontend(), GpuFrontend::Csf);
    assert_eq!(id, ProductId::G310);
}

#[test]
fn test_family_boundaries() {
    assert_eq!(ProductId::G71.family(), GpuFamily::Bifrost);
    assert_eq!(ProductId::G31.family(), GpuFamily::Bifrost);
    assert_eq!(ProductId::G77.family(), GpuFamily::Valhall);
    assert_eq!(ProductId::G78.frontend(), GpuFrontend::Jm);
    assert_eq!(ProductId::G710.frontend(), GpuFrontend::Csf);
}

#[test]
fn test_modern_mask_drops_minor_bits() {
    assert_eq!(ProductId::new(0x9ff2), ProductId::from_versions(9, 2));
}

#[test]
fn test_from_raw_gpu_id() {
    assert_eq!(ProductId::from_raw_gpu_id(0x6956_0010), ProductId::T60X);
    assert_eq!(ProductId::from_raw_gpu_id(0x7212_0000), ProductId::G52);
    assert_eq!(ProductId::from_raw_gpu_id(0xa867_0000), ProductId::G610);
}
