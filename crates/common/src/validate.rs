//! Field validation and interface naming helpers

use crate::{Error, Result};

/// Lowest VNI accepted for overlay segments (below this range is reserved)
pub const VNI_MIN: u32 = 4096;

/// 24-bit VNI ceiling
pub const VNI_MAX: u32 = 16_777_215;

/// Minimum IPv6-capable MTU
pub const MTU_MIN: u32 = 1280;

/// Jumbo frame ceiling
pub const MTU_MAX: u32 = 9000;

/// VxLAN encapsulation overhead in bytes (outer IPv4 + UDP + VxLAN header)
pub const ENCAPSULATION_OVERHEAD: u32 = 50;

/// Check a VNI against the accepted range
pub fn check_vni(vni: u32) -> Result<()> {
    if !(VNI_MIN..=VNI_MAX).contains(&vni) {
        return Err(Error::Validation(format!(
            "invalid VNI {}: must be between {} and {}",
            vni, VNI_MIN, VNI_MAX
        )));
    }
    Ok(())
}

/// Check an MTU against the accepted range
pub fn check_mtu(mtu: u32) -> Result<()> {
    if !(MTU_MIN..=MTU_MAX).contains(&mtu) {
        return Err(Error::Validation(format!(
            "invalid MTU {}: must be between {} and {}",
            mtu, MTU_MIN, MTU_MAX
        )));
    }
    Ok(())
}

/// Overlay MTU for a given underlay MTU
pub fn overlay_mtu(underlay_mtu: u32) -> u32 {
    underlay_mtu.saturating_sub(ENCAPSULATION_OVERHEAD)
}

/// Canonical interface (and default store id) name for a VNI
pub fn derive_interface_name(vni: u32) -> String {
    format!("vxlan{}", vni)
}

/// Labelled interface name, e.g. `vxlan-site1-site2-5000`
///
/// Labels beyond the second are dropped to keep names within IFNAMSIZ-ish
/// bounds, matching the simple/labelled/connection naming patterns.
pub fn labeled_interface_name(vni: u32, labels: &[&str]) -> String {
    match labels {
        [] => derive_interface_name(vni),
        [a] => format!("vxlan-{}-{}", a, vni),
        [a, b, ..] => format!("vxlan-{}-{}-{}", a, b, vni),
    }
}

/// Recover the VNI from a name produced by the generators above
pub fn parse_interface_name(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("vxlan")?;
    if let Ok(vni) = rest.parse::<u32>() {
        return Some(vni);
    }
    // labelled form: the VNI is the final dash-separated segment
    rest.strip_prefix('-')?
        .rsplit('-')
        .next()
        .and_then(|tail| tail.parse().ok())
}
