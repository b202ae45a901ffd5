//! Controller REST path templates.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Bytes left as they are inside a row key segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Login endpoint.
pub const LOGIN: &str = "/mgmt/system/user/login";

/// Device configuration lock.
#[must_use]
pub fn lock(device: &str) -> String {
    format!("/mgmt/system/config/tree/device/byip/{device}/lock")
}

/// Device configuration unlock.
#[must_use]
pub fn unlock(device: &str) -> String {
    format!("/mgmt/system/config/tree/device/byip/{device}/unlock")
}

/// Apply pending policy changes on a device.
#[must_use]
pub fn commit(device: &str) -> String {
    format!("/mgmt/device/byip/{device}/config/updatepolicies")
}

/// Full listing of a configuration table.
#[must_use]
pub fn table(device: &str, table: &str) -> String {
    format!("/mgmt/device/byip/{device}/config/{table}")
}

/// One row of a configuration table, addressed by its key segments.
///
/// Each segment is percent-encoded, so `/`, `?` and `#` in a name stay
/// part of that name.
#[must_use]
pub fn row<S: AsRef<str>>(device: &str, table: &str, segments: &[S]) -> String {
    let mut path = self::table(device, table);
    for segment in segments {
        path.push('/');
        path.extend(utf8_percent_encode(segment.as_ref(), SEGMENT));
    }
    path
}

/// Whether a key part can address a row. `.` and `..` are resolved away
/// by URL normalization even when encoded.
#[must_use]
pub fn is_addressable(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

/// Read-only item listing used by get operations.
#[must_use]
pub fn itemlist(device: &str, table: &str) -> String {
    format!("/mgmt/v2/devices/{device}/config/itemlist/{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(
            lock("10.105.192.32"),
            "/mgmt/system/config/tree/device/byip/10.105.192.32/lock"
        );
        assert_eq!(
            commit("10.105.192.32"),
            "/mgmt/device/byip/10.105.192.32/config/updatepolicies"
        );
        assert_eq!(
            row("1.2.3.4", "rsIDSConnectionLimitProfileTable", &["c1", "m1"]),
            "/mgmt/device/byip/1.2.3.4/config/rsIDSConnectionLimitProfileTable/c1/m1"
        );
        assert_eq!(
            itemlist("1.2.3.4", "rsBWMNetworkTable"),
            "/mgmt/v2/devices/1.2.3.4/config/itemlist/rsBWMNetworkTable"
        );
    }

    #[test]
    fn test_row_segments_are_encoded() {
        assert_eq!(
            row("1.2.3.4", "rsNetFloodProfileTable", &["web#old"]),
            "/mgmt/device/byip/1.2.3.4/config/rsNetFloodProfileTable/web%23old"
        );
        assert_eq!(
            row("1.2.3.4", "rsIDSSynProfilesTable", &["a/b", "c?d e"]),
            "/mgmt/device/byip/1.2.3.4/config/rsIDSSynProfilesTable/a%2Fb/c%3Fd%20e"
        );
        assert!(!is_addressable(".."));
        assert!(!is_addressable("."));
        assert!(is_addressable("web.v2"));
    }
}
