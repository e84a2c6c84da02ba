//! Advertised device name.
//!
//! `<prefix><suffix>`: the first [`NAME_PREFIX_LEN`] characters of the
//! configured prefix followed by the last [`NAME_SUFFIX_LEN`] upper-case hex
//! digits of the 64-bit hardware ID (FICR DEVICEID on the nRF52840).

use core::fmt::Write;

use heapless::String;

use crate::config::{DEVICE_NAME_LEN, DEVICE_NAME_PREFIX, NAME_PREFIX_LEN, NAME_SUFFIX_LEN};

/// Build the name from `prefix` and `hw_id`. Non-ASCII prefixes are cut at
/// a character boundary, so the result may be shorter than
/// [`DEVICE_NAME_LEN`] but is always valid UTF-8.
pub fn device_name(prefix: &str, hw_id: u64) -> String<DEVICE_NAME_LEN> {
    let mut name = String::new();
    for c in prefix.chars().take(NAME_PREFIX_LEN) {
        if name.push(c).is_err() {
            break;
        }
    }

    let mask = (1u64 << (4 * NAME_SUFFIX_LEN)) - 1;
    let mut suffix: String<NAME_SUFFIX_LEN> = String::new();
    // Width matches capacity; cannot overflow.
    let _ = write!(suffix, "{:0width$X}", hw_id & mask, width = NAME_SUFFIX_LEN);
    for c in suffix.chars() {
        if name.push(c).is_err() {
            break;
        }
    }
    name
}

/// Name with the configured prefix.
pub fn default_device_name(hw_id: u64) -> String<DEVICE_NAME_LEN> {
    device_name(DEVICE_NAME_PREFIX, hw_id)
}
