//! Bit-level helpers shared by the trie core

use once_cell::sync::Lazy;

/// Most-significant-bit table: entry `i` holds the largest power of two
/// not exceeding `i` (0 for 0). Built once per process on first use.
pub(crate) static MSB_TABLE: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut b = i as u8;
        b |= b >> 1;
        b |= b >> 2;
        b |= b >> 4;
        *entry = b & !(b >> 1);
    }
    table
});

#[inline]
pub(crate) fn msb(byte: u8) -> u8 {
    MSB_TABLE[byte as usize]
}

/// Renders a key for the debug dump: the raw string when every byte is
/// printable, the hex encoding otherwise.
pub(crate) fn key_display(key: &[u8]) -> String {
    if key.iter().all(|&b| b.is_ascii_graphic() || b == b' ') {
        String::from_utf8_lossy(key).into_owned()
    } else {
        key.iter().map(|b| format!("{b:02x}")).collect()
    }
}
