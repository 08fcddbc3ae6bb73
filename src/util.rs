pub mod fs;
pub mod io;

/// Lowercase hex, two characters per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| format!("{byte:02x}")).collect::<Vec<_>>().join("")
}
