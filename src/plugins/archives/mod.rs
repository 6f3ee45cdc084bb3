//! Built-in container and packer plugins.

mod hobeta;
mod ice;
#[cfg(feature = "lha")]
mod lha;
mod scl;

pub use hobeta::HobetaArchive;
pub use ice::IceArchive;
#[cfg(feature = "lha")]
pub use lha::LhaArchive;
pub use scl::SclArchive;

/// TR-DOS file name: 8 padded characters plus a one-letter type, as `NAME.T`.
pub(crate) fn trdos_filename(name: &[u8], kind: u8) -> String {
    let printable = |byte: u8| {
        if (0x20..0x7f).contains(&byte) && !b"/\\?*:|\"<>".contains(&byte) {
            byte as char
        } else {
            '_'
        }
    };
    let stem: String = name.iter().map(|&b| printable(b)).collect();
    let stem = stem.trim_end();
    let stem = if stem.is_empty() { "_" } else { stem };
    format!("{stem}.{}", printable(kind))
}
