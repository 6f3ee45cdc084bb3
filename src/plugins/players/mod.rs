//! Module plugins: formats that describe a complete tune.

mod ay;
mod sndh;
mod ym;

pub use ay::{parse as parse_ay, AyModule, AyMultitrack, AySong};
pub use sndh::{parse_header as parse_sndh_header, SndhHeader, SndhMultitrack};
pub use ym::YmPlayer;
