//! Byte fixtures shared by the integration tests.

#![allow(dead_code)]

/// YM6 file with `frames` register frames.
pub fn ym6(title: &str, frames: u32) -> Vec<u8> {
    let mut data = b"YM6!LeOnArD!".to_vec();
    data.extend_from_slice(&frames.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // attributes
    data.extend_from_slice(&0u16.to_be_bytes()); // digidrums
    data.extend_from_slice(&2_000_000u32.to_be_bytes());
    data.extend_from_slice(&50u16.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // loop frame
    data.extend_from_slice(&0u16.to_be_bytes()); // extra data
    for text in [title, "Test Author", ""] {
        data.extend_from_slice(text.as_bytes());
        data.push(0);
    }
    for frame in 0..frames {
        data.extend_from_slice(&[frame as u8 | 0x01; 16]);
    }
    data.extend_from_slice(b"End!");
    data
}

/// AY file with one song per name.
pub fn ay(author: &str, songs: &[&str]) -> Vec<u8> {
    const HEADER: usize = 20;
    const SONG_DATA: usize = 14;

    fn put_ptr(data: &mut [u8], at: usize, target: usize) {
        let rel = (target as isize - at as isize) as i16;
        data[at..at + 2].copy_from_slice(&rel.to_be_bytes());
    }

    let count = songs.len();
    let song_data = HEADER + 4 * count;
    let points = song_data + SONG_DATA * count;
    let blocks = points + 6 * count;
    let payload = blocks + 8 * count;
    let strings = payload + 4;

    let mut data = vec![0u8; strings];
    data[..8].copy_from_slice(b"ZXAYEMUL");
    data[8..10].copy_from_slice(&3u16.to_be_bytes());
    data[10] = 3;
    data[16] = (count - 1) as u8;
    put_ptr(&mut data, 18, HEADER);
    data[payload..payload + 4].copy_from_slice(&[0xF3, 0x18, 0xFE, 0xC9]);

    let mut text: Vec<u8> = Vec::new();
    let mut add_string = |data: &mut Vec<u8>, at: usize, value: &str| {
        put_ptr(data, at, strings + text.len());
        text.extend_from_slice(value.as_bytes());
        text.push(0);
    };
    add_string(&mut data, 12, author);
    add_string(&mut data, 14, "Integration");
    for (idx, name) in songs.iter().enumerate() {
        let entry = HEADER + idx * 4;
        let song = song_data + idx * SONG_DATA;
        let point = points + idx * 6;
        let block = blocks + idx * 8;
        add_string(&mut data, entry, name);
        put_ptr(&mut data, entry + 2, song);
        data[song + 4..song + 6].copy_from_slice(&3000u16.to_be_bytes());
        put_ptr(&mut data, song + 10, point);
        put_ptr(&mut data, song + 12, block);
        data[point + 2..point + 4].copy_from_slice(&0x8000u16.to_be_bytes());
        data[block..block + 2].copy_from_slice(&0x8000u16.to_be_bytes());
        data[block + 2..block + 4].copy_from_slice(&4u16.to_be_bytes());
        put_ptr(&mut data, block + 4, payload);
    }
    data.extend_from_slice(&text);
    data
}

fn hobeta_checksum(header: &[u8]) -> u16 {
    let sum: u32 = header[..15].iter().map(|&b| u32::from(b)).sum();
    (105u32.wrapping_add(257u32.wrapping_mul(sum)) & 0xffff) as u16
}

/// Hobeta file holding `payload`.
pub fn hobeta(name: &[u8; 8], kind: u8, payload: &[u8]) -> Vec<u8> {
    let length = payload.len() as u16;
    let full = ((u32::from(length) + 0xff) & !0xff) as u16;
    let mut data = name.to_vec();
    data.extend_from_slice(&[kind, 0x00, 0x80]);
    data.extend_from_slice(&length.to_le_bytes());
    data.extend_from_slice(&full.to_le_bytes());
    let crc = hobeta_checksum(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    data.extend_from_slice(payload);
    data.resize(17 + usize::from(full), 0);
    data
}

/// SCL image with the given `(name, type, content)` files.
pub fn scl(files: &[(&[u8; 8], u8, &[u8])]) -> Vec<u8> {
    let mut data = b"SINCLAIR".to_vec();
    data.push(files.len() as u8);
    let mut body = Vec::new();
    for (name, kind, content) in files {
        let sectors = content.len().div_ceil(256);
        data.extend_from_slice(*name);
        data.push(*kind);
        data.extend_from_slice(&0x8000u16.to_le_bytes());
        data.extend_from_slice(&(content.len() as u16).to_le_bytes());
        data.push(sectors as u8);
        body.extend_from_slice(content);
        body.resize(sectors * 256 + body.len() - content.len(), 0);
    }
    data.extend_from_slice(&body);
    let sum = data.iter().fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)));
    data.extend_from_slice(&sum.to_le_bytes());
    data
}
