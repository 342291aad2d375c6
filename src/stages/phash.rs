//! Stage 6 — Perceptual hash: 8x8 grayscale average hash, emitted as 16
//! hex digits (spec §4.8). Also backs stage 13 (near dedup) for images.
use image::{imageops::FilterType, GenericImageView};

pub const HASH_BITS: u32 = 64;

/// Average-hash an image file: shrink to 8x8 grayscale, compare each
/// pixel to the mean, and pack the 64 comparison bits MSB-first.
pub fn average_hash(path: &std::path::Path) -> Option<u64> {
    let img = image::open(path).ok()?;
    average_hash_from_image(&img)
}

fn average_hash_from_image(img: &image::DynamicImage) -> Option<u64> {
    let small = img.resize_exact(8, 8, FilterType::Triangle).grayscale();
    let mut values = [0u8; 64];
    for (i, (_, _, pixel)) in small.pixels().enumerate() {
        values[i] = pixel.0[0];
    }
    let sum: u32 = values.iter().map(|&v| v as u32).sum();
    let mean = sum / (values.len() as u32);

    let mut hash: u64 = 0;
    for (i, &v) in values.iter().enumerate() {
        if v as u32 >= mean {
            hash |= 1 << (HASH_BITS - 1 - i as u32);
        }
    }
    Some(hash)
}

pub fn hash_to_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Hamming distance between two average hashes, for near-dedup
/// comparisons (stage 13).
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
