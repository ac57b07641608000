// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Recall memory engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. The schema holds the
//! entity graph (entities, aliases, tags, timeline, relationships) and the
//! chunked semantic index, each with an FTS5 mirror kept in sync by triggers.

pub mod database;
pub mod migrations;

pub use database::{map_tr_err, Database};

/// Convert an f32 vector to little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a BLOB of little-endian f32 values back to a vector.
///
/// Trailing bytes that do not form a whole f32 are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_is_four_bytes_per_dimension() {
        let v: Vec<f32> = (0..384).map(|i| i as f32 / 384.0).collect();
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 384 * 4);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn blob_is_little_endian() {
        let blob = vec_to_blob(&[1.0]);
        assert_eq!(blob, 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn partial_trailing_bytes_are_dropped() {
        let mut blob = vec_to_blob(&[0.5, -2.0]);
        blob.push(7);
        assert_eq!(blob_to_vec(&blob), vec![0.5, -2.0]);
    }
}
