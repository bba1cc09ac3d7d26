//! Utility functions shared across crtcal
//!
//! Common helpers that don't fit in specialized modules.

use std::path::{Path, PathBuf};

/// Count devices by probing `path_for(0)`, `path_for(1)`, ... until one is missing
///
/// This is a contiguous-prefix count: a gap ends enumeration even if
/// higher-numbered nodes exist (card0, card2 present => 1).
pub fn probe_contiguous<F>(path_for: F) -> usize
where
    F: Fn(usize) -> PathBuf,
{
    (0..)
        .take_while(|&n| Path::new(&path_for(n)).exists())
        .count()
}
