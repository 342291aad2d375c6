//! I/O Prefetcher: sliding window of readahead hints (spec §4.6).
//!
//! Overlaps the cost of reading the next ~16 documents with parsing the
//! current one. Each slot holds at most one open file descriptor; `hint`
//! rotates through the window, closing whatever previously occupied the
//! slot before issuing a fresh advisory hint.
use std::collections::HashMap;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use log::debug;

pub const MAX_WINDOW: usize = 16;

struct Slot {
    path: PathBuf,
    file: File,
}

pub struct Prefetcher {
    window: usize,
    slots: Vec<Option<Slot>>,
    next_slot: usize,
    inflight: HashMap<PathBuf, usize>,
}

impl Prefetcher {
    pub fn init(window: usize) -> Prefetcher {
        let window = window.clamp(1, MAX_WINDOW);
        Prefetcher {
            window,
            slots: (0..window).map(|_| None).collect(),
            next_slot: 0,
            inflight: HashMap::new(),
        }
    }

    /// Open `path` into the next rotating slot, closing whatever it
    /// previously held, and issue an advisory "will need" hint.
    pub fn hint(&mut self, path: &Path) {
        let slot_idx = self.next_slot;
        self.next_slot = (self.next_slot + 1) % self.window;

        if let Some(evicted) = self.slots[slot_idx].take() {
            self.inflight.remove(&evicted.path);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("prefetch hint failed to open {}: {e}", path.display());
                return;
            }
        };

        fadvise_willneed(&file);

        self.inflight.insert(path.to_path_buf(), slot_idx);
        self.slots[slot_idx] = Some(Slot {
            path: path.to_path_buf(),
            file,
        });
    }

    /// Signal that `path`'s pages may be evicted; drops its slot if still
    /// held.
    pub fn done(&mut self, path: &Path) {
        if let Some(idx) = self.inflight.remove(path) {
            self.slots[idx] = None;
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}

#[cfg(unix)]
fn fadvise_willneed(file: &File) {
    let fd = file.as_raw_fd();
    // Safety: `fd` is a valid, open descriptor for the lifetime of this
    // call (borrowed from `file`); length 0 means "to end of file" per
    // posix_fadvise(2). The return value is an advisory hint and is
    // intentionally not propagated as an error.
    unsafe {
        libc::posix_fadvise(fd, 0, 0, libc::POSIX_FADV_WILLNEED);
    }
}

#[cfg(not(unix))]
fn fadvise_willneed(_file: &File) {}
