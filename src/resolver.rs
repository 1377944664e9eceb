// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Maps MIDI note numbers onto files in the sound directory.
//!
//! The directory is read on every lookup, so files added or removed while the
//! board is running change the mapping for the next note. Entries are ordered
//! case-insensitively by name and the base note maps to the first entry.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct FileResolver {
    directory: PathBuf,
    base_note: u8,
}

impl FileResolver {
    pub fn new(directory: PathBuf, base_note: u8) -> FileResolver {
        FileResolver {
            directory,
            base_note,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_note(&self) -> u8 {
        self.base_note
    }

    /// Lists the directory in note order. Every entry counts, including
    /// subdirectories and files that won't decode.
    pub fn list(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(&self.directory)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<Vec<PathBuf>>>()?;
        entries.sort_by_cached_key(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });
        Ok(entries)
    }

    /// Resolves a note to a file. None when the note is below the base note,
    /// past the last entry or the directory can't be read.
    pub fn resolve(&self, note: u8) -> Option<PathBuf> {
        let index = note.checked_sub(self.base_note)? as usize;
        let entries = match self.list() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    directory = ?self.directory,
                    err = %e,
                    "Unable to read sound directory"
                );
                return None;
            }
        };

        let path = entries.into_iter().nth(index);
        if path.is_none() {
            debug!(note, index, "No file mapped to note");
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_resolve_by_sorted_position() {
        let tempdir = tempfile::tempdir().unwrap();
        touch(tempdir.path(), "c.wav");
        touch(tempdir.path(), "a.wav");
        touch(tempdir.path(), "b.wav");

        let resolver = FileResolver::new(tempdir.path().to_path_buf(), 48);
        assert_eq!(resolver.directory(), tempdir.path());
        assert_eq!(resolver.base_note(), 48);
        assert_eq!(resolver.resolve(48), Some(tempdir.path().join("a.wav")));
        assert_eq!(resolver.resolve(49), Some(tempdir.path().join("b.wav")));
        assert_eq!(resolver.resolve(50), Some(tempdir.path().join("c.wav")));
        assert_eq!(resolver.resolve(51), None);
        assert_eq!(resolver.resolve(60), None);
    }

    #[test]
    fn test_below_base_note() {
        let tempdir = tempfile::tempdir().unwrap();
        touch(tempdir.path(), "a.wav");

        let resolver = FileResolver::new(tempdir.path().to_path_buf(), 48);
        assert_eq!(resolver.resolve(47), None);
        assert_eq!(resolver.resolve(0), None);
    }

    #[test]
    fn test_sort_ignores_case() {
        let tempdir = tempfile::tempdir().unwrap();
        touch(tempdir.path(), "Beta.wav");
        touch(tempdir.path(), "alpha.wav");
        touch(tempdir.path(), "CHARLIE.wav");

        let resolver = FileResolver::new(tempdir.path().to_path_buf(), 0);
        let names: Vec<String> = resolver
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha.wav", "Beta.wav", "CHARLIE.wav"]);
    }

    #[test]
    fn test_directory_changes_are_seen() {
        let tempdir = tempfile::tempdir().unwrap();
        touch(tempdir.path(), "b.wav");

        let resolver = FileResolver::new(tempdir.path().to_path_buf(), 48);
        assert_eq!(resolver.resolve(48), Some(tempdir.path().join("b.wav")));

        touch(tempdir.path(), "a.wav");
        assert_eq!(resolver.resolve(48), Some(tempdir.path().join("a.wav")));
        assert_eq!(resolver.resolve(49), Some(tempdir.path().join("b.wav")));
    }

    #[test]
    fn test_missing_directory() {
        let resolver = FileResolver::new(PathBuf::from("/nowhere/sounds"), 48);
        assert!(resolver.list().is_err());
        assert_eq!(resolver.resolve(48), None);
    }
}
