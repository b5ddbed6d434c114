//! All-or-nothing file output.
//!
//! Every file of a run is first written to a `<name>.partial` sibling. Only
//! when all of them are staged are they renamed into place, in order. If a
//! rename fails, files already moved by this call are removed again, so a
//! failed run never leaves some of its outputs behind.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::PipelineError;

struct Staged<'a> {
    tmp: PathBuf,
    target: &'a Path,
}

/// Write every `(path, contents)` pair, or none of them.
pub fn write_all_or_nothing(files: &[(&Path, &[u8])]) -> Result<(), PipelineError> {
    let mut staged: Vec<Staged<'_>> = Vec::with_capacity(files.len());
    for (path, contents) in files {
        match stage(path, contents) {
            Ok(tmp) => staged.push(Staged { tmp, target: path }),
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        }
    }

    for (i, file) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(&file.tmp, file.target) {
            for done in &staged[..i] {
                let _ = fs::remove_file(done.target);
            }
            discard(&staged[i..]);
            return Err(PipelineError::io(
                format!("Failed to finalize '{}'", file.target.display()),
                e,
            ));
        }
        debug!("wrote {}", file.target.display());
    }
    Ok(())
}

fn stage(path: &Path, contents: &[u8]) -> Result<PathBuf, PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io(format!("Failed to create '{}'", parent.display()), e))?;
    }
    let tmp = partial_path(path)?;
    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::io(format!("Failed to write '{}'", tmp.display()), e));
    }
    Ok(tmp)
}

fn discard(staged: &[Staged<'_>]) {
    for file in staged {
        let _ = fs::remove_file(&file.tmp);
    }
}

fn partial_path(path: &Path) -> Result<PathBuf, PipelineError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| PipelineError::validation(format!("Output path '{}' has no file name.", path.display())))?;
    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".partial");
    Ok(path.with_file_name(tmp_name))
}
