//! Filesystem-level host queries (existence checks, directory creation, mount table).

use crate::HalResult;
use std::path::Path;

pub trait FsOps {
    fn path_exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> HalResult<()>;

    /// Raw contents of `/proc/self/mountinfo`.
    fn read_mountinfo(&self) -> HalResult<String>;
}
