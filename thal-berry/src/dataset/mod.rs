//! 数据集操作.
//!
//! 数据目录与标签目录均为扁平目录, 文件名以受试者编号开头 (例如 `MTBI001_v1_...nii`).

use std::path::{Path, PathBuf};

mod loader;
pub mod split;
mod thalamus;

pub use loader::{mix_seed, Batch, LoaderConfig, ThalamusLoader};
pub use split::{fold, folds, Division, FoldSplit, ParseDivisionError};
pub use thalamus::{ThalamusDataset, ThalamusSample};

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}
