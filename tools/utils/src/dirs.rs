//! 数据目录约定: 优先读取环境变量, 否则回退到 `$HOME/dataset` 下的固定位置.

use std::env;
use std::path::PathBuf;
use thal_berry::dataset::home_dataset_dir_with;

/// 原始会话数据根目录的环境变量.
pub const SRC_DIR_ENV: &str = "THAL_SRC_DIR";

/// TORTOISE 安装目录的环境变量.
pub const TORTOISE_HOME_ENV: &str = "TORTOISE_HOME";

/// 合并后 68 通道数据目录的环境变量.
pub const DATA_DIR_ENV: &str = "THAL_DATA_DIR";

/// ROI 标签目录的环境变量.
pub const LABEL_DIR_ENV: &str = "THAL_LABEL_DIR";

/// 核团标签目录的环境变量.
pub const NUCLEI_DIR_ENV: &str = "THAL_NUCLEI_DIR";

/// 若环境变量 `key` 非空则返回其值, 否则返回 `$HOME/dataset/{fallback...}`.
pub fn env_or_home(key: &str, fallback: &[&str]) -> Option<PathBuf> {
    match env::var_os(key) {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(fallback),
    }
}

/// 获取原始会话数据根目录.
///
/// 1. 若环境变量 `$THAL_SRC_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/sessions`.
pub fn src_dir_from_env_or_home() -> Option<PathBuf> {
    env_or_home(SRC_DIR_ENV, &["sessions"])
}

/// 获取 TORTOISE 安装目录.
///
/// 1. 若环境变量 `$TORTOISE_HOME` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/TORTOISE_V3.2.0`.
pub fn tortoise_home_from_env_or_home() -> Option<PathBuf> {
    env_or_home(TORTOISE_HOME_ENV, &["TORTOISE_V3.2.0"])
}

/// 获取 68 通道数据目录, 默认 `$HOME/dataset/data`.
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    env_or_home(DATA_DIR_ENV, &["data"])
}

/// 获取 ROI 标签目录, 默认 `$HOME/dataset/label_roi`.
pub fn label_dir_from_env_or_home() -> Option<PathBuf> {
    env_or_home(LABEL_DIR_ENV, &["label_roi"])
}

/// 获取核团标签目录, 默认 `$HOME/dataset/label_nuclei`.
pub fn nuclei_dir_from_env_or_home() -> Option<PathBuf> {
    env_or_home(NUCLEI_DIR_ENV, &["label_nuclei"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_home() {
        env::set_var("THAL_UTILS_TEST_DIR", "/tmp/thal");
        assert_eq!(
            env_or_home("THAL_UTILS_TEST_DIR", &["x"]),
            Some(PathBuf::from("/tmp/thal"))
        );
        env::set_var("THAL_UTILS_TEST_DIR", "");
        let fallback = env_or_home("THAL_UTILS_TEST_DIR", &["x", "y"]);
        if let Some(p) = fallback {
            assert!(p.ends_with("dataset/x/y"));
        }
    }
}
