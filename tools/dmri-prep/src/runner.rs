//! 子命令运行函数.

use crate::result::{Entry, Summary};
use log::info;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thal_berry::augment::Compose;
use thal_berry::dataset::{self, Division, ThalamusDataset};
use thal_berry::pipeline::{self, PipelineError, TortoiseConfig};
use thal_berry::{DwiVolume, LoadError, NiftiHeaderAttr, NucleiLabel};
use thiserror::Error;
use utils::dirs;

/// 子命令错误.
#[derive(Debug, Error)]
pub enum RunError {
    /// 未给出目录且无法从环境变量或用户主目录推断.
    #[error("未指定 {0}, 且无法从环境变量 `${1}` 或用户主目录推断")]
    MissingDir(&'static str, &'static str),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

fn resolve(
    given: Option<PathBuf>,
    fallback: fn() -> Option<PathBuf>,
    what: &'static str,
    env: &'static str,
) -> Result<PathBuf, RunError> {
    given
        .or_else(fallback)
        .ok_or(RunError::MissingDir(what, env))
}

/// `dmri-prep tortoise`.
pub fn tortoise(
    src: Option<PathBuf>,
    home: Option<PathBuf>,
    dry_run: bool,
) -> Result<Summary, RunError> {
    let src = resolve(src, dirs::src_dir_from_env_or_home, "数据目录", dirs::SRC_DIR_ENV)?;
    let home = resolve(
        home,
        dirs::tortoise_home_from_env_or_home,
        "TORTOISE 目录",
        dirs::TORTOISE_HOME_ENV,
    )?;
    let sessions = pipeline::discover_sessions(&src)?;
    info!("{} 下共 {} 个会话", src.display(), sessions.len());

    let mut runner = TortoiseConfig::new(home).runner().dry_run(dry_run);
    let mut summary = Summary::new("TORTOISE");
    for r in pipeline::run_tortoise(&sessions, &mut runner) {
        let progress = format!("完成 {}/{} 步", r.completed, r.total);
        let name = r.session.prefix();
        summary.push(match r.error {
            None => Entry::ok(name, vec![progress]),
            Some(e) => Entry::failed(name, vec![progress, e.to_string()]),
        });
    }
    Ok(summary)
}

/// `dmri-prep knutsson`. 各会话并行计算.
pub fn knutsson(src: Option<PathBuf>) -> Result<Summary, RunError> {
    let src = resolve(src, dirs::src_dir_from_env_or_home, "数据目录", dirs::SRC_DIR_ENV)?;
    let sessions = pipeline::discover_sessions(&src)?;

    let results: Vec<_> = sessions
        .par_iter()
        .map(|s| (s.prefix(), pipeline::run_knutsson(s)))
        .collect();

    let mut summary = Summary::new("Knutsson");
    for (name, r) in results {
        summary.push(match r {
            Ok(Some((v, e))) => Entry::ok(
                name,
                vec![v.display().to_string(), e.display().to_string()],
            ),
            Ok(None) => Entry::ok(name, vec!["跳过: 没有张量结果".to_string()]),
            Err(e) => Entry::failed(name, vec![e.to_string()]),
        });
    }
    Ok(summary)
}

/// 去掉 `.nii` / `.nii.gz` 后缀.
fn nii_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.trim_end_matches(".gz")
        .trim_end_matches(".nii")
        .to_string()
}

/// `dmri-prep augment`.
pub fn augment(volume: &Path, label: &Path, out: &Path, seed: u64) -> Result<Summary, RunError> {
    let v = DwiVolume::open(volume)?;
    let l = NucleiLabel::open(label)?;
    if v.shape() != l.shape() {
        return Err(LoadError::ShapeMismatch {
            volume: v.shape(),
            label: l.shape(),
        }
        .into());
    }

    let mut compose = Compose::with_default_pool(seed);
    let aug = compose.apply(v.data(), l.data());

    let vp = out.join(format!("{}_aug.nii", nii_stem(volume)));
    let lp = out.join(format!("{}_aug.nii", nii_stem(label)));
    DwiVolume::from_parts(v.header().clone(), aug.volume).write(&vp)?;
    NucleiLabel::from_parts(l.header().clone(), aug.label).write(&lp)?;

    let mut summary = Summary::new("增强");
    let details = if aug.details.is_empty() {
        "(未执行任何变换)".to_string()
    } else {
        aug.details
    };
    summary.push(Entry::ok(
        format!("seed {seed}"),
        vec![
            details,
            vp.display().to_string(),
            lp.display().to_string(),
        ],
    ));
    Ok(summary)
}

/// `dmri-prep folds`.
pub fn folds() -> Result<Summary, RunError> {
    let mut summary = Summary::new("8-折交叉验证划分");
    for (k, f) in dataset::folds().iter().enumerate() {
        let lines = Division::ALL
            .iter()
            .map(|&d| format!("{d:<5}: {:?}", f.indices(d)))
            .collect();
        summary.push(Entry::ok(format!("fold {k}"), lines));
    }
    Ok(summary)
}

/// `dmri-prep dataset`.
pub fn dataset(
    fold: usize,
    division: Division,
    data: Option<PathBuf>,
    label: Option<PathBuf>,
    nuclei: Option<PathBuf>,
) -> Result<Summary, RunError> {
    let data = resolve(data, dirs::data_dir_from_env_or_home, "数据目录", dirs::DATA_DIR_ENV)?;
    let label = resolve(
        label,
        dirs::label_dir_from_env_or_home,
        "标签目录",
        dirs::LABEL_DIR_ENV,
    )?;
    let mut ds = ThalamusDataset::open(data, label, fold, division)?;
    if let Some(n) = nuclei {
        ds = ds.with_nuclei(n)?;
    }

    let mut summary = Summary::new(format!("fold {fold} {division}"));
    for i in 0..ds.len() {
        let name = ds.name(i).map(str::to_owned).unwrap_or_else(|_| format!("#{i}"));
        summary.push(match ds.get(i) {
            Ok(s) => {
                let mut lines = vec![
                    format!("volume: {:?}", s.volume.dim()),
                    format!("label: {:?}", s.label.dim()),
                ];
                if let Some(n) = s.nuclei.as_ref() {
                    lines.push(format!("nuclei: {:?}", n.dim()));
                }
                Entry::ok(name, lines)
            }
            Err(e) => Entry::failed(name, vec![e.to_string()]),
        });
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nii_stem() {
        assert_eq!(nii_stem(Path::new("/a/MTBI001_v1_data.nii.gz")), "MTBI001_v1_data");
        assert_eq!(nii_stem(Path::new("x.nii")), "x");
    }

    #[test]
    fn test_folds_summary() {
        let s = folds().unwrap();
        assert!(!s.has_failure());
    }
}
