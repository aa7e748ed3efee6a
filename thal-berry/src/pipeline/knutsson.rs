//! 在 TORTOISE 输出上计算 Knutsson 映射.

use super::{PipelineError, SessionDir};
use crate::knutsson::KnutssonMaps;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// 张量结果相对会话目录的位置.
pub const TENSOR_SUBDIR: [&str; 3] = ["proc", "diffusion", "AP_proc_DRBUDDI_proc"];

/// 输出文件名前缀.
pub const KNUTSSON_PREFIX: &str = "AP_proc_DRBUDDI_up_final_N1_DT";

const EV_SUFFIX: &str = "DT_EV.nii";

/// 在 `dir` 下按文件名顺序查找第一个 `*DT_EV.nii`.
pub fn find_eigenvector<P: AsRef<Path>>(dir: P) -> Result<PathBuf, PipelineError> {
    let dir = dir.as_ref();
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(EV_SUFFIX))
        .collect();
    names.sort();
    names
        .into_iter()
        .next()
        .map(|n| dir.join(n))
        .ok_or_else(|| PipelineError::NoEigenvector(dir.to_owned()))
}

/// 对一个会话计算并写出 Knutsson 映射与边缘图.
///
/// 张量结果目录不存在时跳过, 返回 `Ok(None)`.
pub fn run_knutsson(session: &SessionDir) -> Result<Option<(PathBuf, PathBuf)>, PipelineError> {
    let dir: PathBuf = TENSOR_SUBDIR
        .iter()
        .fold(session.path.clone(), |p, d| p.join(d));
    if !dir.is_dir() {
        info!(
            "跳过 {}/{}: {} 不存在",
            session.subject,
            session.session,
            dir.display()
        );
        return Ok(None);
    }
    let ev = find_eigenvector(&dir)?;
    info!("计算 Knutsson 映射: {}", ev.display());
    let maps = KnutssonMaps::from_eigenvector_file(&ev)?;
    let written = maps.write(dir.join(KNUTSSON_PREFIX))?;
    Ok(Some(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::discover_sessions;
    use crate::pipeline::tests::session_tree;
    use crate::write_volume;
    use ndarray::Array4;

    #[test]
    fn test_run_knutsson() {
        let root = session_tree();
        let sessions = discover_sessions(root.path()).unwrap();

        let dir = root.path().join("MTBI001/v1/proc/diffusion/AP_proc_DRBUDDI_proc");
        fs::create_dir_all(&dir).unwrap();
        let ev = Array4::from_shape_fn((3, 4, 4, 3), |(c, h, w, l)| {
            [h as f32, w as f32, (l + 1) as f32][c] * 0.1
        });
        write_volume(dir.join("AP_proc_DRBUDDI_up_final_N1_DT_EV.nii"), &ev, None).unwrap();

        let (vp, ep) = run_knutsson(&sessions[0]).unwrap().unwrap();
        assert_eq!(vp, dir.join("AP_proc_DRBUDDI_up_final_N1_DT_knutsson_5D.nii"));
        assert!(ep.is_file());

        // 没有张量目录的会话被跳过.
        assert!(run_knutsson(&sessions[1]).unwrap().is_none());

        // 有目录但没有特征向量文件.
        let empty = root.path().join("MTBI002/v1/proc/diffusion/AP_proc_DRBUDDI_proc");
        fs::create_dir_all(&empty).unwrap();
        assert!(matches!(
            run_knutsson(&sessions[2]),
            Err(PipelineError::NoEigenvector(_))
        ));
    }
}
