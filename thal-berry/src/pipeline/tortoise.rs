//! TORTOISE 预处理步骤.

use super::{PipelineError, SessionDir, ShellRunner, Step};
use std::fs;
use std::path::{Path, PathBuf};

/// TORTOISE 安装位置.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TortoiseConfig {
    home: PathBuf,
}

impl TortoiseConfig {
    /// TORTOISE 安装根目录, 例如 `/opt/TORTOISE_V3.2.0`.
    pub fn new<P: AsRef<Path>>(home: P) -> Self {
        Self {
            home: home.as_ref().to_owned(),
        }
    }

    /// 安装根目录.
    #[inline]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// 需要加入 `PATH` 的目录, 按优先级从高到低.
    pub fn bin_dirs(&self) -> [PathBuf; 4] {
        [
            "DRTAMASV320/bin",
            "DRBUDDIV320/bin",
            "DIFFCALC/DIFFCALCV320",
            "DIFFPREPV320/bin/bin",
        ]
        .map(|d| self.home.join(d))
    }

    /// 配置好 `PATH` 的执行器.
    pub fn runner(&self) -> ShellRunner {
        ShellRunner::new().with_path_prefix(self.bin_dirs())
    }
}

/// 创建 `proc/diffusion/{AP,PA}` 输出目录.
pub(crate) fn prepare_dirs(session: &SessionDir) -> Result<(), PipelineError> {
    let out = session.diffusion_dir();
    fs::create_dir_all(out.join("AP"))?;
    fs::create_dir_all(out.join("PA"))?;
    Ok(())
}

/// 一个会话的完整 TORTOISE 处理步骤.
///
/// 文件名中的 `*` 交给 shell 展开. 符号链接已存在时 (重复运行) 继续执行.
pub fn tortoise_steps(session: &SessionDir) -> Vec<Step> {
    let sess = session.path.display();
    let dwi_nifti = format!("{sess}/nii/*BMAX2500*.nii.gz");
    let dwi_bval = format!("{sess}/nii/*BMAX2500*.bval");
    let dwi_bvec = format!("{sess}/nii/*BMAX2500*.bvec");
    let b0_nifti = format!("{sess}/nii/*B0*.nii.gz");
    let b0_bval = format!("{sess}/nii/*B0*.bval");
    let b0_bvec = format!("{sess}/nii/*B0*.bvec");

    let out_dir = session.diffusion_dir();
    let out = out_dir.display();
    let ap = format!("{out}/AP");
    let pa = format!("{out}/PA");
    let t2 = format!("{sess}/proc/*T2*.nii.gz");
    let drbuddi = format!("{out}/AP_proc_DRBUDDI_proc");

    let mut steps = Vec::with_capacity(15);
    for (src, dst) in [
        (&dwi_nifti, &ap),
        (&dwi_bval, &ap),
        (&dwi_bvec, &ap),
        (&b0_nifti, &pa),
        (&b0_bval, &pa),
        (&b0_bvec, &pa),
    ] {
        steps.push(Step::optional("创建符号链接", format!("ln -s {src} {dst}")));
    }

    steps.push(Step::new(
        "ImportNIFTI (AP)",
        format!("ImportNIFTI -i {dwi_nifti} -b {dwi_bval} -v {dwi_bvec} -p vertical -o {ap}"),
    ));
    steps.push(Step::new(
        "ImportNIFTI (PA)",
        format!("ImportNIFTI -i {b0_nifti} -b {b0_bval} -v {b0_bvec} -p vertical -o {pa}"),
    ));

    for (dir, list) in [(&ap, "AP.list"), (&pa, "PA.list")] {
        steps.push(Step::new(
            "DIFFPREP",
            format!(
                "DIFFPREP -i {dir}/{list} -s {t2} --will_be_drbuddied 1 -d for_final \
                 --is_human_brain 1 --upsampling all --res 1.0 1.0 1.0 --keep_intermediate 1 \
                 --do_QC 0"
            ),
        ));
    }

    steps.push(Step::new(
        "DR_BUDDI",
        format!(
            "DR_BUDDI_withoutGUI --up_data $(ls {ap}/AP_proc.list) \
             --down_data $(ls {pa}/PA_proc.list) --structural {t2} --res 1.0 1.0 1.0 -g 1"
        ),
    ));

    steps.push(Step::new(
        "bet2",
        format!("bet2 {drbuddi}/structural.nii {drbuddi}/structure -m -f 0.3"),
    ));
    steps.push(Step::new(
        "EstimateTensorNLLS",
        format!(
            "EstimateTensorNLLS -i {drbuddi}/AP*final.list --save_CS 1 \
             -m {drbuddi}/structure_mask.nii.gz"
        ),
    ));
    steps.push(Step::new(
        "ComputeAllTensorMaps",
        format!("ComputeAllTensorMaps.bash {drbuddi}/*final_N1_DT.nii"),
    ));
    steps.push(Step::new(
        "TORTOISEBmatrixToFSLBVecs",
        format!("TORTOISEBmatrixToFSLBVecs {drbuddi}/AP*final.bmtxt"),
    ));
    steps
}
