//! 通用常量.

use crate::Idx3d;

/// 标签取值.
pub mod label {
    /// 背景体素值.
    pub const BACKGROUND: i32 = 0;

    /// 第一阶段 (ROI) 标签中, 丘脑区域的体素值.
    pub const THALAMUS: i32 = 1;

    /// 第一阶段 (ROI) 模型的类别数: 背景 + 丘脑.
    pub const ROI_CLASSES: usize = 2;

    /// 第二阶段模型的类别数. 核团标签取值为 `1..=NUCLEI_CLASSES`.
    pub const NUCLEI_CLASSES: usize = 13;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: i32) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 体素是否是前景 (任意非背景类别)?
    #[inline]
    pub const fn is_foreground(p: i32) -> bool {
        !is_background(p)
    }
}

/// 训练 / 测试时统一的输入空间尺寸.
pub const CROP_SIZE: Idx3d = (96, 96, 96);

/// 交叉验证折数.
pub const FOLD_LEN: usize = 8;

/// 数据集受试者会话总数.
pub const DATASET_LEN: usize = 24;

/// 合并后输入网络的体数据通道数.
pub const INPUT_CHANNELS: usize = 68;

/// Knutsson 映射的通道数.
pub const KNUTSSON_CHANNELS: usize = 5;

/// 后处理时保留连通域所需的最少前景体素数.
pub const MIN_COMPONENT_VOXELS: usize = 50;

/// 受试者目录名前缀.
pub const SUBJECT_PREFIX: &str = "MTBI";

/// 合法的会话目录名.
pub const SESSION_NAMES: [&str; 3] = ["v1", "v2", "v3"];
