//! 数据加载运行时错误.

use crate::Idx3d;
use thiserror::Error;

/// 读取 / 写入 nii 文件或组织数据集时的错误.
#[derive(Debug, Error)]
pub enum LoadError {
    /// 底层 nifti 读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 数组形状错误 (例如批量拼接时样本形状不一致).
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// nii 数据维数不符合要求.
    #[error("期望 {expected} 维 nifti 数据, 实际为 {actual} 维")]
    Rank {
        /// 期望维数.
        expected: usize,
        /// 实际维数.
        actual: usize,
    },

    /// 体数据通道数不足.
    #[error("至少需要 {expected} 个通道, 实际为 {actual} 个")]
    TooFewChannels {
        /// 最少通道数.
        expected: usize,
        /// 实际通道数.
        actual: usize,
    },

    /// 体数据与标签的空间形状不一致.
    #[error("体数据空间形状 {volume:?} 与标签形状 {label:?} 不一致")]
    ShapeMismatch {
        /// 体数据空间形状.
        volume: Idx3d,
        /// 标签形状.
        label: Idx3d,
    },

    /// 数据文件与标签文件不属于同一受试者.
    #[error("数据文件 `{data}` 与标签文件 `{label}` 不属于同一受试者")]
    SubjectMismatch {
        /// 数据文件名.
        data: String,
        /// 标签文件名.
        label: String,
    },

    /// 标签取值超出可打包范围.
    #[error("标签取值 {0} 超出范围 [0, 32768)")]
    LabelOutOfRange(i32),

    /// 不存在的交叉验证折.
    #[error("不存在第 {0} 折")]
    UnknownFold(usize),

    /// 索引越界.
    #[error("索引 {index} 越界 (长度为 {len})")]
    OutOfRange {
        /// 请求的索引.
        index: usize,
        /// 实际长度.
        len: usize,
    },
}
