//! 两阶段预测后处理.
//!
//! 第一阶段 (ROI) 预测先剔除小连通域, 再与第二阶段 (核团) 预测逐体素相乘,
//! 最后对称补零回原始 T1 空间尺寸.

mod components;
mod stages;

pub use components::{
    apply_foreground_mask, connected_components, foreground_mask, remove_small_components,
    Component,
};

pub use stages::{combine_stages, pad_to_original, session_prefix, StagePredictions};
