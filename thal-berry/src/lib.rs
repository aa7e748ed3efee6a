#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供丘脑核团分割项目中 3D dMRI 体数据的结构化信息和基础处理算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 体数据 (volume) 统一按照 `[C, H, W, L]` 通道优先格式组织, 标签 (label map)
//!   按照 `[H, W, L]` 组织, 两者的空间维度必须一致.
//! 2. 在非期望情况下 (例如体数据与标签形状不一致), 程序会直接 panic, 而不会导致内存错误.
//!   配置错误则在构造时以 `Err` 返回.
//!
//! # 开发计划
//!
//! ### 三维重采样内核 ✅
//!
//! 三次 B 样条 (reflect 边界) 与最近邻 (nearest 边界) 插值, 仿射 / 稠密位移场坐标映射,
//! 可分离高斯滤波.
//!
//! 实现位于 `thal-berry/src/ndimage`.
//!
//! ### 几何数据增强 ✅
//!
//! 旋转, 水平翻转, 缩放, 平移, 弹性形变五种随机变换, 以及随机组合控制器 `Compose`.
//! 体数据永远使用三次插值 + reflect 边界, 标签永远使用最近邻插值 + nearest 边界,
//! 该约束由类型保证.
//!
//! 实现位于 `thal-berry/src/augment`.
//!
//! ### Knutsson 5D 向量与边缘图 ✅
//!
//! 从张量主特征向量计算 Knutsson 映射, 再由中心差分 Jacobian 求边缘强度.
//!
//! 实现位于 `thal-berry/src/knutsson.rs`.
//!
//! ### 数据集划分与加载 ✅
//!
//! 8-折交叉验证划分, 中心裁剪到 96³, 批量加载 (可选 `rayon` 并行与逐样本增强).
//!
//! 实现位于 `thal-berry/src/dataset`.
//!
//! ### 两阶段预测后处理 ✅
//!
//! 小连通域剔除, 两阶段标签合并, 补齐回原始尺寸.
//!
//! 实现位于 `thal-berry/src/post_proc`.
//!
//! ### 训练辅助 ✅
//!
//! Dice 损失, one-hot 编码, 最优模型保存, 早停, 学习率平台衰减.
//!
//! 实现位于 `thal-berry/src/metrics.rs` 与 `thal-berry/src/training.rs`.
//!
//! ### TORTOISE 预处理流水线编排 ✅
//!
//! 遍历 `MTBI*/v{1,2,3}` 会话目录, 依次调用 TORTOISE / FSL 外部工具.
//!
//! 实现位于 `thal-berry/src/pipeline`.

use ndarray::{Array3, Array4};

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 多通道 3D 体数据, `[C, H, W, L]`.
pub type Volume = Array4<f32>;

/// 3D 整数标签, `[H, W, L]`.
pub type LabelMap = Array3<i32>;

mod error;

pub use error::LoadError;

/// 3D dMRI nii 文件基础数据结构.
mod data;

pub use data::{
    crop, write_label, write_scalar, write_volume, DwiVolume, NiftiHeaderAttr, NucleiLabel,
};

pub mod consts;

pub mod ndimage;

pub mod augment;

pub mod knutsson;

pub mod dataset;

pub mod post_proc;

pub mod metrics;

pub mod training;

pub mod pipeline;

pub mod prelude;
