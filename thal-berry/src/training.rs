//! 训练过程记录: 损失曲线, 检查点, 最优模型保存, 早停与学习率衰减.
//!
//! 网络本身不在本 crate 范围内, 模型参数通过 [`ModelState`] 以不透明字节序列的形式保存.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::info;
use ndarray::Array1;
use ndarray_npy::{NpzWriter, WriteNpzError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 检查点读写错误.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 序列化错误.
    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    /// `.npz` 写出错误.
    #[error(transparent)]
    Npz(#[from] WriteNpzError),
}

/// 可保存的模型参数.
pub trait ModelState {
    /// 导出模型参数.
    fn state_bytes(&self) -> Vec<u8>;
}

impl ModelState for [u8] {
    #[inline]
    fn state_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl ModelState for Vec<u8> {
    #[inline]
    fn state_bytes(&self) -> Vec<u8> {
        self.clone()
    }
}

/// 每个 epoch 的平均训练 / 验证损失.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    /// 训练损失.
    pub train_losses: Vec<f64>,

    /// 验证损失.
    pub val_losses: Vec<f64>,
}

impl LossHistory {
    /// 训练损失文件名.
    pub const TRAIN_FILE: &'static str = "train_losses.npz";

    /// 验证损失文件名.
    pub const VAL_FILE: &'static str = "val_losses.npz";

    /// 追加一个 epoch.
    #[inline]
    pub fn push(&mut self, train: f64, val: f64) {
        self.train_losses.push(train);
        self.val_losses.push(val);
    }

    /// 已记录的 epoch 数.
    #[inline]
    pub fn len(&self) -> usize {
        self.val_losses.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.val_losses.is_empty()
    }

    /// 在 `dir` 下写出 `train_losses.npz` 与 `val_losses.npz`, 数组名均为 `arr_0`.
    pub fn save_npz<P: AsRef<Path>>(&self, dir: P) -> Result<(), CheckpointError> {
        let dir = dir.as_ref();
        for (name, losses) in [
            (Self::TRAIN_FILE, &self.train_losses),
            (Self::VAL_FILE, &self.val_losses),
        ] {
            let mut npz = NpzWriter::new(File::create(dir.join(name))?);
            npz.add_array("arr_0", &Array1::from(losses.clone()))?;
            npz.finish()?;
        }
        Ok(())
    }
}

/// 训练检查点.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 保存时的 epoch.
    pub epoch: usize,

    /// 截至该 epoch 的损失记录.
    pub history: LossHistory,

    /// 模型参数.
    pub state: Vec<u8>,
}

impl Checkpoint {
    /// 最优模型检查点文件名.
    pub const BEST_FILE: &'static str = "best_checkpoint.bin";

    /// 由模型构造.
    pub fn new<M: ModelState + ?Sized>(epoch: usize, history: &LossHistory, model: &M) -> Self {
        Self {
            epoch,
            history: history.clone(),
            state: model.state_bytes(),
        }
    }

    /// 逐 epoch 检查点路径: `{dir}/{epoch}.bin`.
    pub fn epoch_path<P: AsRef<Path>>(dir: P, epoch: usize) -> PathBuf {
        dir.as_ref().join(format!("{epoch}.bin"))
    }

    /// 写出到 `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// 从 `path` 读取.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

/// 单折训练的输出目录: `{out_dir}/{fold}` 与其下的 `checkpoint` 目录.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirs {
    /// 折目录, 存放最优模型与损失曲线.
    pub split_dir: PathBuf,

    /// 逐 epoch 检查点目录.
    pub checkpoint_dir: PathBuf,
}

impl RunDirs {
    /// 创建 (若不存在) 并返回目录.
    pub fn create<P: AsRef<Path>>(out_dir: P, fold: usize) -> Result<Self, CheckpointError> {
        let split_dir = out_dir.as_ref().join(fold.to_string());
        let checkpoint_dir = split_dir.join("checkpoint");
        if !checkpoint_dir.is_dir() {
            info!("创建目录 {}", checkpoint_dir.display());
            fs::create_dir_all(&checkpoint_dir)?;
        }
        Ok(Self {
            split_dir,
            checkpoint_dir,
        })
    }

    /// 读取第 `epoch` 个逐 epoch 检查点, 用于恢复训练.
    pub fn resume(&self, epoch: usize) -> Result<Checkpoint, CheckpointError> {
        info!("从第 {epoch} 个 epoch 恢复训练");
        Checkpoint::load(Checkpoint::epoch_path(&self.checkpoint_dir, epoch))
    }
}

/// 验证损失严格下降时保存 `best_checkpoint.bin`.
#[derive(Debug, Clone)]
pub struct SaveBestModel {
    save_dir: PathBuf,
    val_loss_min: f64,
}

impl SaveBestModel {
    /// 在 `save_dir` 下保存.
    pub fn new<P: AsRef<Path>>(save_dir: P) -> Self {
        Self {
            save_dir: save_dir.as_ref().to_owned(),
            val_loss_min: f64::INFINITY,
        }
    }

    /// 迄今最小验证损失.
    #[inline]
    pub fn val_loss_min(&self) -> f64 {
        self.val_loss_min
    }

    /// 最优检查点路径.
    #[inline]
    pub fn path(&self) -> PathBuf {
        self.save_dir.join(Checkpoint::BEST_FILE)
    }

    /// 记录一个 epoch 的验证损失. 返回是否保存了新的最优模型.
    ///
    /// 只有严格小于迄今最小值时才保存, `NaN` 永远不会被保存.
    pub fn step<M: ModelState + ?Sized>(
        &mut self,
        val_loss: f64,
        model: &M,
        history: &LossHistory,
        epoch: usize,
    ) -> Result<bool, CheckpointError> {
        if !(val_loss < self.val_loss_min) {
            return Ok(false);
        }
        info!(
            "验证损失下降 ({:.6} --> {val_loss:.6}), 保存模型",
            self.val_loss_min
        );
        Checkpoint::new(epoch, history, model).save(self.path())?;
        self.val_loss_min = val_loss;
        Ok(true)
    }
}

/// 早停.
///
/// 首次调用即保存. 之后若 `-val_loss < best_score + delta` 或损失为 `NaN`, 计数器加一,
/// 达到 `patience` 时置位早停标志; 否则更新最优分数, 保存并清零计数器.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    delta: f64,
    save_dir: PathBuf,
    counter: usize,
    best_score: Option<f64>,
    early_stop: bool,
}

impl EarlyStopping {
    /// 默认耐心值.
    pub const PATIENCE: usize = 10;

    /// 创建早停器.
    pub fn new<P: AsRef<Path>>(patience: usize, delta: f64, save_dir: P) -> Self {
        Self {
            patience,
            delta,
            save_dir: save_dir.as_ref().to_owned(),
            counter: 0,
            best_score: None,
            early_stop: false,
        }
    }

    /// 是否应当停止训练?
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.early_stop
    }

    /// 当前计数.
    #[inline]
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// 记录一个 epoch 的验证损失. 返回是否保存了检查点.
    pub fn step<M: ModelState + ?Sized>(
        &mut self,
        val_loss: f64,
        model: &M,
        history: &LossHistory,
        epoch: usize,
    ) -> Result<bool, CheckpointError> {
        let score = -val_loss;
        // `NaN` 按未改善计数.
        let improved = match self.best_score {
            Some(best) => score >= best + self.delta,
            None => !score.is_nan(),
        };
        if !improved {
            self.counter += 1;
            info!("早停计数: {} / {}", self.counter, self.patience);
            if self.counter >= self.patience {
                self.early_stop = true;
            }
            return Ok(false);
        }
        self.best_score = Some(score);
        self.counter = 0;
        Checkpoint::new(epoch, history, model).save(self.save_dir.join(Checkpoint::BEST_FILE))?;
        Ok(true)
    }
}

/// 验证损失进入平台期时按比例降低学习率 (`min` 模式, 相对阈值).
#[derive(Debug, Clone, PartialEq)]
pub struct PlateauScheduler {
    lr: f64,
    factor: f64,
    patience: usize,
    threshold: f64,
    min_lr: f64,
    best: f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    /// 默认耐心值.
    pub const PATIENCE: usize = 5;

    /// 默认衰减系数.
    pub const FACTOR: f64 = 0.9;

    /// 默认相对阈值.
    pub const THRESHOLD: f64 = 1e-4;

    const EPS: f64 = 1e-8;

    /// 以初始学习率 `lr` 与默认参数创建.
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            factor: Self::FACTOR,
            patience: Self::PATIENCE,
            threshold: Self::THRESHOLD,
            min_lr: 0.0,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    /// 修改耐心值.
    #[inline]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// 修改衰减系数.
    #[inline]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// 当前学习率.
    #[inline]
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// 记录一个 epoch 的指标, 返回 (可能已降低的) 学习率.
    pub fn step(&mut self, metric: f64) -> f64 {
        if metric < self.best * (1.0 - self.threshold) {
            self.best = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }
        if self.bad_epochs > self.patience {
            let new_lr = (self.lr * self.factor).max(self.min_lr);
            if self.lr - new_lr > Self::EPS {
                info!("学习率降低: {:.6e} --> {new_lr:.6e}", self.lr);
                self.lr = new_lr;
            }
            self.bad_epochs = 0;
        }
        self.lr
    }
}
