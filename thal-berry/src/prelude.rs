//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, LabelMap, LoadError, Volume};

pub use crate::data::crop::{center_crop3, center_crop4, fit_to_shape3, fit_to_shape4, pad_to_shape};
pub use crate::{write_label, write_scalar, write_volume, DwiVolume, NiftiHeaderAttr, NucleiLabel};

pub use crate::consts::label::{BACKGROUND, NUCLEI_CLASSES, ROI_CLASSES, THALAMUS};
pub use crate::consts::{CROP_SIZE, FOLD_LEN, INPUT_CHANNELS};

pub use crate::augment::{
    AugmentError, AugmentRng, Augmented, Compose, ElasticConfig, ElasticDeformation,
    HorizontalFlip, RandomRotate, RandomShift, RandomZoom, RotateConfig, ShiftConfig, Transform,
    ZoomConfig,
};

pub use crate::dataset::{
    self, Batch, Division, LoaderConfig, ThalamusDataset, ThalamusLoader, ThalamusSample,
};
pub use crate::dataset::home_dataset_dir_with;

pub use crate::knutsson::KnutssonMaps;
pub use crate::metrics::{argmax_labels, one_hot, DiceLoss};
pub use crate::post_proc::{combine_stages, foreground_mask, StagePredictions};
