//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Coord2d, Idx2d, Idx3d};

pub use crate::data::{CtVolume, CtWindow, MaskSlice, ScanSlice, VolumeMeta};

pub use crate::voi::{parse, Contour, MalformedVoi, VoiAnnotations, VoiFormat};

pub use crate::align::{align, OutOfRangePolicy, OutOfRangeSlice};

pub use crate::mask::{fill_holes, rasterize, DegenerateContour};

pub use crate::roi::{crop, BoundingBox};

pub use crate::pipeline::{
    run_patient, run_patients, ExtractConfig, OutputFormat, OutputTree, PatientJob,
    PatientSummary, VoiFile,
};

#[cfg(feature = "rayon")]
pub use crate::pipeline::run_patients_par;

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_LESION, MASK_VIS};
pub use crate::consts::{DEFAULT_WL, DEFAULT_WW, LABEL_BENIGN, LABEL_CANCER};
