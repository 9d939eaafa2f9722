//! 提取流水线: 单 patient 编排与批处理前端.
//!
//! 错误传播遵循两级策略: 标注文件的结构损坏使 **该文件** 整体作废
//! (fail-fast), 但不波及同一 patient 的其余标注文件; 单个
//! (切片, 轮廓) 的退化或写出失败只记录并跳过, 绝不中断 patient 的
//! 处理 (partial-success).

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{GrayImage, Luma};
use ndarray::Array2;

use crate::align::{align, OutOfRangePolicy};
use crate::consts::gray::MASK_VIS;
use crate::{mask, roi, voi, CtVolume, CtWindow};

pub mod naming;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        mod par;

        pub use par::run_patients_par;
    }
}

/// patch 的输出格式.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// 8-bit 灰度 PNG.
    Png,

    /// 8-bit 灰度 JPEG.
    Jpeg,

    /// `f32` 数值数组 (npy), 供训练流水线直接加载.
    Npy,
}

impl OutputFormat {
    /// 输出文件的扩展名.
    pub fn ext(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Npy => "npy",
        }
    }

    /// 输出树中该格式的子目录名.
    fn subdir(&self) -> &'static str {
        match self {
            Self::Png => "png_files",
            Self::Jpeg => "jpeg_files",
            Self::Npy => "Numpy",
        }
    }
}

/// 不认识的输出格式名.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedFormat(pub String);

impl Display for UnsupportedFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "不支持的输出格式 `{}`, 可选: png, jpeg, npy", self.0)
    }
}

impl Error for UnsupportedFormat {}

impl FromStr for OutputFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "npy" => Ok(Self::Npy),
            other => Err(UnsupportedFormat(other.to_owned())),
        }
    }
}

/// 提取流水线配置. 进程级状态仅限于此, 各 patient 之间不共享
/// 任何可变状态.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// 请求的 patch 输出格式集合.
    pub formats: Vec<OutputFormat>,

    /// patch 加窗参数.
    pub window: CtWindow,

    /// 是否同时输出掩膜.
    pub masks: bool,

    /// 掩膜前景像素值.
    pub mask_value: u8,

    /// 标注切片索引越界时的处理策略.
    pub policy: OutOfRangePolicy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Png, OutputFormat::Npy],
            window: CtWindow::default(),
            masks: false,
            mask_value: MASK_VIS,
            policy: OutOfRangePolicy::Skip,
        }
    }
}

/// 输出目录树: `{target}/train/{png_files, jpeg_files, Numpy, mask_files}`.
#[derive(Clone, Debug)]
pub struct OutputTree {
    train: PathBuf,
}

impl OutputTree {
    /// 以 `target` 为根创建输出树描述. 不做任何目录操作.
    pub fn new<P: AsRef<Path>>(target: P) -> Self {
        Self {
            train: target.as_ref().join("train"),
        }
    }

    /// 某 patch 格式的输出目录.
    pub fn patch_dir(&self, format: OutputFormat) -> PathBuf {
        self.train.join(format.subdir())
    }

    /// 掩膜输出目录.
    pub fn mask_dir(&self) -> PathBuf {
        self.train.join("mask_files")
    }

    /// 为配置所请求的输出创建目录 (仅请求的部分).
    pub fn ensure(&self, config: &ExtractConfig) -> io::Result<()> {
        for &format in &config.formats {
            fs::create_dir_all(self.patch_dir(format))?;
        }
        if config.masks {
            fs::create_dir_all(self.mask_dir())?;
        }
        Ok(())
    }
}

/// 一个待处理的标注文件及其 (由命名约定等外部来源得出的) 类别标签.
#[derive(Clone, Debug)]
pub struct VoiFile {
    /// 标注文件路径.
    pub path: PathBuf,

    /// 二值类别标签. `None` 表示输出名中不携带标签段.
    pub label: Option<u8>,
}

impl VoiFile {
    /// 无标签的标注文件.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            label: None,
        }
    }

    /// 带标签的标注文件.
    #[inline]
    pub fn with_label<P: Into<PathBuf>>(path: P, label: u8) -> Self {
        Self {
            path: path.into(),
            label: Some(label),
        }
    }
}

/// 单个 patient 的处理统计.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatientSummary {
    /// 成功解析并联结的标注文件个数.
    pub files_parsed: usize,

    /// 因读取失败、结构损坏或越界报错而整体作废的标注文件个数.
    pub files_rejected: usize,

    /// 至少产出一个输出文件的轮廓个数.
    pub contours_done: usize,

    /// 没有产出任何输出文件的轮廓个数 (退化等).
    pub contours_skipped: usize,

    /// 因切片索引越界而被跳过的轮廓个数.
    pub slices_skipped: usize,

    /// 成功写出的输出文件个数.
    pub outputs_written: usize,

    /// 写出失败的输出文件个数.
    pub writes_failed: usize,
}

impl PatientSummary {
    /// 把 `other` 的各项计数累加到自身.
    pub fn merge(&mut self, other: &PatientSummary) {
        self.files_parsed += other.files_parsed;
        self.files_rejected += other.files_rejected;
        self.contours_done += other.contours_done;
        self.contours_skipped += other.contours_skipped;
        self.slices_skipped += other.slices_skipped;
        self.outputs_written += other.outputs_written;
        self.writes_failed += other.writes_failed;
    }
}

impl Display for PatientSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "标注文件 {} 个 (作废 {}), 轮廓完成 {} 个 (跳过 {}, 越界 {}), 写出 {} 个文件 (失败 {})",
            self.files_parsed,
            self.files_rejected,
            self.contours_done,
            self.contours_skipped,
            self.slices_skipped,
            self.outputs_written,
            self.writes_failed,
        )
    }
}

/// 一次批处理的统计.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchSummary {
    /// 完成处理的 patient 个数.
    pub patients: usize,

    /// 因扫描加载失败而整体跳过的 patient 个数.
    pub patients_failed: usize,

    /// 各 patient 统计之和.
    pub totals: PatientSummary,
}

impl BatchSummary {
    fn push(&mut self, result: Option<PatientSummary>) {
        match result {
            Some(summary) => {
                self.patients += 1;
                self.totals.merge(&summary);
            }
            None => self.patients_failed += 1,
        }
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patient {} 个 (跳过 {}); {}",
            self.patients, self.patients_failed, self.totals
        )
    }
}

/// patch 输出的写出错误.
#[derive(Debug)]
pub enum WriteError {
    /// 栅格图像编码/写出错误.
    Image(image::ImageError),

    /// npy 数组写出错误.
    Npy(ndarray_npy::WriteNpyError),
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(e) => write!(f, "栅格图像写出错误: {e}"),
            Self::Npy(e) => write!(f, "npy 数组写出错误: {e}"),
        }
    }
}

impl Error for WriteError {}

impl From<image::ImageError> for WriteError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<ndarray_npy::WriteNpyError> for WriteError {
    fn from(e: ndarray_npy::WriteNpyError) -> Self {
        Self::Npy(e)
    }
}

/// 将加窗后的 `[0, 255]` 浮点 patch 渲染为 8-bit 灰度图.
fn patch_to_gray(patch: &Array2<f32>) -> GrayImage {
    let (height, width) = patch.dim();
    let mut buf = GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in patch.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, Luma([v.clamp(0.0, 255.0) as u8]));
    }
    buf
}

/// 按格式写出一个 patch.
fn write_patch(patch: &Array2<f32>, format: OutputFormat, path: &Path) -> Result<(), WriteError> {
    match format {
        OutputFormat::Png | OutputFormat::Jpeg => patch_to_gray(patch).save(path)?,
        OutputFormat::Npy => ndarray_npy::write_npy(path, patch)?,
    }
    Ok(())
}

/// 处理单个 patient: 对每个标注文件解析、联结, 并对每个
/// (切片, 轮廓) 写出请求的 patch 与掩膜.
///
/// 输出目录必须已存在 (见 [`OutputTree::ensure`]). 返回的统计同时会以
/// info 级别记入日志.
pub fn run_patient(
    patient: &str,
    volume: &CtVolume,
    voi_files: &[VoiFile],
    tree: &OutputTree,
    config: &ExtractConfig,
) -> PatientSummary {
    let mut summary = PatientSummary::default();
    let shape = volume.slice_shape();

    for voi_file in voi_files {
        let voi_stem = voi_file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match fs::read_to_string(&voi_file.path) {
            Ok(text) => text,
            Err(e) => {
                log::error!("{patient}: 读取标注 {} 失败: {e}", voi_file.path.display());
                summary.files_rejected += 1;
                continue;
            }
        };
        let annotations = match voi::parse(&text) {
            Ok(annotations) => annotations,
            Err(e) => {
                log::error!("{patient}: 标注 {voi_stem} 结构损坏, 整体作废: {e}");
                summary.files_rejected += 1;
                continue;
            }
        };
        let alignment = match align(volume, &annotations, config.policy) {
            Ok(alignment) => alignment,
            Err(e) => {
                log::error!("{patient}: 标注 {voi_stem} 联结失败, 整体作废: {e}");
                summary.files_rejected += 1;
                continue;
            }
        };
        summary.files_parsed += 1;
        summary.slices_skipped += alignment.skipped;

        for pair in &alignment.pairs {
            let stem = naming::output_stem(patient, &voi_stem, pair.z, pair.ordinal, voi_file.label);
            let mut produced = false;

            let windowed = pair.slice.to_windowed_f32(&config.window);
            let patch = pair
                .contour
                .bounding_box()
                .and_then(|bbox| roi::crop(windowed.view(), &bbox));
            match patch {
                Some(patch) => {
                    for &format in &config.formats {
                        let path = tree.patch_dir(format).join(naming::patch_file_name(&stem, format));
                        match write_patch(&patch, format, &path) {
                            Ok(()) => {
                                summary.outputs_written += 1;
                                produced = true;
                            }
                            Err(e) => {
                                log::error!("{patient}: 写出 {} 失败: {e}", path.display());
                                summary.writes_failed += 1;
                            }
                        }
                    }
                }
                None => log::warn!("{patient}: {stem} 的包围盒退化, 跳过 patch"),
            }

            if config.masks {
                match mask::rasterize(shape, pair.contour, config.mask_value) {
                    Ok(mask) => {
                        let path = tree.mask_dir().join(naming::mask_file_name(&stem));
                        match mask.save_raw(&path) {
                            Ok(()) => {
                                summary.outputs_written += 1;
                                produced = true;
                            }
                            Err(e) => {
                                log::error!("{patient}: 写出 {} 失败: {e}", path.display());
                                summary.writes_failed += 1;
                            }
                        }
                    }
                    Err(e) => log::warn!("{patient}: {stem}: {e}, 跳过掩膜"),
                }
            }

            if produced {
                summary.contours_done += 1;
            } else {
                summary.contours_skipped += 1;
            }
        }
    }

    log::info!("{patient}: {summary}");
    summary
}

/// 一个待处理的 patient 目录.
#[derive(Clone, Debug)]
pub struct PatientJob {
    /// patient 标识, 进入输出文件名.
    pub id: String,

    /// 已解码扫描文件路径.
    pub volume_path: PathBuf,

    /// 该 patient 的全部标注文件.
    pub voi_files: Vec<VoiFile>,
}

/// 加载并处理单个 patient. 扫描加载失败对该 patient 是终结性的.
fn run_job<F, E>(
    job: &PatientJob,
    load_volume: &F,
    tree: &OutputTree,
    config: &ExtractConfig,
) -> Option<PatientSummary>
where
    F: Fn(&Path) -> Result<CtVolume, E>,
    E: Display,
{
    match load_volume(&job.volume_path) {
        Ok(volume) => Some(run_patient(&job.id, &volume, &job.voi_files, tree, config)),
        Err(e) => {
            log::error!(
                "{}: 读取扫描 {} 失败, 跳过该 patient: {e}",
                job.id,
                job.volume_path.display()
            );
            None
        }
    }
}

/// 顺序批处理. `load_volume` 把已解码扫描文件读入 [`CtVolume`];
/// 各 patient 之间彼此独立, 互不传递任何状态.
pub fn run_patients<F, E>(
    jobs: &[PatientJob],
    load_volume: F,
    tree: &OutputTree,
    config: &ExtractConfig,
) -> BatchSummary
where
    F: Fn(&Path) -> Result<CtVolume, E>,
    E: Display,
{
    let mut batch = BatchSummary::default();
    for job in jobs {
        batch.push(run_job(job, &load_volume, tree, config));
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VolumeMeta;
    use ndarray::Array3;
    use std::fs;

    fn list_sorted(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn synthetic_volume() -> CtVolume {
        CtVolume::from_parts(
            Array3::from_shape_fn((5, 8, 8), |(z, h, w)| (z * 64 + h * 8 + w) as f32),
            VolumeMeta::default(),
        )
    }

    #[test]
    fn test_run_patient_end_to_end() {
        let _ = simple_logger::SimpleLogger::new().init();
        let root = std::env::temp_dir().join(format!("voi_berry_e2e_{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let voi_dir = root.join("patient0");
        fs::create_dir_all(&voi_dir).unwrap();

        // 切片 2 上的三角形轮廓, 以及一个结构损坏的同级标注文件.
        let good = voi_dir.join("lesion.voi");
        fs::write(&good, "2 # slice number\n1.0 1.0\n5.0 1.0\n3.0 5.0\n").unwrap();
        let bad = voi_dir.join("cancer_broken.voi");
        fs::write(&bad, "3.5 2.5\n1 # slice number\n").unwrap();

        let tree = OutputTree::new(root.join("out"));
        let config = ExtractConfig {
            formats: vec![OutputFormat::Png, OutputFormat::Npy],
            masks: true,
            ..Default::default()
        };
        tree.ensure(&config).unwrap();

        let files = [
            VoiFile::with_label(&good, 0),
            VoiFile::with_label(&bad, 1),
        ];
        let volume = synthetic_volume();
        let summary = run_patient("patient0", &volume, &files, &tree, &config);

        assert_eq!(summary.files_parsed, 1);
        assert_eq!(summary.files_rejected, 1);
        assert_eq!(summary.contours_done, 1);
        assert_eq!(summary.contours_skipped, 0);
        assert_eq!(summary.outputs_written, 3);
        assert_eq!(summary.writes_failed, 0);

        // 好文件产出且只产出切片 2 的文件; 坏文件没有任何输出.
        assert_eq!(
            list_sorted(&tree.patch_dir(OutputFormat::Png)),
            vec!["patient0_lesion_2_0.png"]
        );
        assert_eq!(
            list_sorted(&tree.patch_dir(OutputFormat::Npy)),
            vec!["patient0_lesion_2_0.npy"]
        );
        assert_eq!(
            list_sorted(&tree.mask_dir()),
            vec!["patient0_lesion_2_0_mask.png"]
        );

        // 掩膜与切片分辨率一致且含前景.
        let img = image::open(tree.mask_dir().join("patient0_lesion_2_0_mask.png"))
            .unwrap()
            .to_luma8();
        assert_eq!(img.dimensions(), (8, 8));
        assert!(img.pixels().any(|p| p.0[0] == crate::consts::gray::MASK_VIS));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_run_patients_load_failure_skips_patient() {
        let tree = OutputTree::new(std::env::temp_dir().join("voi_berry_batch_unused"));
        let config = ExtractConfig {
            formats: Vec::new(),
            ..Default::default()
        };
        let jobs = [PatientJob {
            id: "p0".to_owned(),
            volume_path: PathBuf::from("/nonexistent/volume.npz"),
            voi_files: Vec::new(),
        }];
        let batch = run_patients(
            &jobs,
            |_: &Path| Err::<CtVolume, _>("无法打开".to_owned()),
            &tree,
            &config,
        );
        assert_eq!(batch.patients, 0);
        assert_eq!(batch.patients_failed, 1);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("png".parse(), Ok(OutputFormat::Png));
        assert_eq!("jpeg".parse(), Ok(OutputFormat::Jpeg));
        assert_eq!("jpg".parse(), Ok(OutputFormat::Jpeg));
        assert_eq!("npy".parse(), Ok(OutputFormat::Npy));
        assert_eq!(
            "tiff".parse::<OutputFormat>(),
            Err(UnsupportedFormat("tiff".to_owned()))
        );
    }
}
