//! 命令行定义与批处理执行.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use utils::loader;
use voi_berry::prelude::*;

/// 从已解码的 CT 扫描与 VOI 轮廓标注中批量提取带标签的
/// 2D 病灶 patch 与二值掩膜.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// 输入根目录, 其每个子目录为一个 patient.
    /// 缺省时依次回退到 `$PATCH2D_INPUT_DIR` 与 `$HOME/dataset`.
    #[arg(long = "input-dir", short = 'D')]
    input_dir: Option<PathBuf>,

    /// 输出根目录.
    #[arg(long = "target-folder", short = 'o')]
    target_folder: PathBuf,

    /// patch 输出格式, 逗号分隔的 {png, jpeg, npy} 子集.
    #[arg(long = "image-type", default_value = "png,npy")]
    image_type: String,

    /// 窗位 (HU).
    #[arg(long = "wl", default_value_t = DEFAULT_WL)]
    wl: f32,

    /// 半窗宽 (HU). 钳制区间为 [wl - ww, wl + ww].
    #[arg(long = "ww", default_value_t = DEFAULT_WW)]
    ww: f32,

    /// 同时输出轮廓掩膜.
    #[arg(long = "masks")]
    masks: bool,

    /// 掩膜前景像素值.
    #[arg(long = "mask-value", default_value_t = MASK_VIS)]
    mask_value: u8,

    /// 标注引用越界切片时作废整个标注文件, 而不是跳过并告警.
    #[arg(long = "strict-slices")]
    strict_slices: bool,

    /// 串行处理各 patient (默认并行).
    #[arg(long = "serial")]
    serial: bool,
}

impl Cli {
    /// 实际运行. 返回进程退出码.
    pub fn run(self) -> i32 {
        let input_dir = self
            .input_dir
            .clone()
            .unwrap_or_else(loader::input_dir_from_env_or_home);
        if !input_dir.is_dir() {
            log::error!("输入目录不存在: {}", input_dir.display());
            return 1;
        }

        let mut formats = Vec::new();
        for token in self.image_type.split(',').filter(|t| !t.trim().is_empty()) {
            match token.parse::<OutputFormat>() {
                Ok(format) => {
                    if !formats.contains(&format) {
                        formats.push(format);
                    }
                }
                Err(e) => {
                    log::error!("{e}");
                    return 1;
                }
            }
        }

        let Some(window) = CtWindow::new(self.wl, self.ww) else {
            log::error!("窗位/半窗宽超出合理范围: wl={}, ww={}", self.wl, self.ww);
            return 1;
        };

        let config = ExtractConfig {
            formats,
            window,
            masks: self.masks,
            mask_value: self.mask_value,
            policy: if self.strict_slices {
                OutOfRangePolicy::Fail
            } else {
                OutOfRangePolicy::Skip
            },
        };
        let tree = OutputTree::new(&self.target_folder);
        if let Err(e) = tree.ensure(&config) {
            log::error!("创建输出目录失败: {e}");
            return 1;
        }

        log::info!("[i] 输入目录: {}", input_dir.display());
        log::info!("[i] 输出目录: {}", self.target_folder.display());
        log::info!("[i] 输出格式: {:?}", config.formats);
        log::info!("[i] 窗位: {}, 半窗宽: {}", self.wl, self.ww);

        let jobs = match collect_jobs(&input_dir) {
            Ok(jobs) => jobs,
            Err(e) => {
                log::error!("枚举 patient 目录失败: {e}");
                return 1;
            }
        };
        if jobs.is_empty() {
            log::warn!("输入目录下没有可处理的 patient");
            return 0;
        }

        let batch = if self.serial {
            run_patients(&jobs, |p: &Path| loader::open_volume(p), &tree, &config)
        } else {
            let _ = rayon::ThreadPoolBuilder::new()
                .num_threads(utils::cpus())
                .build_global();
            run_patients_par(&jobs, |p: &Path| loader::open_volume(p), &tree, &config)
        };

        utils::sep();
        log::info!("批处理完成: {batch}");
        0
    }
}

/// 枚举输入根目录下的 patient 目录, 组装成待处理任务.
///
/// 没有扫描文件或没有标注文件的目录跳过并告警.
fn collect_jobs(input_dir: &Path) -> std::io::Result<Vec<PatientJob>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut jobs = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(volume_path) = loader::find_volume_file(&dir) else {
            log::warn!("{id}: 目录下没有已解码扫描文件, 跳过");
            continue;
        };
        let voi_paths = loader::find_voi_files(&dir);
        if voi_paths.is_empty() {
            log::warn!("{id}: 目录下没有 VOI 标注文件, 跳过");
            continue;
        }
        let voi_files = voi_paths
            .into_iter()
            .map(|p| {
                let label = label_of(&p);
                VoiFile::with_label(p, label)
            })
            .collect();
        jobs.push(PatientJob {
            id,
            volume_path,
            voi_files,
        });
    }
    Ok(jobs)
}

/// 恶性命名约定: 标注文件词干含 `cancer` (不区分大小写) 记
/// [`LABEL_CANCER`], 否则记 [`LABEL_BENIGN`].
fn label_of(path: &Path) -> u8 {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if stem.contains("cancer") {
        LABEL_CANCER
    } else {
        LABEL_BENIGN
    }
}
