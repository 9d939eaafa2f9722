//! 已解码扫描体数据的加载, 以及 patient 目录内容的发现.
//!
//! 扫描解码 (DICOM 序列等) 由上游工具完成, 结果以 npz/npy 数组文件
//! 落盘: `scan` 为 `[z, 高, 宽]` 的 `f32` 3D 数组, 可选的 `origin` 与
//! `spacing` 为长度 3 的 `f64` 向量 (同为 `[z, y, x]` 次序).

use std::env;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array3, Ix1, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpzError};
use voi_berry::{CtVolume, VolumeMeta};

/// 加载已解码扫描文件的错误. 对所属 patient 是终结性的.
#[derive(Debug)]
pub enum LoadVolumeError {
    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// 读取 npy 文件错误.
    Npy(ReadNpyError),

    /// 读取 npz 归档错误.
    Npz(ReadNpzError),

    /// npz 归档内没有 `scan` 条目.
    MissingScanEntry,

    /// `origin`/`spacing` 条目不是长度 3 的向量.
    BadMetaVector(&'static str),

    /// 不认识的扩展名, 仅支持 npz 与 npy.
    UnsupportedExtension(PathBuf),
}

impl Display for LoadVolumeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O 错误: {e}"),
            Self::Npy(e) => write!(f, "npy 读取错误: {e}"),
            Self::Npz(e) => write!(f, "npz 读取错误: {e}"),
            Self::MissingScanEntry => write!(f, "npz 归档内没有 `scan` 条目"),
            Self::BadMetaVector(which) => write!(f, "`{which}` 条目不是长度 3 的向量"),
            Self::UnsupportedExtension(p) => {
                write!(f, "不认识的扫描文件扩展名: {}", p.display())
            }
        }
    }
}

impl Error for LoadVolumeError {}

impl From<std::io::Error> for LoadVolumeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ReadNpyError> for LoadVolumeError {
    fn from(e: ReadNpyError) -> Self {
        Self::Npy(e)
    }
}

impl From<ReadNpzError> for LoadVolumeError {
    fn from(e: ReadNpzError) -> Self {
        Self::Npz(e)
    }
}

/// 获取提取输入根目录.
///
/// 1. 若环境变量 `$PATCH2D_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset`.
pub fn input_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("PATCH2D_INPUT_DIR") {
        PathBuf::from(d)
    } else {
        let mut ans = dirs::home_dir().expect("无法定位用户主目录");
        ans.push("dataset");
        ans
    }
}

/// 从 npz/npy 文件加载已解码扫描. 格式由扩展名决定.
///
/// 裸 npy 文件只含体数据, 元信息取占位默认值 (零原点, 单位间距).
pub fn open_volume<P: AsRef<Path>>(path: P) -> Result<CtVolume, LoadVolumeError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => {
            let data: Array3<f32> = ndarray_npy::read_npy(path)?;
            Ok(CtVolume::from_parts(data, VolumeMeta::default()))
        }
        Some("npz") => open_npz_volume(path),
        _ => Err(LoadVolumeError::UnsupportedExtension(path.to_owned())),
    }
}

/// 在 npz 条目名里定位 `want` (兼容带与不带 `.npy` 后缀两种写法).
fn locate_entry<'a>(names: &'a [String], want: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|n| n.as_str() == want || n.strip_suffix(".npy") == Some(want))
        .map(String::as_str)
}

fn vec3(array: Array1<f64>, which: &'static str) -> Result<[f64; 3], LoadVolumeError> {
    array
        .to_vec()
        .try_into()
        .map_err(|_| LoadVolumeError::BadMetaVector(which))
}

fn open_npz_volume(path: &Path) -> Result<CtVolume, LoadVolumeError> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;

    let scan_name = locate_entry(&names, "scan").ok_or(LoadVolumeError::MissingScanEntry)?;
    let scan: Array3<f32> = npz.by_name::<OwnedRepr<f32>, Ix3>(scan_name)?;

    let mut meta = VolumeMeta::default();
    if let Some(name) = locate_entry(&names, "origin") {
        meta.origin = vec3(npz.by_name::<OwnedRepr<f64>, Ix1>(name)?, "origin")?;
    }
    if let Some(name) = locate_entry(&names, "spacing") {
        meta.spacing = vec3(npz.by_name::<OwnedRepr<f64>, Ix1>(name)?, "spacing")?;
    }
    Ok(CtVolume::from_parts(scan, meta))
}

/// 在 patient 目录下定位已解码扫描文件.
///
/// 优先取 `volume.npz` / `volume.npy`; 否则取字典序最小的 npz/npy 文件.
pub fn find_volume_file<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
    let dir = dir.as_ref();
    for name in ["volume.npz", "volume.npy"] {
        let p = dir.join(name);
        if p.is_file() {
            return Some(p);
        }
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("npz") | Some("npy")
                )
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// 收集 patient 目录下的全部 VOI 标注文件, 按字典序排列.
pub fn find_voi_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir.as_ref()) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("voi"))
        })
        .collect();
    files.sort();
    files
}
