//! 3D 扫描切片与逐切片轮廓的联结.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use crate::voi::{Contour, VoiAnnotations};
use crate::{CtVolume, ScanSlice};

/// 标注引用了扫描中不存在的切片.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRangeSlice {
    /// 标注引用的切片索引.
    pub z: usize,

    /// 扫描的切片总数.
    pub len_z: usize,
}

impl Display for OutOfRangeSlice {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "标注引用切片 {}, 但扫描只有 {} 层切片",
            self.z, self.len_z
        )
    }
}

impl Error for OutOfRangeSlice {}

/// 标注切片索引越界时的处理策略.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutOfRangePolicy {
    /// 跳过越界切片并打印警告, 继续处理其余切片.
    ///
    /// 单个标错层号的轮廓不应阻断同一 patient 其余数据的提取,
    /// 因此这是默认策略.
    #[default]
    Skip,

    /// 遇到首个越界切片即返回错误.
    Fail,
}

/// 一次成功联结的 (切片, 轮廓) 对.
#[derive(Debug)]
pub struct AlignedContour<'v, 'a> {
    /// 切片索引.
    pub z: usize,

    /// 该轮廓在其切片轮廓组内的序号 (从 0 开始).
    pub ordinal: usize,

    /// 切片视图.
    pub slice: ScanSlice<'v>,

    /// 轮廓.
    pub contour: &'a Contour,
}

/// 联结结果.
#[derive(Debug)]
pub struct Alignment<'v, 'a> {
    /// 按切片索引升序、组内按出现顺序排列的联结对.
    pub pairs: Vec<AlignedContour<'v, 'a>>,

    /// 因切片索引越界而被跳过的轮廓个数 (仅 [`OutOfRangePolicy::Skip`]).
    pub skipped: usize,
}

/// 将扫描体数据与标注集按切片索引联结.
///
/// 对同时存在于 `[0, len_z)` 与标注集中的每个切片索引,
/// 其名下的每个轮廓产出一个 [`AlignedContour`]. 越界索引的处理由
/// `policy` 决定.
pub fn align<'v, 'a>(
    volume: &'v CtVolume,
    annotations: &'a VoiAnnotations,
    policy: OutOfRangePolicy,
) -> Result<Alignment<'v, 'a>, OutOfRangeSlice> {
    let len_z = volume.len_z();
    let mut pairs = Vec::with_capacity(annotations.contour_len());
    let mut skipped = 0usize;

    for (z, contours) in annotations.iter() {
        if z >= len_z {
            match policy {
                OutOfRangePolicy::Fail => return Err(OutOfRangeSlice { z, len_z }),
                OutOfRangePolicy::Skip => {
                    log::warn!("{}, 跳过其 {} 个轮廓", OutOfRangeSlice { z, len_z }, contours.len());
                    skipped += contours.len();
                    continue;
                }
            }
        }
        for (ordinal, contour) in contours.iter().enumerate() {
            pairs.push(AlignedContour {
                z,
                ordinal,
                slice: volume.slice_at(z),
                contour,
            });
        }
    }

    Ok(Alignment { pairs, skipped })
}
