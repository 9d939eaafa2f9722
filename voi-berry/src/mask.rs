//! 闭合轮廓的二值掩膜光栅化.
//!
//! 扫描线多边形填充采用 **even-odd 规则**, 以像素中心
//! (`x + 0.5`, `y + 0.5`) 为采样点. 数字化轮廓常见自交与局部凹陷,
//! even-odd 规则无需维护环方向即可对其给出确定的结果; 光栅化之后
//! 再做一遍孔洞填充, 把被前景完全包住的背景连通域并入前景.

use std::collections::{HashSet, VecDeque};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use ndarray::Array2;
use ordered_float::OrderedFloat;

use crate::consts::gray::MASK_BACKGROUND;
use crate::voi::Contour;
use crate::{Coord2d, Idx2d, MaskSlice};

/// 轮廓退化错误: 连续去重后不足 3 个点, 无法张成可光栅化的多边形.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegenerateContour {
    /// 去重后剩余的点数.
    pub points: usize,
}

impl Display for DegenerateContour {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "轮廓去重后仅剩 {} 个点, 无法光栅化", self.points)
    }
}

impl Error for DegenerateContour {}

/// 将闭合轮廓光栅化为形状 `(高, 宽)` 的二值掩膜, 前景像素值为 `fill`.
///
/// 算法分三步: even-odd 扫描线填充; 孔洞填充 (见 [`fill_holes`]);
/// 前景统一写为 `fill`. 掩膜分辨率与目标切片严格一致,
/// 以便下游直接按切片文件写出.
///
/// `fill` 必须非零. 轮廓去重后不足 3 个点时返回
/// [`DegenerateContour`], 调用者可跳过该切片的掩膜而不中断整个
/// patient 的处理.
pub fn rasterize(
    shape: Idx2d,
    contour: &Contour,
    fill: u8,
) -> Result<MaskSlice, DegenerateContour> {
    debug_assert_ne!(fill, MASK_BACKGROUND, "前景值不允许为背景值");

    let points = contour.deduped();
    if points.len() < 3 {
        return Err(DegenerateContour {
            points: points.len(),
        });
    }

    let mut mask = Array2::from_elem(shape, MASK_BACKGROUND);
    scan_fill(&mut mask, &points, fill);
    fill_holes(&mut mask, fill);
    Ok(MaskSlice::new(mask))
}

/// even-odd 扫描线填充.
///
/// 对每一行以 `y + 0.5` 为采样线, 求其与多边形各边的交点横坐标,
/// 排序后按奇偶配对; 每一对 `[a, b)` 之间像素中心落入区间的列置为前景.
fn scan_fill(mask: &mut Array2<u8>, points: &[Coord2d], fill: u8) {
    let (h, w) = mask.dim();
    let mut xs: Vec<f64> = Vec::with_capacity(8);

    for row in 0..h {
        let yc = row as f64 + 0.5;
        xs.clear();

        // 首尾相接, 闭合边与显式边一视同仁.
        for (&(px, py), &(qx, qy)) in points
            .iter()
            .chain(std::iter::once(&points[0]))
            .tuple_windows()
        {
            // 半开判据: 每条扫描线上, 共享顶点的相邻边只计一次交点.
            if (py <= yc && yc < qy) || (qy <= yc && yc < py) {
                xs.push(px + (yc - py) * (qx - px) / (qy - py));
            }
        }

        xs.sort_unstable_by_key(|&x| OrderedFloat(x));
        for pair in xs.chunks_exact(2) {
            let &[a, b] = pair else { unreachable!() };
            // 列 c 的像素中心 c + 0.5 落入 [a, b).
            let from = (a - 0.5).ceil().max(0.0) as usize;
            let to = ((b - 0.5).ceil().max(0.0) as usize).min(w);
            for col in from..to {
                mask[(row, col)] = fill;
            }
        }
    }
}

/// 孔洞填充: 将被前景完全包住的背景连通域 (4-相邻规则) 置为 `fill`.
///
/// 从画布边缘上的背景像素发起 BFS, 标记所有与边缘连通的背景;
/// 其余背景即孔洞. 返回被填充的像素个数.
pub fn fill_holes(mask: &mut Array2<u8>, fill: u8) -> usize {
    let (h, w) = mask.dim();
    let mut open = HashSet::with_capacity(2 * (h + w));
    let mut bfs_q: VecDeque<Idx2d> = mask
        .indexed_iter()
        .filter_map(|((row, col), &pix)| {
            let at_border = row == 0 || row + 1 == h || col == 0 || col + 1 == w;
            (at_border && pix == MASK_BACKGROUND).then_some((row, col))
        })
        .collect();

    while let Some(cur) = bfs_q.pop_front() {
        if open.contains(&cur) {
            continue;
        }
        open.insert(cur);

        // bfs
        let (cur_h, cur_w) = cur;
        if cur_h > 0 && mask[(cur_h - 1, cur_w)] == MASK_BACKGROUND {
            bfs_q.push_back((cur_h - 1, cur_w));
        }
        if cur_h + 1 < h && mask[(cur_h + 1, cur_w)] == MASK_BACKGROUND {
            bfs_q.push_back((cur_h + 1, cur_w));
        }
        if cur_w > 0 && mask[(cur_h, cur_w - 1)] == MASK_BACKGROUND {
            bfs_q.push_back((cur_h, cur_w - 1));
        }
        if cur_w + 1 < w && mask[(cur_h, cur_w + 1)] == MASK_BACKGROUND {
            bfs_q.push_back((cur_h, cur_w + 1));
        }
    }

    let mut filled = 0usize;
    for (pos, pix) in mask.indexed_iter_mut() {
        if *pix == MASK_BACKGROUND && !open.contains(&pos) {
            *pix = fill;
            filled += 1;
        }
    }
    filled
}
