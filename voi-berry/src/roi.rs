//! 轮廓包围盒与 patch 裁剪.

use itertools::Itertools;
use ndarray::{s, Array2, ArrayView2};

use crate::voi::Contour;
use crate::Idx2d;

/// 轮廓的轴对齐整数包围盒.
///
/// 坐标按 floor/ceil 从浮点极值取整, 因此 `x_max`/`y_max` 是包含性的
/// 上界候选; 裁剪时按半开区间 `[min, max)` 使用. 该结构是按需重新计算
/// 的临时量, 不做持久化.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// 水平方向下界, `floor(min x)`.
    pub x_min: i64,
    /// 垂直方向下界, `floor(min y)`.
    pub y_min: i64,
    /// 水平方向上界, `ceil(max x)`.
    pub x_max: i64,
    /// 垂直方向上界, `ceil(max y)`.
    pub y_max: i64,
}

impl BoundingBox {
    /// 计算点列的包围盒. 点列为空时返回 `None`.
    pub fn of(points: &[crate::Coord2d]) -> Option<BoundingBox> {
        let (x_min, x_max) = points
            .iter()
            .map(|&(x, _)| x)
            .minmax_by(f64::total_cmp)
            .into_option()?;
        let (y_min, y_max) = points
            .iter()
            .map(|&(_, y)| y)
            .minmax_by(f64::total_cmp)
            .into_option()?;
        Some(BoundingBox {
            x_min: x_min.floor() as i64,
            y_min: y_min.floor() as i64,
            x_max: x_max.ceil() as i64,
            y_max: y_max.ceil() as i64,
        })
    }

    /// 将各坐标钳制到形状为 `(高, 宽)` 的切片的合法索引范围
    /// `[0, 宽-1] × [0, 高-1]` 内.
    pub fn clamp_to(&self, (h, w): Idx2d) -> BoundingBox {
        let cx = |x: i64| x.clamp(0, w as i64 - 1);
        let cy = |y: i64| y.clamp(0, h as i64 - 1);
        BoundingBox {
            x_min: cx(self.x_min),
            y_min: cy(self.y_min),
            x_max: cx(self.x_max),
            y_max: cy(self.y_max),
        }
    }

    /// 包围盒是否退化 (宽或高为零, 如单点或水平/垂直线段轮廓)?
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.x_min == self.x_max || self.y_min == self.y_max
    }

    /// 半开区间宽度 `x_max - x_min`.
    #[inline]
    pub fn width(&self) -> i64 {
        self.x_max - self.x_min
    }

    /// 半开区间高度 `y_max - y_min`.
    #[inline]
    pub fn height(&self) -> i64 {
        self.y_max - self.y_min
    }

    /// 半开区间面积, 即裁剪后的像素个数.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }
}

impl Contour {
    /// 计算轮廓的包围盒. 轮廓为空时返回 `None`.
    ///
    /// 结果未按切片大小钳制; 裁剪前先经 [`BoundingBox::clamp_to`].
    #[inline]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of(self.points())
    }
}

/// 按包围盒从切片数组上裁剪 patch: 半开区间
/// `[y_min, y_max) × [x_min, x_max)`, 行对应 y, 列对应 x.
///
/// 裁剪前内部会再按切片大小钳制一次包围盒. 钳制后退化的包围盒
/// 返回 `None` (显式的零面积信号), 由调用者决定是否跳过写出.
/// 纯函数, 无副作用.
pub fn crop(slice: ArrayView2<f32>, bbox: &BoundingBox) -> Option<Array2<f32>> {
    let (h, w) = slice.dim();
    let bbox = bbox.clamp_to((h, w));
    if bbox.is_degenerate() {
        return None;
    }
    let (x0, x1) = (bbox.x_min as usize, bbox.x_max as usize);
    let (y0, y1) = (bbox.y_min as usize, bbox.y_max as usize);
    Some(slice.slice(s![y0..y1, x0..x1]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn rect_contour() -> Contour {
        [(10.0, 10.0), (10.0, 20.0), (20.0, 20.0), (20.0, 10.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_bounding_box_of_rectangle() {
        // 矩形轮廓的包围盒应精确复原四角.
        let bbox = rect_contour().bounding_box().unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x_min: 10,
                y_min: 10,
                x_max: 20,
                y_max: 20
            }
        );
        assert_eq!(bbox.area(), 100);
    }

    #[test]
    fn test_bounding_box_floor_ceil() {
        let c: Contour = [(1.2, 2.8), (4.6, 0.4), (3.0, 5.0)].into_iter().collect();
        let bbox = c.bounding_box().unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x_min: 1,
                y_min: 0,
                x_max: 5,
                y_max: 5
            }
        );
    }

    #[test]
    fn test_bounding_box_empty() {
        assert_eq!(Contour::new().bounding_box(), None);
    }

    #[test]
    fn test_crop_area_matches_bbox() {
        let slice = Array2::from_shape_fn((30, 30), |(h, w)| (h * 30 + w) as f32);
        let bbox = rect_contour().bounding_box().unwrap();
        let patch = crop(slice.view(), &bbox).unwrap();

        assert_eq!(patch.dim(), (10, 10));
        assert_eq!(patch.len() as i64, bbox.area());
        // 左上角: 行 y_min, 列 x_min.
        assert_eq!(patch[(0, 0)], (10 * 30 + 10) as f32);
        // 右下角: 行 y_max - 1, 列 x_max - 1.
        assert_eq!(patch[(9, 9)], (19 * 30 + 19) as f32);
    }

    #[test]
    fn test_crop_degenerate_single_point() {
        let slice = Array2::<f32>::zeros((30, 30));
        let c: Contour = [(7.0, 7.0)].into_iter().collect();
        let bbox = c.bounding_box().unwrap();
        assert!(bbox.clamp_to((30, 30)).is_degenerate());
        assert_eq!(crop(slice.view(), &bbox), None);
    }

    #[test]
    fn test_crop_clamps_to_slice() {
        let slice = Array2::<f32>::zeros((16, 16));
        // 轮廓越过切片右下边界.
        let c: Contour = [(-3.0, 4.0), (30.0, 4.0), (30.0, 40.0), (-3.0, 40.0)]
            .into_iter()
            .collect();
        let bbox = c.bounding_box().unwrap();
        let clamped = bbox.clamp_to((16, 16));
        assert_eq!(
            clamped,
            BoundingBox {
                x_min: 0,
                y_min: 4,
                x_max: 15,
                y_max: 15
            }
        );
        let patch = crop(slice.view(), &bbox).unwrap();
        assert_eq!(patch.dim(), (11, 15));
    }

    #[test]
    fn test_crop_fully_outside() {
        let slice = Array2::<f32>::zeros((8, 8));
        let c: Contour = [(20.0, 20.0), (25.0, 20.0), (25.0, 25.0)].into_iter().collect();
        let bbox = c.bounding_box().unwrap();
        assert_eq!(crop(slice.view(), &bbox), None);
    }
}
