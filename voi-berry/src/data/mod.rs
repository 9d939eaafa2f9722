use std::ops::Index;

use ndarray::{Array2, Array3, ArrayView, Axis, Ix3};

use crate::{Idx2d, Idx3d};

mod slice;
pub mod window;

pub use slice::{MaskSlice, ScanSlice};
pub use window::CtWindow;

/// 3D 扫描的物理元信息. 各分量均按 (z, 高, 宽) 次序组织,
/// 即解码器需要把惯用的 (x, y, z) 次序反转后再交给本结构.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeMeta {
    /// 各轴原点坐标, 以毫米为单位.
    pub origin: [f64; 3],

    /// 各轴体素间距, 以毫米为单位.
    pub spacing: [f64; 3],
}

impl Default for VolumeMeta {
    /// 原点为零、间距为单位长度的占位元信息.
    #[inline]
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            spacing: [1.0; 3],
        }
    }
}

impl VolumeMeta {
    /// 获取水平切片方向的像素实际面积值, 以平方毫米为单位.
    #[inline]
    pub fn slice_pixel(&self) -> f64 {
        self.spacing[1] * self.spacing[2]
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.spacing.iter().product()
    }
}

/// 已解码的 3D CT 扫描, 包括 HU 体数据和物理元信息. HU 值以 `f32` 保存,
/// 按 `[z, 高, 宽]` 组织.
///
/// 该结构不负责读取任何扫描文件格式. 解码工作由上游完成,
/// 随后通过 [`CtVolume::from_parts`] 或 [`CtVolume::from_slices`] 进入.
#[derive(Debug, Clone)]
pub struct CtVolume {
    data: Array3<f32>,
    meta: VolumeMeta,
}

impl Index<Idx3d> for CtVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtVolume {
    /// 从已解码的体数据和元信息直接创建实体.
    ///
    /// `data` 必须按 `[z, 高, 宽]` 组织.
    #[inline]
    pub fn from_parts(data: Array3<f32>, meta: VolumeMeta) -> Self {
        Self { data, meta }
    }

    /// 从按 z 序排列的 2D 切片序列创建实体.
    ///
    /// 所有切片的分辨率必须一致, 且序列非空, 否则返回 `None`.
    pub fn from_slices(slices: &[Array2<f32>], meta: VolumeMeta) -> Option<Self> {
        let first = slices.first()?;
        if slices.iter().any(|s| s.dim() != first.dim()) {
            return None;
        }
        let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
        // 形状已经过检查, 该操作不会生成 `Err`, 可直接 unwrap.
        let data = ndarray::stack(Axis(0), &views).unwrap();
        Some(Self { data, meta })
    }

    /// 获取物理元信息.
    #[inline]
    pub fn meta(&self) -> &VolumeMeta {
        &self.meta
    }

    /// 获取数据形状大小.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let &[z, h, w] = self.data.shape() else {
            unreachable!()
        };
        (z, h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取数据体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 扫描水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }
}
