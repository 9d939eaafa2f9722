//! CT 扫描切片与掩膜切片对象的操作, 及其持久化存储.

use super::window::CtWindow;
use crate::consts::gray::MASK_BACKGROUND;
use crate::Idx2d;
use image::{GrayImage, ImageResult, Luma};
use ndarray::{Array2, ArrayView2};
use std::path::Path;

/// 不可变、借用的二维水平 CT 扫描切片. 体素值为 CT HU.
#[derive(Debug)]
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CtVolume`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<f32> {
        self.data.view()
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let &[h, w] = self.data.shape() else {
            unreachable!()
        };
        (h, w)
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 获取给定位置 (高, 宽) 的 HU 值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, HU 值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 在窗 `window` 下将切片渲染为 `[0, 255]` 区间的 `f32` 灰度分布.
    ///
    /// 非有限 HU 值 (inf, NaN) 渲染为 0.
    pub fn to_windowed_f32(&self, window: &CtWindow) -> Array2<f32> {
        self.data.map(|&hu| window.eval_f32(hu).unwrap_or(0.0))
    }

    /// 在窗 `window` 下将切片渲染为 8-bit 灰度图.
    ///
    /// 非有限 HU 值 (inf, NaN) 渲染为 0.
    pub fn to_gray(&self, window: &CtWindow) -> GrayImage {
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &hu) in self.indexed_iter() {
            let gray = window.eval(hu).unwrap_or(u8::MIN);
            buf.put_pixel(w as u32, h as u32, Luma([gray]));
        }
        buf
    }

    /// 在窗 `window` 下将切片保存到 `path` 路径. 图像格式由扩展名决定.
    #[inline]
    pub fn save_windowed<P: AsRef<Path>>(&self, window: &CtWindow, path: P) -> ImageResult<()> {
        self.to_gray(window).save(path)
    }
}

/// 拥有所有权的二维二值掩膜切片. 像素值仅为 0 或某个固定前景值.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSlice {
    data: Array2<u8>,
}

impl MaskSlice {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<u8> {
        self.data.view()
    }

    /// 交出底层数组的所有权.
    #[inline]
    pub fn into_inner(self) -> Array2<u8> {
        self.data
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let &[h, w] = self.data.shape() else {
            unreachable!()
        };
        (h, w)
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&u8> {
        self.data.get(pos)
    }

    /// 统计掩膜中值为 `value` 的像素总个数.
    #[inline]
    pub fn count(&self, value: u8) -> usize {
        self.data.iter().filter(|&p| *p == value).count()
    }

    /// 统计掩膜中的前景像素总个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&p| *p != MASK_BACKGROUND).count()
    }

    /// 以行优先规则, 获取能迭代掩膜所有 `(索引, 像素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
        self.data.indexed_iter()
    }

    /// 按原样将掩膜渲染为 8-bit 灰度图.
    pub fn to_gray_image(&self) -> GrayImage {
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in self.indexed_iter() {
            buf.put_pixel(w as u32, h as u32, Luma([pix]));
        }
        buf
    }

    /// 按原样将掩膜保存到 `path` 路径. 图像格式由扩展名决定.
    #[inline]
    pub fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_gray_image().save(path)
    }
}
