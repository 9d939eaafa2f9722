//! VOI 轮廓标注: 数据模型与文本解析.
//!
//! 一个 VOI 标注文件描述若干 2D 闭合轮廓, 每个轮廓从属于 3D 扫描的
//! 某一水平切片. 文件为松散的表格式文本, 存在两种结构变体
//! (见 [`VoiFormat`]), 两者共享同一 [`parse`] 契约.

use std::collections::BTreeMap;

use crate::Coord2d;

mod parse;

pub use parse::{parse, parse_with, MalformedVoi, VoiFormat};

/// 单一切片上的一个闭合轮廓: 按序排列的 (x, y) 浮点坐标点列.
///
/// 点坐标与切片像素栅格处于同一坐标系, 不做单位换算.
/// 首尾之间隐含一条闭合边.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contour {
    points: Vec<Coord2d>,
}

impl FromIterator<Coord2d> for Contour {
    #[inline]
    fn from_iter<T: IntoIterator<Item = Coord2d>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl Contour {
    /// 创建空轮廓.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建空轮廓, 并预留 `cap` 个点的容量.
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            points: Vec::with_capacity(cap),
        }
    }

    /// 在末尾追加一个点.
    #[inline]
    pub fn push(&mut self, point: Coord2d) {
        self.points.push(point);
    }

    /// 轮廓点数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 轮廓是否没有任何点?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 获取底层点列.
    #[inline]
    pub fn points(&self) -> &[Coord2d] {
        &self.points
    }

    /// 获取能按序迭代所有点的迭代器.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Coord2d> {
        self.points.iter()
    }

    /// 获得去重后的点列: 连续重复的点只保留一个, 且若末点与首点重合
    /// (显式闭合的数字化轮廓), 则去掉末点.
    ///
    /// 重合按位级相等判断. 数字化工具产生的重复点是逐字节拷贝,
    /// 不需要距离容差.
    pub fn deduped(&self) -> Vec<Coord2d> {
        let mut pts = self.points.clone();
        pts.dedup();
        if pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        pts
    }
}

/// 一个标注文件的全部轮廓, 按切片索引组织.
///
/// 同一切片可以出现多个轮廓 (多病灶切片); 它们按出现顺序保留,
/// 后出现的轮廓 **追加** 而不是覆盖先前的轮廓.
/// 解析完成后该结构只读.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoiAnnotations {
    slices: BTreeMap<usize, Vec<Contour>>,
}

impl VoiAnnotations {
    /// 创建空标注集.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 将 `contour` 追加到切片 `z` 名下.
    pub fn insert(&mut self, z: usize, contour: Contour) {
        self.slices.entry(z).or_default().push(contour);
    }

    /// 含有轮廓的切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// 标注集是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// 全部轮廓总数.
    #[inline]
    pub fn contour_len(&self) -> usize {
        self.slices.values().map(Vec::len).sum()
    }

    /// 获取切片 `z` 名下的所有轮廓. 该切片没有轮廓时返回 `None`.
    #[inline]
    pub fn get(&self, z: usize) -> Option<&[Contour]> {
        self.slices.get(&z).map(Vec::as_slice)
    }

    /// 获取能按切片索引升序迭代所有 `(切片索引, 轮廓组)` 的迭代器.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Contour])> {
        self.slices.iter().map(|(&z, v)| (z, v.as_slice()))
    }

    /// 获取能按升序迭代所有含轮廓切片索引的迭代器.
    #[inline]
    pub fn z_iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slices.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contour_deduped() {
        let c: Contour = [(1.0, 1.0), (1.0, 1.0), (5.0, 1.0), (3.0, 5.0), (1.0, 1.0)]
            .into_iter()
            .collect();
        assert_eq!(c.len(), 5);
        assert_eq!(c.deduped(), vec![(1.0, 1.0), (5.0, 1.0), (3.0, 5.0)]);
    }

    #[test]
    fn test_annotations_append_not_overwrite() {
        let mut ann = VoiAnnotations::new();
        let c1: Contour = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)].into_iter().collect();
        let c2: Contour = [(5.0, 5.0), (6.0, 5.0), (5.0, 6.0)].into_iter().collect();
        ann.insert(7, c1.clone());
        ann.insert(7, c2.clone());

        assert_eq!(ann.len(), 1);
        assert_eq!(ann.contour_len(), 2);
        assert_eq!(ann.get(7), Some([c1, c2].as_slice()));
        assert_eq!(ann.get(8), None);
        assert_eq!(ann.z_iter().collect::<Vec<_>>(), vec![7]);
    }
}
