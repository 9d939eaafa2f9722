#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供 MIPAV VOI 轮廓标注文件的结构化解析, 以及从 3D CT
//! 扫描中提取带标签的 2D 病灶 patch 和二值掩膜的基础算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 不负责扫描体数据的解码. 3D 扫描以 "已解码" 的形式进入:
//!   按 z 序组织的 2D 切片数组, 外加 origin/spacing 物理元信息
//!   (见 [`CtVolume::from_parts`]).
//! 2. 轮廓坐标默认已与切片像素栅格对齐, 主路径不做物理坐标到体素
//!   坐标的换算. origin/spacing 仅作为元信息携带.
//! 3. 在非期望情况下 (如通过类型化接口进行越界索引), 程序会直接
//!   panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### VOI 标注文本解析 ✅
//!
//! 同一 `parse` 契约下的两种结构变体 (逐行扫描 / 定列偏移),
//! 自动嗅探或显式指定.
//!
//! 实现位于 `voi-berry/src/voi`.
//!
//! ### 轮廓光栅化与孔洞填充 ✅
//!
//! even-odd 扫描线多边形填充, 以及边界连通性孔洞闭合.
//!
//! 实现位于 `voi-berry/src/mask.rs`.
//!
//! ### 包围盒计算与 patch 裁剪 ✅
//!
//! floor/ceil 极值包围盒, 按切片大小约束, 半开区间裁剪.
//!
//! 实现位于 `voi-berry/src/roi.rs`.
//!
//! ### 切片-轮廓对齐 ✅
//!
//! 按 z 索引联结 3D 扫描切片与逐切片轮廓, 越界索引可跳过或报错.
//!
//! 实现位于 `voi-berry/src/align.rs`.
//!
//! ### CT window 视图 ✅
//!
//! 提供一个独立的 CT 窗口对象, 以便将 CT HU 值钳制并转换为
//! 8-bit 灰度值.
//!
//! 实现位于 `voi-berry/src/data/window.rs`.
//!
//! ### 提取流水线与批处理 ✅
//!
//! 单 patient 编排 (解析 -> 对齐 -> 加窗 -> 裁剪/光栅化 -> 写出)
//! 与顺序/并行批处理前端, 统计摘要.
//!
//! 实现位于 `voi-berry/src/pipeline`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private
//! API 提供文档.

/// 二维像素索引, 按 (高, 宽) 组织.
pub type Idx2d = (usize, usize);

/// 三维体素索引, 按 (z, 高, 宽) 组织.
pub type Idx3d = (usize, usize, usize);

/// 平面浮点坐标, 按 (x, y) 组织. 即自然图像的 (水平, 垂直) 方向.
pub type Coord2d = (f64, f64);

/// 已解码 3D CT 扫描与切片视图的基础数据结构.
mod data;

pub use data::{CtVolume, CtWindow, MaskSlice, ScanSlice, VolumeMeta};

pub mod align;
pub mod consts;
pub mod mask;
pub mod pipeline;
pub mod prelude;
pub mod roi;
pub mod voi;
