//! 提取工具依赖的通用组件.

use voi_berry::consts::{DEFAULT_WL, DEFAULT_WW};
use voi_berry::CtWindow;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 创建骨窗提取的默认 CT 窗口: 窗位 300, 半窗宽 1000.
#[inline]
pub fn bone_window() -> CtWindow {
    CtWindow::new(DEFAULT_WL, DEFAULT_WW).unwrap()
}
