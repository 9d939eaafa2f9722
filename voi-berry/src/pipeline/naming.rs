//! 输出文件的确定性命名.
//!
//! 基础词干为 `{patient}_{标注文件词干}_{切片索引}`; 同一切片的第二个
//! 及以后的轮廓追加 `-{序号}`; 有类别标签时追加 `_{标签}`;
//! 掩膜文件在扩展名前追加 `_mask`.

use super::OutputFormat;
use std::fmt::Write;

/// 构造一个 (切片, 轮廓) 输出的基础词干.
pub fn output_stem(
    patient: &str,
    voi_stem: &str,
    z: usize,
    ordinal: usize,
    label: Option<u8>,
) -> String {
    let mut stem = format!("{patient}_{voi_stem}_{z}");
    if ordinal > 0 {
        // infallible.
        write!(stem, "-{ordinal}").unwrap();
    }
    if let Some(label) = label {
        write!(stem, "_{label}").unwrap();
    }
    stem
}

/// 构造 patch 输出文件名.
#[inline]
pub fn patch_file_name(stem: &str, format: OutputFormat) -> String {
    format!("{stem}.{}", format.ext())
}

/// 构造掩膜输出文件名. 掩膜总是 PNG.
#[inline]
pub fn mask_file_name(stem: &str) -> String {
    format!("{stem}_mask.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem("p3", "lesion", 12, 0, None), "p3_lesion_12");
        assert_eq!(output_stem("p3", "lesion", 12, 0, Some(1)), "p3_lesion_12_1");
        assert_eq!(output_stem("p3", "lesion", 12, 2, Some(0)), "p3_lesion_12-2_0");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(patch_file_name("s", OutputFormat::Png), "s.png");
        assert_eq!(patch_file_name("s", OutputFormat::Jpeg), "s.jpg");
        assert_eq!(patch_file_name("s", OutputFormat::Npy), "s.npy");
        assert_eq!(mask_file_name("s"), "s_mask.png");
    }
}
