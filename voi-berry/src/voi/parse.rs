//! VOI 标注文本的两种结构变体解析器.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use super::{Contour, VoiAnnotations};

/// 切片标记行的特征子串.
const SLICE_MARKER: &str = "slice number";

/// 点数 header 行的特征子串. 只有定列偏移变体拥有该行.
const POINT_COUNT_MARKER: &str = "number of pts in contour";

/// 切片标记行到首个坐标行的固定偏移: 标记行之后隔 2 行
/// (轮廓数行、点数 header 行) 才是首个坐标行.
const FIRST_COORD_OFFSET: usize = 3;

/// VOI 标注文件的结构变体.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VoiFormat {
    /// 逐行扫描变体: 含小数点的行即坐标行, 切片标记行划分归属.
    DelimiterScan,

    /// 定列偏移变体: 显式点数 header 决定每个轮廓的坐标行范围.
    TabularOffset,
}

impl VoiFormat {
    /// 从文本内容嗅探结构变体.
    ///
    /// 判据是显式点数 header 行的有无: 拥有该行的文件按定列偏移
    /// 变体解析, 否则按逐行扫描变体解析.
    pub fn sniff(text: &str) -> VoiFormat {
        if text.contains(POINT_COUNT_MARKER) {
            VoiFormat::TabularOffset
        } else {
            VoiFormat::DelimiterScan
        }
    }
}

/// VOI 标注文件的结构错误. 任何该类错误都会丢弃整个文件的解析结果,
/// 不保留部分切片 (fail-fast).
///
/// 行号从 1 开始计数.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedVoi {
    /// 坐标行出现在任何切片标记之前.
    CoordinateBeforeMarker {
        /// 坐标行行号.
        line: usize,
    },

    /// 切片标记行的前导 token 不是非负整数.
    BadSliceNumber {
        /// 标记行行号.
        line: usize,
    },

    /// 坐标行无法按顺序解析出两个浮点数.
    BadCoordinate {
        /// 坐标行行号.
        line: usize,
    },

    /// 点数 header 行的前导 token 不是非负整数.
    BadPointCount {
        /// header 行行号.
        line: usize,
    },

    /// 切片标记行与点数 header 行的个数不一致.
    MismatchedHeaders {
        /// 切片标记行个数.
        markers: usize,
        /// 点数 header 行个数.
        counts: usize,
    },

    /// 点数 header 声明的坐标行范围超出文件末尾.
    TruncatedContour {
        /// header 行行号.
        line: usize,
        /// 声明的点数.
        expected: usize,
    },

    /// 全文没有任何切片标记.
    NoSliceMarker,
}

impl Display for MalformedVoi {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoordinateBeforeMarker { line } => {
                write!(f, "第 {line} 行: 坐标行出现在任何切片标记之前")
            }
            Self::BadSliceNumber { line } => {
                write!(f, "第 {line} 行: 切片标记行没有整数前导 token")
            }
            Self::BadCoordinate { line } => {
                write!(f, "第 {line} 行: 坐标行无法解析出两个浮点数")
            }
            Self::BadPointCount { line } => {
                write!(f, "第 {line} 行: 点数 header 行没有整数前导 token")
            }
            Self::MismatchedHeaders { markers, counts } => {
                write!(
                    f,
                    "切片标记行 ({markers} 个) 与点数 header 行 ({counts} 个) 不成对"
                )
            }
            Self::TruncatedContour { line, expected } => {
                write!(f, "第 {line} 行: 声明的 {expected} 个坐标行超出文件末尾")
            }
            Self::NoSliceMarker => write!(f, "全文没有任何切片标记"),
        }
    }
}

impl Error for MalformedVoi {}

/// 解析 VOI 标注文本, 结构变体由 [`VoiFormat::sniff`] 自动判别.
#[inline]
pub fn parse(text: &str) -> Result<VoiAnnotations, MalformedVoi> {
    parse_with(VoiFormat::sniff(text), text)
}

/// 按指定结构变体解析 VOI 标注文本.
pub fn parse_with(format: VoiFormat, text: &str) -> Result<VoiAnnotations, MalformedVoi> {
    match format {
        VoiFormat::DelimiterScan => parse_delimiter_scan(text),
        VoiFormat::TabularOffset => parse_tabular_offset(text),
    }
}

/// 取行首 token 并解析为非负整数.
fn leading_usize(line: &str) -> Option<usize> {
    line.split_whitespace().next()?.parse().ok()
}

/// 把一个坐标行解析为 (x, y). `line_no` 仅用于报错.
fn parse_coord(line: &str, line_no: usize) -> Result<(f64, f64), MalformedVoi> {
    let mut tokens = line.split_whitespace();
    let (Some(xs), Some(ys)) = (tokens.next(), tokens.next()) else {
        return Err(MalformedVoi::BadCoordinate { line: line_no });
    };
    let bad = |_| MalformedVoi::BadCoordinate { line: line_no };
    Ok((xs.parse().map_err(bad)?, ys.parse().map_err(bad)?))
}

/// 逐行扫描变体.
///
/// 维护 "当前切片索引": 含 [`SLICE_MARKER`] 的行用其前导整数更新该索引,
/// 并把之前缓冲的轮廓封存; 含小数点的行视作坐标行, 按空白切分后取前
/// 两个 token 作为 (x, y). 没有任何坐标行的标记不产生轮廓.
fn parse_delimiter_scan(text: &str) -> Result<VoiAnnotations, MalformedVoi> {
    let mut ann = VoiAnnotations::new();
    let mut cur: Option<(usize, Contour)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.contains(SLICE_MARKER) {
            if let Some((z, contour)) = cur.take() {
                if !contour.is_empty() {
                    ann.insert(z, contour);
                }
            }
            let z = leading_usize(line).ok_or(MalformedVoi::BadSliceNumber { line: line_no })?;
            cur = Some((z, Contour::new()));
        } else if line.contains('.') {
            let point = parse_coord(line, line_no)?;
            match cur.as_mut() {
                Some((_, contour)) => contour.push(point),
                None => return Err(MalformedVoi::CoordinateBeforeMarker { line: line_no }),
            }
        }
    }

    let saw_marker = cur.is_some() || !ann.is_empty();
    if let Some((z, contour)) = cur.take() {
        if !contour.is_empty() {
            ann.insert(z, contour);
        }
    }
    if !saw_marker {
        return Err(MalformedVoi::NoSliceMarker);
    }
    Ok(ann)
}

/// 定列偏移变体.
///
/// 先收集所有切片标记行 (首个坐标行 = 标记行 + [`FIRST_COORD_OFFSET`])
/// 和所有点数 header 行 (末个坐标行 = header 行 + 点数), 再按文件内
/// 出现顺序成对读取坐标行范围.
fn parse_tabular_offset(text: &str) -> Result<VoiAnnotations, MalformedVoi> {
    let lines: Vec<&str> = text.lines().collect();

    // (行索引, 切片索引)
    let mut markers: Vec<(usize, usize)> = Vec::new();
    // (行索引, 点数)
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.contains(SLICE_MARKER) {
            let z = leading_usize(line).ok_or(MalformedVoi::BadSliceNumber { line: line_no })?;
            markers.push((idx, z));
        } else if line.contains(POINT_COUNT_MARKER) {
            let n = leading_usize(line).ok_or(MalformedVoi::BadPointCount { line: line_no })?;
            spans.push((idx, n));
        }
    }

    if markers.is_empty() {
        return Err(MalformedVoi::NoSliceMarker);
    }
    if markers.len() != spans.len() {
        return Err(MalformedVoi::MismatchedHeaders {
            markers: markers.len(),
            counts: spans.len(),
        });
    }

    let mut ann = VoiAnnotations::new();
    for (&(marker_idx, z), &(span_idx, n)) in markers.iter().zip(spans.iter()) {
        let first = marker_idx + FIRST_COORD_OFFSET;
        let last = span_idx + n;
        if last >= lines.len() {
            return Err(MalformedVoi::TruncatedContour {
                line: span_idx + 1,
                expected: n,
            });
        }
        let mut contour = Contour::with_capacity(n);
        for row in first..=last {
            contour.push(parse_coord(lines[row], row + 1)?);
        }
        if !contour.is_empty() {
            ann.insert(z, contour);
        }
    }
    Ok(ann)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 原始标注工具导出的 header 样例, 定列偏移变体.
    const TABULAR_SAMPLE: &str = "\
MIPAV VOI FILE
255\t\t# color of VOI - red component
0\t\t# color of VOI - green component
0\t\t# color of VOI - blue component
255\t\t# color of VOI - alpha component
1\t\t# number of slices for the VOI
5\t\t# slice number
1\t\t# number of contours in slice
3\t\t# number of pts in contour <Chain-element-type>1</Chain-element-type>
261.409\t309.846
261.01\t309.775
260.583\t309.564
";

    const SCAN_SAMPLE: &str = "\
12 # slice number
10.0 10.0
10.5\t20.0
20.0 20.0
14 # slice number
1.0 1.0
5.0 1.0
3.0 5.0
";

    #[test]
    fn test_sniff() {
        assert_eq!(VoiFormat::sniff(TABULAR_SAMPLE), VoiFormat::TabularOffset);
        assert_eq!(VoiFormat::sniff(SCAN_SAMPLE), VoiFormat::DelimiterScan);
    }

    #[test]
    fn test_delimiter_scan_distinct_markers() {
        let ann = parse(SCAN_SAMPLE).unwrap();
        assert_eq!(ann.len(), 2);
        assert_eq!(ann.contour_len(), 2);

        let [c12] = ann.get(12).unwrap() else {
            panic!("切片 12 应有且仅有一个轮廓")
        };
        assert_eq!(
            c12.points(),
            [(10.0, 10.0), (10.5, 20.0), (20.0, 20.0)].as_slice()
        );
        let [c14] = ann.get(14).unwrap() else {
            panic!("切片 14 应有且仅有一个轮廓")
        };
        assert_eq!(c14.len(), 3);
    }

    #[test]
    fn test_delimiter_scan_repeated_marker_appends() {
        let text = "\
3 # slice number
1.0 1.0
2.0 1.0
1.5 2.0
3 # slice number
7.0 7.0
9.0 7.0
8.0 9.0
";
        let ann = parse(text).unwrap();
        assert_eq!(ann.len(), 1);
        assert_eq!(ann.contour_len(), 2);
        let pair = ann.get(3).unwrap();
        assert_eq!(pair[0].points()[0], (1.0, 1.0));
        assert_eq!(pair[1].points()[0], (7.0, 7.0));
    }

    #[test]
    fn test_delimiter_scan_coordinate_before_marker() {
        let text = "3.5 2.5\n1 # slice number\n";
        assert_eq!(
            parse(text),
            Err(MalformedVoi::CoordinateBeforeMarker { line: 1 })
        );
    }

    #[test]
    fn test_delimiter_scan_bad_coordinate() {
        let text = "1 # slice number\n12.5 abc\n";
        assert_eq!(parse(text), Err(MalformedVoi::BadCoordinate { line: 2 }));

        let lonely = "1 # slice number\n12.5\n";
        assert_eq!(parse(lonely), Err(MalformedVoi::BadCoordinate { line: 2 }));
    }

    #[test]
    fn test_delimiter_scan_bad_marker() {
        let text = "x # slice number\n1.0 2.0\n";
        assert_eq!(parse(text), Err(MalformedVoi::BadSliceNumber { line: 1 }));
    }

    #[test]
    fn test_no_marker_at_all() {
        assert_eq!(parse(""), Err(MalformedVoi::NoSliceMarker));
        assert_eq!(parse("some header\n"), Err(MalformedVoi::NoSliceMarker));
    }

    #[test]
    fn test_tabular_offset_sample() {
        let ann = parse(TABULAR_SAMPLE).unwrap();
        assert_eq!(ann.len(), 1);
        let [contour] = ann.get(5).unwrap() else {
            panic!("切片 5 应有且仅有一个轮廓")
        };
        assert_eq!(
            contour.points(),
            [(261.409, 309.846), (261.01, 309.775), (260.583, 309.564)].as_slice()
        );
    }

    #[test]
    fn test_tabular_offset_truncated() {
        let mut text = TABULAR_SAMPLE.to_owned();
        // 把点数抬高到超过实际坐标行数.
        text = text.replace("3\t\t# number of pts", "64\t\t# number of pts");
        assert_eq!(
            parse(&text),
            Err(MalformedVoi::TruncatedContour {
                line: 9,
                expected: 64
            })
        );
    }

    #[test]
    fn test_tabular_offset_mismatched_headers() {
        let text = "\
5\t\t# slice number
1\t\t# number of contours in slice
261.409\t309.846
";
        assert_eq!(
            parse_with(VoiFormat::TabularOffset, text),
            Err(MalformedVoi::MismatchedHeaders {
                markers: 1,
                counts: 0
            })
        );
    }
}
