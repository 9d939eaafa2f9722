use crate::consts::{DEFAULT_WL, DEFAULT_WW};

/// CT 窗. 由窗位 (window center) 和半窗宽构成钳制区间
/// `[center - half_width, center + half_width]`, 并将该区间线性映射到
/// 灰度区间 `[0, 255]`.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CtWindow {
    lower: f32,
    upper: f32,
}

impl Default for CtWindow {
    /// 默认窗: 窗位 [`DEFAULT_WL`], 半窗宽 [`DEFAULT_WW`].
    #[inline]
    fn default() -> Self {
        Self {
            lower: DEFAULT_WL - DEFAULT_WW,
            upper: DEFAULT_WL + DEFAULT_WW,
        }
    }
}

impl CtWindow {
    /// 由窗位和半窗宽构建 CT 窗.
    ///
    /// `center` 和 `half_width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(center: f32, half_width: f32) -> Option<CtWindow> {
        if (-1e5..=1e5).contains(&center) && 0.0 < half_width && half_width <= 1e5 {
            Some(Self {
                lower: center - half_width,
                upper: center + half_width,
            })
        } else {
            None
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper(&self) -> f32 {
        self.upper
    }

    /// 窗位.
    #[inline]
    pub fn center(&self) -> f32 {
        (self.lower + self.upper) / 2.0
    }

    /// 半窗宽.
    #[inline]
    pub fn half_width(&self) -> f32 {
        (self.upper - self.lower) / 2.0
    }

    /// 将 `hu` 钳制到窗区间内.
    ///
    /// 如果 `hu` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn clamp(&self, hu: f32) -> Option<f32> {
        if !hu.is_finite() {
            return None;
        }
        Some(hu.clamp(self.lower, self.upper))
    }

    /// 求在当前窗设置下, `hu` 对应的灰度分布点 (0.0 <= value <= 255.0).
    ///
    /// 如果 `hu` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval_f32(&self, hu: f32) -> Option<f32> {
        let clamped = self.clamp(hu)?;
        // 255, not 256.
        Some((clamped - self.lower) / (self.upper - self.lower) * 255.0)
    }

    /// 求在当前窗设置下, `hu` 对应的灰度整数值 (0 <= value <= 255).
    ///
    /// 如果 `hu` 无意义 (如 inf, NaN), 则返回 `None`.
    #[inline]
    pub fn eval(&self, hu: f32) -> Option<u8> {
        self.eval_f32(hu).map(|g| g as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::CtWindow;

    fn is_valid_init(center: f32, half_width: f32) -> bool {
        CtWindow::new(center, half_width).is_some()
    }

    #[test]
    fn test_ct_window_invalid_input() {
        assert!(!is_valid_init(0.0, -1.0));
        assert!(!is_valid_init(0.0, 0.0));
        assert!(!is_valid_init(f32::NAN, 100.0));
    }

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_ct_window_generic() {
        // [60, 100]
        let w = CtWindow::new(80.0, 20.0).unwrap();
        assert!(float_eq(w.lower(), 60.0));
        assert!(float_eq(w.upper(), 100.0));
        assert!(float_eq(w.center(), 80.0));
        assert!(float_eq(w.half_width(), 20.0));

        assert_eq!(w.eval(f32::NAN), None);
        assert_eq!(w.eval_f32(f32::INFINITY), None);
        assert_eq!(w.eval(f32::MIN), Some(0));
        assert_eq!(w.eval(f32::MAX), Some(255));

        assert_eq!(w.eval(60.0), Some(0));
        assert!(float_eq(w.eval_f32(60.0).unwrap(), 0.0));

        // boundary 1
        assert_eq!(w.eval(60.1), Some(0));
        assert!(w.eval_f32(60.1).unwrap() > 0.0);
        assert!(w.eval_f32(60.1).unwrap() < 1.0);
        // -- boundary 1

        assert_eq!(w.eval(70.0).unwrap(), (255.0 * 0.25) as u8);
        assert!(float_eq(w.eval_f32(70.0).unwrap(), 255.0 * 0.25));

        assert_eq!(w.eval(80.0).unwrap(), (255.0 * 0.5) as u8);
        assert_eq!(w.eval(90.0).unwrap(), (255.0 * 0.75) as u8);

        // boundary 2
        assert_eq!(w.eval(99.999), Some(254));
        assert!(w.eval_f32(99.999).unwrap() < 255.0);
        assert!(w.eval_f32(99.999).unwrap() > 254.0);
        // -- boundary 2

        assert_eq!(w.eval(100.0).unwrap(), u8::MAX);
        assert!(float_eq(w.eval_f32(100.0).unwrap(), 255.0));

        assert!(float_eq(w.clamp(1e4).unwrap(), 100.0));
        assert!(float_eq(w.clamp(-1e4).unwrap(), 60.0));
        assert!(float_eq(w.clamp(75.0).unwrap(), 75.0));
    }

    #[test]
    fn test_ct_window_default() {
        let w = CtWindow::default();
        assert!(float_eq(w.lower(), -700.0));
        assert!(float_eq(w.upper(), 1300.0));
    }
}
