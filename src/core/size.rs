//! 文件大小格式化
//!
//! 小数部分直接截断不四舍五入，小数点用逗号。

use serde::Serialize;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

/// 格式化过程的分解，供诊断输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeBreakdown {
    pub bytes: u64,
    pub unit: &'static str,
    pub whole: u64,
    /// 截断后的小数位，该区间不显示小数时为 `None`
    pub fraction: Option<u64>,
    pub decimals: u32,
    pub display: String,
}

/// 格式化字节数，例如 `3000` -> `"2,92 KB"`
pub fn format_size(bytes: u64) -> String {
    describe_size(bytes).display
}

pub fn describe_size(bytes: u64) -> SizeBreakdown {
    if bytes < KB {
        return SizeBreakdown {
            bytes,
            unit: "Bytes",
            whole: bytes,
            fraction: None,
            decimals: 0,
            display: format!("{} Bytes", bytes),
        };
    }

    let (unit, name) = if bytes < MB {
        (KB, "KB")
    } else if bytes < GB {
        (MB, "MB")
    } else {
        (GB, "GB")
    };

    let whole = bytes / unit;
    let rem = bytes % unit;

    let (fraction, decimals, display) = if whole >= 100 {
        (None, 0, format!("{} {}", whole, name))
    } else if whole < 10 {
        let frac = truncated_fraction(rem, unit, 2);
        (Some(frac), 2, format!("{},{:02} {}", whole, frac, name))
    } else {
        let frac = truncated_fraction(rem, unit, 1);
        // 10..100 区间小数为 0 时 MB/GB 省略小数，KB 保留
        if frac == 0 && unit != KB {
            (Some(frac), 1, format!("{} {}", whole, name))
        } else {
            (Some(frac), 1, format!("{},{} {}", whole, frac, name))
        }
    };

    SizeBreakdown {
        bytes,
        unit: name,
        whole,
        fraction,
        decimals,
        display,
    }
}

/// `rem / unit` 的前 `digits` 位小数
fn truncated_fraction(rem: u64, unit: u64, digits: u32) -> u64 {
    rem * 10u64.pow(digits) / unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_band() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(1), "1 Bytes");
        assert_eq!(format_size(1023), "1023 Bytes");
    }

    #[test]
    fn test_kb_bands() {
        assert_eq!(format_size(1024), "1,00 KB");
        assert_eq!(format_size(2048), "2,00 KB");
        assert_eq!(format_size(3000), "2,92 KB");
        assert_eq!(format_size(10 * 1024 - 1), "9,99 KB");
        assert_eq!(format_size(10 * 1024), "10,0 KB");
        assert_eq!(format_size(15 * 1024 + 512), "15,5 KB");
        assert_eq!(format_size(100 * 1024), "100 KB");
        assert_eq!(format_size(1_048_575), "1023 KB");
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        // 99.999 KB 仍在一位小数区间
        assert_eq!(format_size(102_399), "99,9 KB");
        // 9.999 KB
        assert_eq!(format_size(10_239), "9,99 KB");
        // 1023.999 KB
        assert_eq!(format_size(MB - 1), "1023 KB");
    }

    #[test]
    fn test_mb_bands() {
        assert_eq!(format_size(MB), "1,00 MB");
        assert_eq!(format_size(MB + MB / 2), "1,50 MB");
        assert_eq!(format_size(10 * MB), "10 MB");
        assert_eq!(format_size(10 * MB + MB / 2), "10,5 MB");
        // 10.09 MB 截断后小数为 0，不显示
        assert_eq!(format_size(10 * MB + MB / 11), "10 MB");
        assert_eq!(format_size(100 * MB - 1), "99,9 MB");
        assert_eq!(format_size(100 * MB), "100 MB");
        assert_eq!(format_size(GB - 1), "1023 MB");
    }

    #[test]
    fn test_gb_bands() {
        assert_eq!(format_size(GB), "1,00 GB");
        assert_eq!(format_size(5 * GB + GB / 4), "5,25 GB");
        assert_eq!(format_size(42 * GB), "42 GB");
        assert_eq!(format_size(42 * GB + 7 * GB / 10 + 1), "42,7 GB");
        assert_eq!(format_size(250 * GB), "250 GB");
    }

    #[test]
    fn test_band_suffixes_cover_ranges() {
        for b in (KB..MB).step_by(997) {
            assert!(format_size(b).ends_with(" KB"), "{}", b);
        }
        for b in (MB..GB).step_by(1_048_573) {
            assert!(format_size(b).ends_with(" MB"), "{}", b);
        }
    }

    #[test]
    fn test_matches_float_truncation() {
        for b in (KB..4 * MB).step_by(4099) {
            let expected = float_reference(b);
            assert_eq!(format_size(b), expected, "{}", b);
        }
    }

    fn float_reference(bytes: u64) -> String {
        let (value, name) = if bytes < MB {
            (bytes as f64 / 1024.0, "KB")
        } else {
            (bytes as f64 / 1_048_576.0, "MB")
        };
        let whole = value.trunc();
        if value >= 100.0 {
            format!("{} {}", whole as u64, name)
        } else if value < 10.0 {
            let dec = ((value - whole) * 100.0).trunc() as u64;
            format!("{},{:02} {}", whole as u64, dec, name)
        } else {
            let dec = ((value - whole) * 10.0).trunc() as u64;
            if dec == 0 && name != "KB" {
                format!("{} {}", whole as u64, name)
            } else {
                format!("{},{} {}", whole as u64, dec, name)
            }
        }
    }

    #[test]
    fn test_breakdown() {
        let b = describe_size(3000);
        assert_eq!(b.unit, "KB");
        assert_eq!(b.whole, 2);
        assert_eq!(b.fraction, Some(92));
        assert_eq!(b.decimals, 2);
        assert_eq!(b.display, "2,92 KB");
    }
}
