use super::round::round_values;

pub const UP_ARROW: &str = "\u{25b2}";
pub const DOWN_ARROW: &str = "\u{25bc}";

pub fn format_price(v: f64) -> String {
    if v >= 1.0 {
        add_commas(&format!("{:.2}", v))
    } else if v >= 0.01 {
        format!("{:.4}", v)
    } else if v > 0.0 {
        format!("{:.6}", v)
    } else {
        "0.00".to_string()
    }
}

pub fn format_large(v: f64) -> String {
    if v >= 1e12 {
        format!("{:.2}T", v / 1e12)
    } else if v >= 1e9 {
        format!("{:.2}B", v / 1e9)
    } else if v >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else if v >= 1e3 {
        format!("{:.2}K", v / 1e3)
    } else {
        format!("{:.2}", v)
    }
}

pub fn format_amount(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        let s = format!("{:.8}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Arrow-prefixed change cell, e.g. `▲ 3.50` or `▼ 1.20`.
pub fn change_cell(pct: f64) -> String {
    if pct < 0.0 {
        format!("{} {:.2}", DOWN_ARROW, pct.abs())
    } else {
        format!("{} {:.2}", UP_ARROW, pct)
    }
}

/// `circulating / max` sharing one magnitude unit. An unknown max shows `NA`.
pub fn supply_cell(circulating: f64, max: Option<f64>) -> String {
    match max {
        Some(m) if m > 0.0 => {
            let ([c, m], unit) = round_values(circulating, m);
            format!("{:.1}{unit} / {:.1}{unit}", c, m)
        }
        _ => {
            let ([c, _], unit) = round_values(circulating, 0.0);
            format!("{:.1}{} / NA", c, unit)
        }
    }
}

fn add_commas(s: &str) -> String {
    let (int_part, frac) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let mut out = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 && c != '-' {
            out.push(',');
        }
        out.push(c);
    }
    let int_formatted: String = out.chars().rev().collect();
    match frac {
        Some(f) => format!("{}.{}", int_formatted, f),
        None => int_formatted,
    }
}

/// Reduce a series to `target_len` points, keeping peaks and valleys.
pub fn downsample(data: &[f64], target_len: usize) -> Vec<f64> {
    if target_len == 0 || data.is_empty() {
        return vec![];
    }
    if data.len() <= target_len {
        return data.to_vec();
    }
    let mut result: Vec<f64> = Vec::with_capacity(target_len);
    let bucket = data.len() as f64 / target_len as f64;
    for i in 0..target_len {
        let start = (i as f64 * bucket) as usize;
        let end = (((i + 1) as f64 * bucket) as usize).min(data.len());
        if start >= end {
            if let Some(&last) = result.last() {
                result.push(last);
            }
            continue;
        }
        let slice = &data[start..end];
        let lo = slice.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = slice.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        match result.last() {
            // whichever extreme moved further from the previous point
            Some(&prev) if (lo - prev).abs() > (hi - prev).abs() => result.push(lo),
            Some(_) => result.push(hi),
            None => result.push(slice[slice.len() - 1]),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices() {
        assert_eq!(format_price(64250.5), "64,250.50");
        assert_eq!(format_price(0.5), "0.5000");
        assert_eq!(format_price(0.00012), "0.000120");
        assert_eq!(format_price(-3.0), "0.00");
    }

    #[test]
    fn change_arrows() {
        assert_eq!(change_cell(3.5), "\u{25b2} 3.50");
        assert_eq!(change_cell(-1.234), "\u{25bc} 1.23");
    }

    #[test]
    fn supply() {
        assert_eq!(supply_cell(19_700_000.0, Some(21_000_000.0)), "19.7M / 21.0M");
        assert_eq!(supply_cell(120_000_000.0, None), "120.0M / NA");
    }

    #[test]
    fn amounts() {
        assert_eq!(format_amount(2.0), "2");
        assert_eq!(format_amount(2.5), "2.5");
        assert_eq!(format_amount(0.00012300), "0.000123");
    }

    #[test]
    fn downsample_shrinks() {
        let data: Vec<f64> = (0..100).map(|v| v as f64).collect();
        assert_eq!(downsample(&data, 10).len(), 10);
        assert_eq!(downsample(&data[..5], 10), data[..5].to_vec());
        assert!(downsample(&data, 0).is_empty());
    }
}
