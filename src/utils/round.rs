const KILO: f64 = 1e3;
const MEGA: f64 = 1e6;
const GIGA: f64 = 1e9;
const TERA: f64 = 1e12;

/// Scale two values by the unit of the larger one and round both to one
/// decimal place. Used for "supply / max supply" style cells where both
/// numbers must share a unit.
pub fn round_values(a: f64, b: f64) -> ([f64; 2], &'static str) {
    let n = a.abs().max(b.abs());
    let (div, unit) = if n < KILO {
        (1.0, "")
    } else if n < MEGA {
        (KILO, "K")
    } else if n < GIGA {
        (MEGA, "M")
    } else if n < TERA {
        (GIGA, "B")
    } else {
        (TERA, "T")
    };
    ([round1(a / div), round1(b / div)], unit)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
