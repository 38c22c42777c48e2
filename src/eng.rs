//! Engineering notation: scale a value so its exponent is a multiple of
//! three and pick the matching SI prefix.

const PREFIXES: [&str; 5] = ["", "k", "M", "G", "T"];
const SUB_PREFIXES: [&str; 6] = ["", "m", "µ", "n", "p", "f"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eng {
    /// `value * multiplier`
    pub value: f64,
    pub prefix: &'static str,
    pub multiplier: f64,
}

/// Decimal exponent of the leading significant digit, taken from the
/// shortest round-tripping scientific representation. Zero and non-finite
/// values have exponent 0.
fn exponent(value: f64) -> i32 {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let repr = format!("{:e}", value.abs());
    repr.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

/// Engineering group and multiplier for a magnitude.
///
/// Groups beyond the prefix table (above tera, below femto) are clamped to
/// the outermost prefix.
fn group(value: f64) -> (i32, f64) {
    let eng = exponent(value)
        .div_euclid(3)
        .clamp(1 - SUB_PREFIXES.len() as i32, PREFIXES.len() as i32 - 1);
    let multiplier = if eng >= 0 {
        1.0 / 10f64.powi(3 * eng)
    } else {
        10f64.powi(-3 * eng)
    };
    (eng, multiplier)
}

fn prefix(eng: i32) -> &'static str {
    if eng >= 0 {
        PREFIXES[eng as usize]
    } else {
        SUB_PREFIXES[eng.unsigned_abs() as usize]
    }
}

pub fn to_eng(value: f64) -> Eng {
    let (eng, multiplier) = group(value);
    Eng {
        value: value * multiplier,
        prefix: prefix(eng),
        multiplier,
    }
}

/// Scale a whole column with the multiplier of its largest magnitude.
/// Returns the [`Eng`] of that magnitude; an empty column is left as is.
pub fn scale_series(values: &mut [f64]) -> Eng {
    let largest = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    let eng = to_eng(largest);
    for v in values.iter_mut() {
        *v *= eng.multiplier;
    }
    eng
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_values() {
        assert_eq!(to_eng(10.0), Eng { value: 10.0, prefix: "", multiplier: 1.0 });
        assert_eq!(to_eng(100.0), Eng { value: 100.0, prefix: "", multiplier: 1.0 });
        assert_eq!(to_eng(1000.0), Eng { value: 1.0, prefix: "k", multiplier: 0.001 });
        assert_eq!(to_eng(0.010), Eng { value: 10.0, prefix: "m", multiplier: 1000.0 });
        assert_eq!(
            to_eng(0.0001),
            Eng { value: 100.0, prefix: "µ", multiplier: 1_000_000.0 }
        );
    }

    #[test]
    fn exponent_boundaries() {
        assert_eq!(to_eng(999.0).prefix, "");
        assert_eq!(to_eng(1.0).prefix, "");
        assert_eq!(to_eng(0.999).prefix, "m");
        assert_eq!(to_eng(4.7e-9).prefix, "n");
        assert_eq!(to_eng(2.2e-12).prefix, "p");
        assert_eq!(to_eng(1.5e6).prefix, "M");
        assert_eq!(to_eng(3.3e9).prefix, "G");
    }

    #[test]
    fn sign_is_kept() {
        let eng = to_eng(-0.0047);
        assert_eq!(eng.prefix, "m");
        assert!((eng.value + 4.7).abs() < 1e-12);
    }

    #[test]
    fn zero_and_non_finite_are_unscaled() {
        assert_eq!(to_eng(0.0), Eng { value: 0.0, prefix: "", multiplier: 1.0 });
        assert_eq!(to_eng(f64::INFINITY).multiplier, 1.0);
        assert_eq!(to_eng(f64::NAN).prefix, "");
    }

    #[test]
    fn out_of_table_is_clamped() {
        assert_eq!(to_eng(1e18).prefix, "T");
        assert_eq!(to_eng(1e-20).prefix, "f");
        assert_eq!(to_eng(1e-20).multiplier, 1e15);
    }

    #[test]
    fn series_share_one_multiplier() {
        let mut column = [1.0e-9, 4.7e-9, -22.0e-9];
        let eng = scale_series(&mut column);
        assert_eq!(eng.prefix, "n");
        assert_eq!(eng.multiplier, 1e9);
        assert!((column[0] - 1.0).abs() < 1e-9);
        assert!((column[1] - 4.7).abs() < 1e-9);
        assert!((column[2] + 22.0).abs() < 1e-9);

        let mut empty: [f64; 0] = [];
        assert_eq!(scale_series(&mut empty).multiplier, 1.0);
    }
}
