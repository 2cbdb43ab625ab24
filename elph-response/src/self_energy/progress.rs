use elph_mesher::MeshOffset;
use num_complex::Complex;

/// The line printed once by each worker before it starts on its block of the path
pub(crate) fn header() -> String {
    format!("Pi({:>3}, {:>3}, {:>3}) = ...", "q1", "q2", "nu")
}

/// One line per evaluated path point and branch, `Pi( q1,  q2,  nu) = re+imi`
pub(crate) fn line(offset: MeshOffset, branch: usize, value: Complex<f64>) -> String {
    format!(
        "Pi({:3}, {:3}, {:3}) = {}{}i",
        offset.i1,
        offset.i2,
        branch,
        format_exponential(value.re, 9, false),
        format_exponential(value.im, 9, true),
    )
}

/// Scientific notation with two decimals and a signed, two digit exponent, right aligned
/// to `width`
///
/// Rust writes `1.5e3` where the progress lines need `1.50e+03`.
pub(crate) fn format_exponential(value: f64, width: usize, explicit_sign: bool) -> String {
    let sign = if explicit_sign && !value.is_sign_negative() {
        "+"
    } else {
        ""
    };

    let body = if value.is_finite() {
        let formatted = format!("{value:.2e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (exponent_sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{mantissa}e{exponent_sign}{digits:0>2}")
            }
            None => formatted,
        }
    } else if value.is_nan() {
        "nan".into()
    } else if value > 0_f64 {
        "inf".into()
    } else {
        "-inf".into()
    };

    format!("{:>width$}", format!("{sign}{body}"))
}
