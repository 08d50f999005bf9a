//! Barcode numbering and rendering.
//!
//! Products without a usable barcode get a deterministic 12-digit number
//! derived from their id. Rendering to an image goes through the
//! [`BarcodeRenderer`] trait so the catalog never depends on a concrete
//! imaging library; the bundled implementation emits EAN-13 as SVG.

use anyhow::{Result, bail};
use uuid::Uuid;

pub const BARCODE_DIGITS: usize = 12;

/// A barcode is acceptable as supplied only when it is all-numeric.
pub fn is_numeric_barcode(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

/// Deterministic fallback barcode for a product: 12 decimal digits,
/// zero-padded, derived from the product id.
pub fn fallback_barcode(product_id: Uuid) -> String {
    let n = product_id.as_u128() % 10u128.pow(BARCODE_DIGITS as u32);
    format!("{n:0width$}", width = BARCODE_DIGITS)
}

/// EAN-13 check digit over the first 12 digits.
pub fn ean13_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d as u32 } else { d as u32 * 3 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

pub trait BarcodeRenderer: Send + Sync {
    /// Render a numeric code into image bytes. The file extension the
    /// bytes should be stored under is reported by `extension`.
    fn render(&self, code: &str) -> Result<Vec<u8>>;
    fn extension(&self) -> &'static str;
}

/// EAN-13 renderer producing a plain SVG.
pub struct SvgBarcodeRenderer;

// 7-module left-hand (odd parity) encodings for digits 0-9. The right-hand
// set is the bitwise complement, the even-parity left set is the right-hand
// set reversed.
const L_CODES: [u8; 10] = [
    0b0001101, 0b0011001, 0b0010011, 0b0111101, 0b0100011, 0b0110001, 0b0101111, 0b0111011,
    0b0110111, 0b0001011,
];

// Parity layout of the six left-hand digits, selected by the leading digit.
// false = odd (L), true = even (G).
const PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

fn push_bits(out: &mut Vec<bool>, pattern: u8, width: usize) {
    for i in (0..width).rev() {
        out.push(pattern >> i & 1 == 1);
    }
}

/// Expand 13 digits into the 95-module bar pattern.
fn ean13_modules(digits: &[u8; 13]) -> Vec<bool> {
    let mut bars = Vec::with_capacity(95);
    push_bits(&mut bars, 0b101, 3);
    let parity = &PARITY[digits[0] as usize];
    for (i, &d) in digits[1..7].iter().enumerate() {
        let l = L_CODES[d as usize];
        if parity[i] {
            // even parity: right-hand code reversed
            let r = !l & 0b111_1111;
            push_bits(&mut bars, r.reverse_bits() >> 1, 7);
        } else {
            push_bits(&mut bars, l, 7);
        }
    }
    push_bits(&mut bars, 0b01010, 5);
    for &d in &digits[7..13] {
        push_bits(&mut bars, !L_CODES[d as usize] & 0b111_1111, 7);
    }
    push_bits(&mut bars, 0b101, 3);
    bars
}

impl SvgBarcodeRenderer {
    fn digits_with_check(code: &str) -> Result<[u8; 13]> {
        if !is_numeric_barcode(code) {
            bail!("barcode must be numeric, got {code:?}");
        }
        if code.len() < BARCODE_DIGITS {
            bail!(
                "barcode must have at least {BARCODE_DIGITS} digits, got {}",
                code.len()
            );
        }
        let mut digits = [0u8; 13];
        for (i, b) in code.bytes().take(12).enumerate() {
            digits[i] = b - b'0';
        }
        digits[12] = ean13_check_digit(&digits[..12]);
        Ok(digits)
    }
}

impl BarcodeRenderer for SvgBarcodeRenderer {
    fn render(&self, code: &str) -> Result<Vec<u8>> {
        const MODULE: usize = 2;
        const QUIET: usize = 10;
        const HEIGHT: usize = 60;

        let digits = Self::digits_with_check(code)?;
        let bars = ean13_modules(&digits);
        let width = bars.len() * MODULE + QUIET * 2;

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{h}\">\
             <rect width=\"{width}\" height=\"{h}\" fill=\"white\"/>",
            h = HEIGHT + 14
        ));
        for (i, &on) in bars.iter().enumerate() {
            if on {
                svg.push_str(&format!(
                    "<rect x=\"{x}\" y=\"0\" width=\"{MODULE}\" height=\"{HEIGHT}\" fill=\"black\"/>",
                    x = QUIET + i * MODULE
                ));
            }
        }
        let text: String = digits.iter().map(|d| (d + b'0') as char).collect();
        svg.push_str(&format!(
            "<text x=\"{x}\" y=\"{y}\" font-family=\"monospace\" font-size=\"12\" \
             text-anchor=\"middle\">{text}</text></svg>",
            x = width / 2,
            y = HEIGHT + 12
        ));
        Ok(svg.into_bytes())
    }

    fn extension(&self) -> &'static str {
        "svg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_validation() {
        assert!(is_numeric_barcode("012345678905"));
        assert!(!is_numeric_barcode(""));
        assert!(!is_numeric_barcode("12a4"));
        assert!(!is_numeric_barcode("12 34"));
    }

    #[test]
    fn fallback_is_deterministic_and_fixed_width() {
        let id = Uuid::new_v4();
        let a = fallback_barcode(id);
        let b = fallback_barcode(id);
        assert_eq!(a, b);
        assert_eq!(a.len(), BARCODE_DIGITS);
        assert!(is_numeric_barcode(&a));

        let small = Uuid::from_u128(7);
        assert_eq!(fallback_barcode(small), "000000000007");
    }

    #[test]
    fn check_digit_known_value() {
        // 4006381333931 is a published EAN-13 example.
        let digits: Vec<u8> = "400638133393".bytes().map(|b| b - b'0').collect();
        assert_eq!(ean13_check_digit(&digits), 1);
    }

    #[test]
    fn renderer_produces_svg_and_rejects_bad_input() {
        let r = SvgBarcodeRenderer;
        let bytes = r.render("400638133393").unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("4006381333931"));

        assert!(r.render("not-numeric").is_err());
        assert!(r.render("123").is_err());
    }

    #[test]
    fn module_count_is_95() {
        let digits = SvgBarcodeRenderer::digits_with_check("400638133393").unwrap();
        assert_eq!(ean13_modules(&digits).len(), 95);
    }
}
