//! QR image collaborators
//!
//! The pipeline hands a payload string and an error-correction level to a
//! `QrEncode` implementation and reads strings back from a `QrDecode`
//! implementation. `ModuleEncoder` covers the encode side with the `qrcode`
//! crate; scanning images is left to the host.

use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use qrseal_codec::capacity;
use qrseal_core::{ErrorCorrectionLevel, QrSealError, QrSealResult, SealedQrPayload};

/// Quiet-zone border in modules
pub const QUIET_ZONE: usize = 4;

pub trait QrEncode {
    type Image;

    fn encode(&self, text: &str, level: ErrorCorrectionLevel) -> QrSealResult<Self::Image>;

    /// Encode a sealed payload at the level it was sized for.
    fn encode_sealed(&self, sealed: &SealedQrPayload) -> QrSealResult<Self::Image> {
        self.encode(&sealed.payload, sealed.error_correction)
    }
}

pub trait QrDecode {
    type Image: ?Sized;

    fn decode(&self, image: &Self::Image) -> QrSealResult<String>;
}

/// Square grid of dark/light modules, without quiet zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
    level: ErrorCorrectionLevel,
}

impl QrMatrix {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn level(&self) -> ErrorCorrectionLevel {
        self.level
    }

    /// Out-of-range coordinates read as light (quiet zone).
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Two module rows per text line using half-block characters, dark
    /// modules drawn as filled cells.
    pub fn to_text(&self) -> String {
        let size = self.width + 2 * QUIET_ZONE;
        let cell = |x: usize, y: usize| {
            x >= QUIET_ZONE
                && y >= QUIET_ZONE
                && self.is_dark(x - QUIET_ZONE, y - QUIET_ZONE)
        };

        let mut out = String::with_capacity((size + 1) * size.div_ceil(2) * 3);
        for y in (0..size).step_by(2) {
            for x in 0..size {
                let ch = match (cell(x, y), cell(x, y + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }

    /// Standalone SVG document, `module_px` pixels per module.
    pub fn to_svg(&self, module_px: u32) -> String {
        let px = module_px.max(1) as usize;
        let size = (self.width + 2 * QUIET_ZONE) * px;

        let mut path = String::new();
        for y in 0..self.width {
            for x in 0..self.width {
                if self.is_dark(x, y) {
                    path.push_str(&format!(
                        "M{},{}h{px}v{px}h-{px}z",
                        (x + QUIET_ZONE) * px,
                        (y + QUIET_ZONE) * px
                    ));
                }
            }
        }

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" "#,
                r#"width="{size}" height="{size}" viewBox="0 0 {size} {size}" shape-rendering="crispEdges">"#,
                r##"<rect width="100%" height="100%" fill="#ffffff"/>"##,
                r##"<path fill="#000000" d="{path}"/>"##,
                "</svg>"
            ),
            size = size,
            path = path
        )
    }
}

/// `qrcode`-backed encoder producing a `QrMatrix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleEncoder;

impl QrEncode for ModuleEncoder {
    type Image = QrMatrix;

    fn encode(&self, text: &str, level: ErrorCorrectionLevel) -> QrSealResult<QrMatrix> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), ec_level(level))
            .map_err(|e| match e {
                QrError::DataTooLong => {
                    let limit = capacity(level);
                    QrSealError::CapacityExceeded {
                        size: text.len(),
                        limit,
                        overage: text.len().saturating_sub(limit),
                    }
                }
                _ => QrSealError::Validation("text cannot be encoded as a QR code".into()),
            })?;

        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        tracing::debug!(width = code.width(), level = %level, "rendered QR matrix");

        Ok(QrMatrix {
            width: code.width(),
            dark,
            level,
        })
    }
}

fn ec_level(level: ErrorCorrectionLevel) -> EcLevel {
    match level {
        ErrorCorrectionLevel::L => EcLevel::L,
        ErrorCorrectionLevel::M => EcLevel::M,
        ErrorCorrectionLevel::Q => EcLevel::Q,
        ErrorCorrectionLevel::H => EcLevel::H,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrseal_codec::capacity::CAPACITY_H;

    #[test]
    fn test_matrix_dimensions() {
        let matrix = ModuleEncoder.encode("hello", ErrorCorrectionLevel::M).unwrap();
        // version 1 symbol
        assert_eq!(matrix.width(), 21);
        assert_eq!(matrix.level(), ErrorCorrectionLevel::M);
        // finder pattern corner is always dark
        assert!(matrix.is_dark(0, 0));
        assert!(!matrix.is_dark(21, 0));
    }

    #[test]
    fn test_text_rendering_shape() {
        let matrix = ModuleEncoder.encode("hello", ErrorCorrectionLevel::L).unwrap();
        let text = matrix.to_text();
        let size = matrix.width() + 2 * QUIET_ZONE;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), size.div_ceil(2));
        assert!(lines.iter().all(|l| l.chars().count() == size));
        assert!(lines[0].trim().is_empty(), "top quiet zone is blank");
    }

    #[test]
    fn test_svg_rendering() {
        let matrix = ModuleEncoder.encode("hello", ErrorCorrectionLevel::H).unwrap();
        let svg = matrix.to_svg(4);
        let size = (matrix.width() + 2 * QUIET_ZONE) * 4;
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(&format!(r#"width="{size}""#)));
        assert!(svg.contains("M16,16h4v4h-4z"), "first finder module is drawn");
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_capacity_table_is_conservative() {
        // Byte-mode payloads at the table's ceiling must encode.
        let text = "a".repeat(CAPACITY_H);
        ModuleEncoder.encode(&text, ErrorCorrectionLevel::H).unwrap();
    }

    #[test]
    fn test_too_long_maps_to_capacity_error() {
        let text = "{".repeat(4000);
        let err = ModuleEncoder.encode(&text, ErrorCorrectionLevel::L).unwrap_err();
        assert!(matches!(err, QrSealError::CapacityExceeded { size: 4000, .. }));
    }
}
