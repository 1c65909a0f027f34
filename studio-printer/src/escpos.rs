//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

/// ESC @ - initialize printer
pub const INIT: [u8; 2] = [0x1B, 0x40];

/// GS V 65 16 - feed 16 dots then full cut
pub const FULL_CUT: [u8; 4] = [0x1D, 0x56, 0x41, 0x10];

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
/// Text is written as UTF-8.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&INIT);
        Self { buf, width }
    }

    // === Text Output ===

    /// Write raw text
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Write `lines` empty lines
    pub fn blank_lines(&mut self, lines: usize) -> &mut Self {
        self.buf.extend(std::iter::repeat_n(b'\n', lines));
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Double width only
    pub fn double_width(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x10]);
        self
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    /// Select font A (12x24) or font B (9x17)
    pub fn font_b(&mut self, on: bool) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x4D, u8::from(on)]);
        self
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Paper Control ===

    /// Feed `dots` then full cut (GS V 65 n)
    pub fn feed_cut(&mut self, dots: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x41, dots]);
        self
    }

    // === Build ===

    /// Finish and return the byte stream
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Strip the commands this builder emits, leaving the printable text
///
/// Used for on-screen previews. Unknown escape sequences drop only the
/// escape byte itself.
pub fn to_plain_text(data: &[u8]) -> String {
    let mut text = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let skip = match (data[i], data.get(i + 1)) {
            (0x1B, Some(0x40)) => 2,
            (0x1B, Some(0x61 | 0x45 | 0x4D)) => 3,
            (0x1D, Some(0x21)) => 3,
            (0x1D, Some(0x56)) => match data.get(i + 2) {
                Some(0x41 | 0x42) => 4,
                _ => 3,
            },
            (0x1B | 0x1D, _) => 1,
            _ => {
                text.push(data[i]);
                1
            }
        };
        i += skip;
    }
    String::from_utf8_lossy(&text).into_owned()
}
