use crate::{TermError, TermResult};

pub(crate) struct TerminalEmulator {
    parser: vt100::Parser,
    cols: u16,
}

impl std::fmt::Debug for TerminalEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalEmulator")
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}

impl TerminalEmulator {
    pub(crate) fn new(cols: u16, rows: u16) -> TermResult<Self> {
        if cols == 0 || rows == 0 {
            return Err(TermError::Configuration(
                "terminal emulator requires non-zero rows and columns".to_owned(),
            ));
        }

        Ok(Self {
            parser: vt100::Parser::new(rows, cols, 0),
            cols,
        })
    }

    pub(crate) fn process(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.parser.process(bytes);
    }

    /// Render the grid row by row, each row right-padded with spaces to the
    /// terminal width, rows joined by newlines.
    pub(crate) fn contents(&self) -> String {
        let screen = self.parser.screen();
        let width = usize::from(self.cols);
        let mut out = String::with_capacity((width + 1) * usize::from(screen.size().0));
        for (i, row) in screen.rows(0, self.cols).enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&row);
            for _ in row.chars().count()..width {
                out.push(' ');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trimmed_line(contents: &str, row: usize) -> String {
        contents
            .lines()
            .nth(row)
            .map_or_else(String::new, |line| line.trim_end().to_owned())
    }

    #[test]
    fn renders_cursor_movement_and_overwrite() {
        let mut emulator = TerminalEmulator::new(20, 4).expect("create emulator");
        emulator.process(b"hello\x1b[2DXY");

        let contents = emulator.contents();
        assert_eq!(trimmed_line(&contents, 0), "helXY");
    }

    #[test]
    fn renders_clear_line_sequences() {
        let mut emulator = TerminalEmulator::new(20, 4).expect("create emulator");
        emulator.process(b"abc\r\x1b[2Kz");

        assert_eq!(trimmed_line(&emulator.contents(), 0), "z");
    }

    #[test]
    fn pads_every_row_to_the_terminal_width() {
        let mut emulator = TerminalEmulator::new(10, 3).expect("create emulator");
        emulator.process(b"ab");

        let contents = emulator.contents();
        let lines: Vec<&str> = contents.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.chars().count() == 10));
        assert_eq!(lines[0], "ab        ");
    }

    #[test]
    fn rejects_zero_dimensions() {
        let error = TerminalEmulator::new(0, 4).expect_err("zero columns should fail");
        assert!(matches!(error, TermError::Configuration(_)));
    }
}
