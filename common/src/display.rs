//! Two rows of three 7-segment positions.
//!
//! Glyphs are kept as characters; turning them into segment patterns is the
//! display driver's job.

use serde::Serialize;

use crate::store::NO_OF_PROFILES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Glyph {
    pub symbol: char,
    pub dot: bool,
}

impl Glyph {
    pub const BLANK: Glyph = Glyph {
        symbol: ' ',
        dot: false,
    };
    pub const MINUS: Glyph = Glyph {
        symbol: '-',
        dot: false,
    };

    pub const fn new(symbol: char) -> Self {
        Self { symbol, dot: false }
    }

    fn digit(value: i32) -> Self {
        Self::new(char::from_digit((value & 0x0f) as u32, 16).unwrap_or(' '))
    }

    pub fn is_blank(&self) -> bool {
        self.symbol == ' ' && !self.dot
    }
}

pub type Row = [Glyph; 3];

pub const BLANK_ROW: Row = [Glyph::BLANK; 3];

pub fn text_row(text: &str) -> Row {
    let mut row = BLANK_ROW;
    for (slot, symbol) in row.iter_mut().zip(text.chars()) {
        *slot = Glyph::new(symbol);
    }
    row
}

/// Renders `value` into a row. With `temperature` set the value is in tenths and
/// gets a decimal point, unless it needs all three digits for the integer part.
pub fn value_row(value: i16, temperature: bool) -> Row {
    let mut decimal = temperature;
    let mut val = value as i32;
    if val < 0 {
        val = -val;
        if val >= 100 {
            val /= 10;
            decimal = false;
        }
    } else if val >= 1000 {
        val /= 10;
        decimal = false;
    }
    let magnitude = val;

    let mut row = BLANK_ROW;
    let fill = |digit: i32, rest: &mut i32, leading_zero: bool| {
        if *rest >= digit {
            let glyph = Glyph::digit(*rest / digit);
            *rest %= digit;
            glyph
        } else if leading_zero {
            Glyph::new('0')
        } else {
            Glyph::BLANK
        }
    };
    row[0] = fill(100, &mut val, false);
    row[1] = fill(10, &mut val, !row[0].is_blank());
    row[2] = fill(1, &mut val, true);

    if decimal {
        if row[1].is_blank() {
            row[1] = Glyph::new('0');
        }
        row[1].dot = true;
    }

    if value < 0 {
        if magnitude < 10 && !decimal {
            row[1] = Glyph::MINUS;
        } else if magnitude < 100 {
            row[0] = Glyph::MINUS;
        }
    }
    row
}

/// `Pr0`..`Pr5` for profiles; thermostat mode reads `th`, or `Pid` when the PID loop runs.
pub fn run_mode_row(run_mode: i16, pid_enabled: bool) -> Row {
    if (0..NO_OF_PROFILES as i16).contains(&run_mode) {
        let mut row = text_row("Pr");
        row[2] = Glyph::digit(run_mode as i32);
        row
    } else if pid_enabled {
        text_row("Pid")
    } else {
        text_row("th")
    }
}

pub const VERSION: &str = concat!(
    "tempctl V",
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR")
);

/// Major digit with a dot followed by a two-digit minor version.
pub fn version_row() -> Row {
    let major: i32 = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor: i32 = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    let mut row = [
        Glyph::digit(major % 10),
        Glyph::digit((minor / 10) % 10),
        Glyph::digit(minor % 10),
    ];
    row[0].dot = true;
    row
}

pub fn render_row(row: &Row) -> String {
    let mut text = String::with_capacity(6);
    for glyph in row {
        text.push(glyph.symbol);
        if glyph.dot {
            text.push('.');
        }
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Display {
    pub top: Row,
    pub bottom: Row,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            top: BLANK_ROW,
            bottom: BLANK_ROW,
        }
    }
}

impl Display {
    pub fn set_top_text(&mut self, text: &str) {
        self.top = text_row(text);
    }

    pub fn set_bottom_text(&mut self, text: &str) {
        self.bottom = text_row(text);
    }

    pub fn set_top_value(&mut self, value: i16, temperature: bool) {
        self.top = value_row(value, temperature);
    }

    pub fn set_bottom_value(&mut self, value: i16, temperature: bool) {
        self.bottom = value_row(value, temperature);
    }

    pub fn show_off(&mut self) {
        self.top = text_row("OFF");
        self.bottom = BLANK_ROW;
    }

    pub fn top_text(&self) -> String {
        render_row(&self.top)
    }

    pub fn bottom_text(&self) -> String {
        render_row(&self.bottom)
    }
}
