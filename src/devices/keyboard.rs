//! # Keyboard Matrix
//!
//! The C64 keyboard is an 8x8 switch matrix wired across CIA 1's two ports:
//! the KERNAL drives columns low through port A and reads rows back on
//! port B. [`MatrixKeyboard`] is the [`PortHook`] that models this; the
//! pressed-key bitmap lives behind a cloneable [`KeyStateHandle`] so the
//! host can press and release keys while the hook is owned by the chip.
//!
//! Host scancode translation is out of scope here: hosts map their own
//! input events onto [`C64Key`] matrix positions.

use crate::devices::PortHook;
use std::cell::Cell;
use std::rc::Rc;

/// Matrix position of every key, packed as `column | row << 3`, matching
/// the wiring of the keyboard connector: the column is the port A bit the
/// KERNAL drives low, the row is the port B bit the switch pulls down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum C64Key {
    Delete = 0,
    Digit3 = 1,
    Digit5 = 2,
    Digit7 = 3,
    Digit9 = 4,
    Plus = 5,
    Pound = 6,
    Digit1 = 7,

    Return = 8,
    W = 9,
    R = 10,
    Y = 11,
    I = 12,
    P = 13,
    Asterisk = 14,
    BackArrow = 15,

    CursorRight = 16,
    A = 17,
    D = 18,
    G = 19,
    J = 20,
    L = 21,
    Semicolon = 22,
    Ctrl = 23,

    F7 = 24,
    Digit4 = 25,
    Digit6 = 26,
    Digit8 = 27,
    Digit0 = 28,
    Minus = 29,
    Home = 30,
    Digit2 = 31,

    F1 = 32,
    Z = 33,
    C = 34,
    B = 35,
    M = 36,
    Period = 37,
    RShift = 38,
    Space = 39,

    F3 = 40,
    S = 41,
    F = 42,
    H = 43,
    K = 44,
    Colon = 45,
    Equals = 46,
    Commodore = 47,

    F5 = 48,
    E = 49,
    T = 50,
    U = 51,
    O = 52,
    At = 53,
    UpArrow = 54,
    Q = 55,

    CursorDown = 56,
    LShift = 57,
    X = 58,
    V = 59,
    N = 60,
    Comma = 61,
    Slash = 62,
    Stop = 63,
}

impl C64Key {
    #[inline]
    fn column(self) -> usize {
        (self as u8 & 7) as usize
    }

    #[inline]
    fn row_bit(self) -> u8 {
        1 << ((self as u8 >> 3) & 7)
    }
}

/// Shared handle onto the pressed-key bitmap: one byte of row bits per
/// column. The host keeps a clone and feeds key transitions in; the hook
/// inside CIA 1 reads it during port scans.
#[derive(Debug, Clone, Default)]
pub struct KeyStateHandle(Rc<Cell<[u8; 8]>>);

impl KeyStateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&self, key: C64Key) {
        let mut keys = self.0.get();
        keys[key.column()] |= key.row_bit();
        self.0.set(keys);
    }

    pub fn key_up(&self, key: C64Key) {
        let mut keys = self.0.get();
        keys[key.column()] &= !key.row_bit();
        self.0.set(keys);
    }

    /// Release every key.
    pub fn clear(&self) {
        self.0.set([0; 8]);
    }

    fn pressed(&self) -> [u8; 8] {
        self.0.get()
    }
}

/// The matrix scan itself, installed on CIA 1 as its port hook.
#[derive(Debug, Clone, Default)]
pub struct MatrixKeyboard {
    keys: KeyStateHandle,
}

impl MatrixKeyboard {
    pub fn new(keys: KeyStateHandle) -> Self {
        MatrixKeyboard { keys }
    }
}

impl PortHook for MatrixKeyboard {
    /// Every column driven low through port A pulls the rows of its pressed
    /// keys low on port B. The matrix assumes diode isolation, so columns
    /// combine independently; only port B bits configured as inputs are
    /// overridden.
    fn update_port(&mut self, pra: &mut u8, prb: &mut u8, ddra: u8, ddrb: u8) {
        let driven = *pra | !ddra;
        let pressed = self.keys.pressed();
        let mut rows = 0xFFu8;
        for (column, &keys) in pressed.iter().enumerate() {
            if driven & (1 << column) == 0 {
                rows &= !keys;
            }
        }
        *prb = (*prb & ddrb) | (rows & !ddrb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(keyboard: &mut MatrixKeyboard, pra: u8, ddra: u8) -> u8 {
        let mut pra = pra;
        let mut prb = 0xFF;
        keyboard.update_port(&mut pra, &mut prb, ddra, 0x00);
        prb
    }

    #[test]
    fn undriven_matrix_reads_all_high() {
        let keys = KeyStateHandle::new();
        keys.key_down(C64Key::A);
        let mut keyboard = MatrixKeyboard::new(keys);
        assert_eq!(scan(&mut keyboard, 0xFF, 0xFF), 0xFF);
    }

    #[test]
    fn pressed_key_pulls_its_row_low() {
        let keys = KeyStateHandle::new();
        // A sits at column 1, row 2.
        keys.key_down(C64Key::A);
        let mut keyboard = MatrixKeyboard::new(keys.clone());

        assert_eq!(scan(&mut keyboard, !0x02, 0xFF), 0xFF & !0x04);
        // Driving a different column sees nothing.
        assert_eq!(scan(&mut keyboard, !0x01, 0xFF), 0xFF);

        keys.key_up(C64Key::A);
        assert_eq!(scan(&mut keyboard, !0x02, 0xFF), 0xFF);
    }

    #[test]
    fn multiple_columns_combine() {
        let keys = KeyStateHandle::new();
        keys.key_down(C64Key::Delete); // column 0, row 0
        keys.key_down(C64Key::Return); // column 0, row 1
        keys.key_down(C64Key::Stop); // column 7, row 7
        let mut keyboard = MatrixKeyboard::new(keys);

        // All columns driven low: every pressed row shows.
        assert_eq!(scan(&mut keyboard, 0x00, 0xFF), 0xFF & !(0x01 | 0x02 | 0x80));
    }

    #[test]
    fn port_a_input_bits_count_as_undriven() {
        let keys = KeyStateHandle::new();
        keys.key_down(C64Key::Delete);
        let mut keyboard = MatrixKeyboard::new(keys);
        // Column 0 written low but configured as input: floats high.
        assert_eq!(scan(&mut keyboard, 0x00, 0x00), 0xFF);
    }

    #[test]
    fn output_bits_of_port_b_are_untouched() {
        let keys = KeyStateHandle::new();
        keys.key_down(C64Key::Delete);
        let mut keyboard = MatrixKeyboard::new(keys);
        let mut pra = 0x00;
        let mut prb = 0xAA;
        keyboard.update_port(&mut pra, &mut prb, 0xFF, 0x0F);
        // Low nibble is output and kept; high nibble comes from the matrix.
        assert_eq!(prb & 0x0F, 0x0A);
        assert_eq!(prb & 0xF0, 0xF0);
    }
}
