//! Seat numbering rules.
//!
//! Seat numbers follow the `<row><letter>` convention (`12A`). Letters are
//! handed out left to right across the carriage, so a `2+2` carriage uses
//! `A B | C D` and a `2+3` carriage uses `A B | C D E`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

static PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\+(\d+)$").expect("valid seat pattern regex"));
static SEAT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([A-Z])$").expect("valid seat number regex"));

const MAX_SEATS_PER_ROW: u32 = 26;

/// Seats left and right of the aisle, written `L+R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPattern {
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidSeatPattern;

impl SeatPattern {
    pub const TWO_TWO: SeatPattern = SeatPattern { left: 2, right: 2 };
    pub const TWO_THREE: SeatPattern = SeatPattern { left: 2, right: 3 };
    pub const THREE_THREE: SeatPattern = SeatPattern { left: 3, right: 3 };

    pub fn seats_per_row(&self) -> u32 {
        self.left + self.right
    }

    pub fn letters(&self) -> Vec<char> {
        (0..self.seats_per_row())
            .filter_map(|i| char::from_u32('A' as u32 + i))
            .collect()
    }

    /// Guess the pattern from how many distinct trailing letters are in use.
    pub fn infer<'a, I>(seat_numbers: I) -> SeatPattern
    where
        I: IntoIterator<Item = &'a str>,
    {
        let letters: BTreeSet<char> = seat_numbers
            .into_iter()
            .filter_map(|number| number.chars().last())
            .collect();

        match letters.len() {
            0..=4 => SeatPattern::TWO_TWO,
            5 => SeatPattern::TWO_THREE,
            _ => SeatPattern::THREE_THREE,
        }
    }

    pub fn is_window(&self, position: char) -> bool {
        match position_index(position) {
            Some(index) => index == 0 || index + 1 == self.seats_per_row(),
            None => false,
        }
    }

    pub fn is_aisle(&self, position: char) -> bool {
        match position_index(position) {
            Some(index) => index + 1 == self.left || index == self.left,
            None => false,
        }
    }

    /// Seat numbers for `rows` rows starting at `start_row`, row by row.
    pub fn seat_numbers(&self, rows: u32, start_row: u32) -> Vec<String> {
        let letters = self.letters();
        (start_row..start_row + rows)
            .flat_map(|row| letters.iter().map(move |letter| format!("{}{}", row, letter)))
            .collect()
    }
}

impl FromStr for SeatPattern {
    type Err = InvalidSeatPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = PATTERN.captures(s).ok_or(InvalidSeatPattern)?;
        let left = captures[1].parse::<u32>().map_err(|_| InvalidSeatPattern)?;
        let right = captures[2].parse::<u32>().map_err(|_| InvalidSeatPattern)?;

        match left.checked_add(right) {
            Some(total) if (1..=MAX_SEATS_PER_ROW).contains(&total) => {
                Ok(SeatPattern { left, right })
            }
            _ => Err(InvalidSeatPattern),
        }
    }
}

impl fmt::Display for SeatPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.left, self.right)
    }
}

/// Split `12A` into row 12 and position `A`; other shapes read as `1A`.
pub fn parse_seat_number(seat_number: &str) -> (i32, char) {
    SEAT_NUMBER
        .captures(seat_number)
        .and_then(|captures| {
            let row = captures[1].parse::<i32>().ok()?;
            let position = captures[2].chars().next()?;
            Some((row, position))
        })
        .unwrap_or((1, 'A'))
}

fn position_index(position: char) -> Option<u32> {
    if position.is_ascii_uppercase() {
        Some(position as u32 - 'A' as u32)
    } else {
        None
    }
}
