//! Synthetic national ID numbers
//!
//! 18 characters: 6-digit region code, 8-digit birth date, 3-digit sequence
//! and a mod-11 check character.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Weights applied to the first 17 digits
pub const WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];

/// Check character indexed by `weighted_sum % 11`
pub const CHECK_CODES: [char; 11] = ['1', '0', 'X', '9', '8', '7', '6', '5', '4', '3', '2'];

const PROVINCE_CODES: &[&str] = &[
    "11", "12", "13", "14", "15", "21", "22", "23", "31", "32", "33", "34", "35", "36", "37", "41",
    "42", "43", "44", "45", "46", "50", "51", "52", "53", "54", "61", "62", "63", "64", "65",
];

const DISTRICT_CODES: &[&str] = &[
    // Beijing
    "110101", "110102", "110105", "110106", "110107", "110108", "110109", "110111",
    // Shanghai
    "310101", "310104", "310105", "310106", "310107", "310109", "310110", "310112",
    // Guangzhou
    "440103", "440104", "440105", "440106", "440111", "440112", "440113", "440114",
    // Chengdu
    "510104", "510105", "510106", "510107", "510108", "510112", "510113", "510114",
];

/// How the 6-digit region prefix is drawn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionMode {
    /// Province code plus four random digits, births 1970-2000
    Province,
    /// Known district code, births 1960-2005
    #[default]
    District,
}

impl RegionMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "province" => Some(RegionMode::Province),
            "district" => Some(RegionMode::District),
            _ => None,
        }
    }

    fn birth_years(&self) -> (i32, i32) {
        match self {
            RegionMode::Province => (1970, 2000),
            RegionMode::District => (1960, 2005),
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Check character for the first 17 digits; `None` if they are not 17 ASCII digits
pub fn check_code(base: &str) -> Option<char> {
    if base.len() != 17 || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = base
        .bytes()
        .zip(WEIGHTS)
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();

    Some(CHECK_CODES[(sum % 11) as usize])
}

/// Whether `id` is 18 characters with a correct check character
#[cfg(test)]
pub fn is_valid(id: &str) -> bool {
    if id.len() != 18 || !id.is_ascii() {
        return false;
    }
    let (base, check) = id.split_at(17);
    check_code(base).is_some_and(|expected| check.starts_with(expected))
}

/// Birth date encoded in an id, as `YYYY-MM-DD`
pub fn birth_date(id: &str) -> Option<String> {
    let digits = id.get(6..14)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Random id generator; seed it for reproducible fixtures
pub struct IdNumberGenerator<R: Rng = StdRng> {
    rng: R,
    mode: RegionMode,
}

impl IdNumberGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> IdNumberGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            mode: RegionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RegionMode) -> Self {
        self.mode = mode;
        self
    }

    fn region_code(&mut self) -> String {
        match self.mode {
            RegionMode::Province => {
                let province = PROVINCE_CODES.choose(&mut self.rng).copied().unwrap_or("11");
                format!("{province}{:04}", self.rng.random_range(0..=9999u32))
            }
            RegionMode::District => DISTRICT_CODES
                .choose(&mut self.rng)
                .copied()
                .unwrap_or("110101")
                .to_string(),
        }
    }

    /// Draw one 18-character id
    pub fn generate(&mut self) -> String {
        let region = self.region_code();

        let (first_year, last_year) = self.mode.birth_years();
        let year = self.rng.random_range(first_year..=last_year);
        let month = self.rng.random_range(1..=12u32);
        let day = self.rng.random_range(1..=days_in_month(year, month));
        let sequence = self.rng.random_range(0..=999u32);

        let base = format!("{region}{year:04}{month:02}{day:02}{sequence:03}");
        // base is always 17 ASCII digits here
        let check = check_code(&base).unwrap_or('X');

        format!("{base}{check}")
    }
}

impl<R: Rng> Iterator for IdNumberGenerator<R> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generate())
    }
}
