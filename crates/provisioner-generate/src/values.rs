use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use provisioner_core::{Column, ColumnKind, GeneratedValue};

/// Ceiling for generated integers on non-unique columns.
pub const INT_CEILING: i64 = 10_000;
/// Longest generated string.
pub const STRING_MAX_CHARS: u32 = 12;
/// Longest generated text value, in bytes.
pub const TEXT_MAX_BYTES: u32 = 64;
/// Largest null probability accepted; nullable columns never go all-NULL.
pub const MAX_NULL_PROBABILITY: f64 = 0.99;
/// Widest date window, in days; keeps generated dates inside MySQL's
/// DATETIME range.
pub const MAX_DATETIME_WINDOW_DAYS: u32 = 36_500;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const WORDS: &[&str] = &[
    "alpha", "amber", "bravo", "cedar", "delta", "ember", "field", "grain", "harbor", "island",
    "juniper", "kettle", "lumen", "meadow", "north", "orbit", "pepper", "quartz", "river",
    "summit", "timber", "umber", "valley", "willow", "yonder", "zephyr",
];

/// Produces a single column value from its declared kind.
///
/// Primary-key, auto-increment and relation-bound columns are never passed
/// here; the record generator fills those.
#[derive(Debug, Clone)]
pub struct ValueGenerator {
    null_probability: f64,
    window: Duration,
    now: NaiveDateTime,
}

impl ValueGenerator {
    pub fn new(null_probability: f64, datetime_window_days: u32) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            null_probability: clamp_null_probability(null_probability),
            window: Duration::days(i64::from(
                datetime_window_days.min(MAX_DATETIME_WINDOW_DAYS),
            )),
            now: now.with_nanosecond(0).unwrap_or(now),
        }
    }

    /// Pin the upper end of the date window.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn null_probability(&self) -> f64 {
        self.null_probability
    }

    pub fn window_days(&self) -> i64 {
        self.window.num_days()
    }

    pub fn generate(&self, column: &Column, rng: &mut ChaCha8Rng) -> GeneratedValue {
        if column.is_nullable
            && self.null_probability > 0.0
            && rng.random_bool(self.null_probability)
        {
            return GeneratedValue::Null;
        }

        match &column.kind {
            ColumnKind::Integer { min, max } => {
                GeneratedValue::Int(integer_in_bounds(*min, *max, column.is_unique, rng))
            }
            ColumnKind::Decimal { precision, scale } => {
                GeneratedValue::Decimal(decimal_text(*precision, *scale, rng))
            }
            ColumnKind::Float => {
                let cents = rng.random_range(0..1_000_000_u32);
                GeneratedValue::Float(f64::from(cents) / 100.0)
            }
            ColumnKind::Boolean => GeneratedValue::Bool(rng.random_bool(0.5)),
            ColumnKind::String { max_len } => {
                GeneratedValue::Text(string_value(column, *max_len, rng))
            }
            ColumnKind::Text { max_len } => {
                GeneratedValue::Text(words((*max_len).min(TEXT_MAX_BYTES), rng))
            }
            ColumnKind::Date => {
                let days = rng.random_range(0..=self.window.num_days());
                let today = self.now.date();
                GeneratedValue::Date(
                    today
                        .checked_sub_signed(Duration::days(days))
                        .unwrap_or(today),
                )
            }
            ColumnKind::DateTime => {
                let seconds = rng.random_range(0..=self.window.num_seconds());
                GeneratedValue::DateTime(
                    self.now
                        .checked_sub_signed(Duration::seconds(seconds))
                        .unwrap_or(self.now),
                )
            }
            ColumnKind::Time => {
                let seconds = rng.random_range(0..86_400_u32);
                GeneratedValue::Time(
                    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or_default(),
                )
            }
            ColumnKind::Json => {
                let value = serde_json::json!({
                    "id": rng.random_range(1..=INT_CEILING),
                    "label": token(8, rng),
                    "active": rng.random_bool(0.5),
                });
                GeneratedValue::Json(value.to_string())
            }
            ColumnKind::Enum { values } if !values.is_empty() => {
                GeneratedValue::Text(values[rng.random_range(0..values.len())].clone())
            }
            ColumnKind::Enum { .. } => {
                let len = rng.random_range(1..=8);
                GeneratedValue::Text(token(len, rng))
            }
        }
    }
}

fn clamp_null_probability(probability: f64) -> f64 {
    if probability.is_nan() {
        return 0.0;
    }
    probability.clamp(0.0, MAX_NULL_PROBABILITY)
}

fn integer_in_bounds(min: i64, max: i64, unique: bool, rng: &mut ChaCha8Rng) -> i64 {
    let ceiling = if unique { i64::from(i32::MAX) } else { INT_CEILING };
    let low = min.max(1);
    let high = max.min(ceiling);
    if low <= high {
        rng.random_range(low..=high)
    } else {
        // declared range lies entirely below 1
        rng.random_range(min..=max)
    }
}

fn decimal_text(precision: u32, scale: u32, rng: &mut ChaCha8Rng) -> String {
    let int_digits = precision.saturating_sub(scale).min(4);
    let int_max = 10_u32.pow(int_digits) - 1;
    let int_part = rng.random_range(0..=int_max);
    if scale == 0 {
        return int_part.to_string();
    }
    let fraction: String = (0..scale)
        .map(|_| char::from(b'0' + rng.random_range(0..10_u8)))
        .collect();
    format!("{int_part}.{fraction}")
}

fn string_value(column: &Column, max_len: Option<u32>, rng: &mut ChaCha8Rng) -> String {
    if is_email_column(&column.name) {
        let number = if column.is_unique {
            rng.random_range(1..=99_999_999_u32)
        } else {
            rng.random_range(1..=9_999_u32)
        };
        let email = format!("user{number}@example.com");
        if max_len.is_none_or(|max| email.len() <= max as usize) {
            return email;
        }
    }

    let limit = max_len.map_or(STRING_MAX_CHARS, |max| max.min(STRING_MAX_CHARS));
    if limit == 0 {
        return String::new();
    }
    let len = rng.random_range(1..=limit) as usize;
    token(len, rng)
}

fn is_email_column(name: &str) -> bool {
    name.to_ascii_lowercase().contains("email")
}

fn token(len: usize, rng: &mut ChaCha8Rng) -> String {
    (0..len)
        .map(|_| char::from(ALPHANUMERIC[rng.random_range(0..ALPHANUMERIC.len())]))
        .collect()
}

fn words(limit: u32, rng: &mut ChaCha8Rng) -> String {
    let limit = limit as usize;
    let wanted = rng.random_range(1..=8);
    let mut out = String::new();
    for _ in 0..wanted {
        let word = WORDS[rng.random_range(0..WORDS.len())];
        let needed = if out.is_empty() { word.len() } else { word.len() + 1 };
        if out.len() + needed > limit {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        // limit shorter than any word
        out = token(limit.min(STRING_MAX_CHARS as usize), rng).to_ascii_lowercase();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use provisioner_core::kind_for_type;
    use rand::SeedableRng;

    fn column(name: &str, kind: ColumnKind, nullable: bool) -> Column {
        Column {
            ordinal_position: 1,
            name: name.to_string(),
            data_type: kind.label().to_string(),
            kind,
            is_nullable: nullable,
            default: None,
            is_auto_increment: false,
            is_primary: false,
            is_unique: false,
            generated: None,
        }
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    fn generator(null_probability: f64) -> ValueGenerator {
        ValueGenerator::new(null_probability, 30).with_now(fixed_now())
    }

    #[test]
    fn every_kind_is_accepted_by_its_column() {
        let kinds = vec![
            kind_for_type("int", &[], false),
            kind_for_type("tinyint", &[], true),
            kind_for_type("bigint", &[], false),
            kind_for_type("year", &[], false),
            kind_for_type("decimal", &["8".to_string(), "2".to_string()], false),
            kind_for_type("decimal", &["3".to_string(), "3".to_string()], false),
            kind_for_type("double", &[], false),
            kind_for_type("tinyint", &["1".to_string()], false),
            kind_for_type("char", &["2".to_string()], false),
            kind_for_type("varchar", &["0".to_string()], false),
            kind_for_type("varchar", &["255".to_string()], false),
            kind_for_type("text", &["10".to_string()], false),
            kind_for_type("tinytext", &[], false),
            kind_for_type("date", &[], false),
            kind_for_type("datetime", &[], false),
            kind_for_type("time", &[], false),
            kind_for_type("json", &[], false),
            kind_for_type("enum", &["a".to_string(), "b".to_string()], false),
            ColumnKind::Enum { values: Vec::new() },
        ];
        let values = generator(0.3);

        for seed in 0..200_u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for kind in &kinds {
                for nullable in [true, false] {
                    let col = column("value", kind.clone(), nullable);
                    let value = values.generate(&col, &mut rng);
                    assert!(
                        col.accepts(&value),
                        "seed {seed}: {value:?} rejected by {:?} (nullable {nullable})",
                        col.kind
                    );
                }
            }
        }
    }

    #[test]
    fn integers_stay_under_the_ceiling_unless_unique() {
        let values = generator(0.0);
        let plain = column("n", kind_for_type("int", &[], false), false);
        let mut unique = plain.clone();
        unique.is_unique = true;

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut widened = false;
        for _ in 0..500 {
            let GeneratedValue::Int(value) = values.generate(&plain, &mut rng) else {
                panic!("expected integer");
            };
            assert!((1..=INT_CEILING).contains(&value));
            let GeneratedValue::Int(value) = values.generate(&unique, &mut rng) else {
                panic!("expected integer");
            };
            assert!(value >= 1 && value <= i64::from(i32::MAX));
            widened |= value > INT_CEILING;
        }
        assert!(widened);
    }

    #[test]
    fn decimals_keep_their_exact_scale() {
        let values = generator(0.0);
        let col = column(
            "price",
            ColumnKind::Decimal {
                precision: 8,
                scale: 2,
            },
            false,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let GeneratedValue::Decimal(text) = values.generate(&col, &mut rng) else {
                panic!("expected decimal");
            };
            let (_, fraction) = text.split_once('.').expect("fraction");
            assert_eq!(fraction.len(), 2);
        }
    }

    #[test]
    fn email_columns_look_like_addresses() {
        let values = generator(0.0);
        let col = column("contact_email", ColumnKind::String { max_len: Some(120) }, false);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let GeneratedValue::Text(email) = values.generate(&col, &mut rng) else {
            panic!("expected text");
        };
        assert!(email.starts_with("user"));
        assert!(email.ends_with("@example.com"));

        let short = column("email", ColumnKind::String { max_len: Some(5) }, false);
        let GeneratedValue::Text(text) = values.generate(&short, &mut rng) else {
            panic!("expected text");
        };
        assert!(text.chars().count() <= 5);
        assert!(!text.contains('@'));
    }

    #[test]
    fn zero_length_strings_are_empty() {
        let values = generator(0.0);
        let col = column("code", ColumnKind::String { max_len: Some(0) }, false);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(
            values.generate(&col, &mut rng),
            GeneratedValue::Text(String::new())
        );
    }

    #[test]
    fn dates_fall_inside_the_window() {
        let values = generator(0.0);
        let date_col = column("d", ColumnKind::Date, false);
        let datetime_col = column("dt", ColumnKind::DateTime, false);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let earliest = fixed_now() - Duration::days(30);
        for _ in 0..200 {
            let GeneratedValue::Date(date) = values.generate(&date_col, &mut rng) else {
                panic!("expected date");
            };
            assert!(date >= earliest.date() && date <= fixed_now().date());
            let GeneratedValue::DateTime(at) = values.generate(&datetime_col, &mut rng) else {
                panic!("expected datetime");
            };
            assert!(at >= earliest && at <= fixed_now());
        }
    }

    #[test]
    fn oversized_windows_are_clamped() {
        let values = ValueGenerator::new(0.0, u32::MAX).with_now(fixed_now());
        assert_eq!(values.window_days(), i64::from(MAX_DATETIME_WINDOW_DAYS));

        let date_col = column("d", ColumnKind::Date, false);
        let datetime_col = column("dt", ColumnKind::DateTime, false);
        let earliest = fixed_now() - Duration::days(i64::from(MAX_DATETIME_WINDOW_DAYS));
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        for _ in 0..200 {
            let GeneratedValue::Date(date) = values.generate(&date_col, &mut rng) else {
                panic!("expected date");
            };
            assert!(date >= earliest.date() && date <= fixed_now().date());
            let GeneratedValue::DateTime(at) = values.generate(&datetime_col, &mut rng) else {
                panic!("expected datetime");
            };
            assert!(at >= earliest && at <= fixed_now());
        }
    }

    #[test]
    fn nullable_columns_mix_nulls_and_values() {
        let col = column("note", ColumnKind::String { max_len: None }, true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let clamped = generator(1.0);
        assert_eq!(clamped.null_probability(), MAX_NULL_PROBABILITY);
        let nulls = (0..2_000)
            .filter(|_| clamped.generate(&col, &mut rng).is_null())
            .count();
        assert!(nulls > 1_800 && nulls < 2_000);

        let never = generator(0.0);
        assert!((0..500).all(|_| !never.generate(&col, &mut rng).is_null()));
        assert_eq!(generator(f64::NAN).null_probability(), 0.0);
        assert_eq!(generator(-1.0).null_probability(), 0.0);
    }

    #[test]
    fn same_seed_same_values() {
        let values = generator(0.1);
        let col = column("title", ColumnKind::String { max_len: Some(40) }, true);
        let mut left = ChaCha8Rng::seed_from_u64(42);
        let mut right = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            assert_eq!(values.generate(&col, &mut left), values.generate(&col, &mut right));
        }
    }
}
