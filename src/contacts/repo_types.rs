use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Contact record in the database. Always owned by exactly one user.
#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birthdate: Date,
    pub avatar: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birthdate: Date,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthdate: Option<Date>,
}

/// Case-insensitive substring filters, AND-combined. Blank filters are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSearch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ContactSearch {
    pub fn new(name: Option<String>, email: Option<String>, phone: Option<String>) -> Self {
        Self {
            name: non_blank(name),
            email: non_blank(email),
            phone: non_blank(phone),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// `ILIKE` patterns for name, email, phone (escape character `\`).
    pub fn like_patterns(&self) -> (Option<String>, Option<String>, Option<String>) {
        (
            self.name.as_deref().map(like_pattern),
            self.email.as_deref().map(like_pattern),
            self.phone.as_deref().map(like_pattern),
        )
    }
}

/// Wraps `needle` in `%…%`, escaping `LIKE` metacharacters so they match literally.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

pub const MAX_BIRTHDAY_WINDOW_DAYS: u16 = 366;

/// Calendar days `[today, today + days]` as (month, day) pairs in chronological order.
///
/// Crossing a month or a year boundary needs no special casing. In non-leap years a
/// Feb 29 birthday is celebrated on Feb 28.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayWindow {
    days: Vec<(u8, u8)>,
}

impl BirthdayWindow {
    pub fn new(today: Date, days: u16) -> Self {
        let days = days.min(MAX_BIRTHDAY_WINDOW_DAYS);
        let mut out: Vec<(u8, u8)> = Vec::with_capacity(days as usize + 2);
        let mut current = Some(today);
        for _ in 0..=days {
            let Some(day) = current else { break };
            let pair = (day.month() as u8, day.day());
            if !out.contains(&pair) {
                out.push(pair);
            }
            if pair == (2, 28) && !time::util::is_leap_year(day.year()) && !out.contains(&(2, 29)) {
                out.push((2, 29));
            }
            current = day.next_day();
        }
        Self { days: out }
    }

    /// Position of the birthdate's (month, day) inside the window.
    pub fn offset_of(&self, birthdate: Date) -> Option<usize> {
        let pair = (birthdate.month() as u8, birthdate.day());
        self.days.iter().position(|p| *p == pair)
    }

    pub fn contains(&self, birthdate: Date) -> bool {
        self.offset_of(birthdate).is_some()
    }

    pub fn months(&self) -> Vec<i32> {
        self.days.iter().map(|(m, _)| *m as i32).collect()
    }

    pub fn days_of_month(&self) -> Vec<i32> {
        self.days.iter().map(|(_, d)| *d as i32).collect()
    }
}
