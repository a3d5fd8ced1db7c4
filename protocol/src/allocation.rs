//! # Card Allocation
//!
//! Minting a card means drawing a number, a CVV and an expiry that no live
//! card already uses, plus a PIN that nobody ever sees in clear.
//!
//! ## Collision budget
//!
//! Each attempt draws a *fresh* (number, CVV) pair and asks the
//! [`CardRegistry`] whether a non-inactive card with exactly that number,
//! type, CVV and expiry exists. After [`CARD_ALLOCATION_ATTEMPTS`] misses we
//! stop and fail with [`EngineError::Allocation`]. At 16 digits a single
//! collision is already a one-in-a-quadrillion event, so running out of
//! attempts means the RNG or the store is broken. Retrying harder would
//! only hide that.
//!
//! ## Numbers
//!
//! `prefix || random digits || Luhn check digit`, exactly the configured
//! length. The check digit means every number we mint passes the checksum
//! any payment terminal will run on it.
//!
//! ## PINs
//!
//! Generated, hashed with the card's own salt, and wiped. The raw digits
//! live in a [`Zeroizing`] buffer for the few microseconds between drawing
//! and hashing, and are never returned, stored or logged.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::{EngineConfig, CARD_ALLOCATION_ATTEMPTS, CARD_VALIDITY_MONTHS, PIN_LENGTH};
use crate::crypto::{pin_hash, ContentHash};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Card type & expiry
// ---------------------------------------------------------------------------

/// Card product. The variant decides the leading digit of the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Debit,
    Credit,
    Prepaid,
}

impl CardType {
    pub const ALL: [CardType; 3] = [CardType::Debit, CardType::Credit, CardType::Prepaid];

    /// Leading digit of every number of this type.
    pub fn prefix(self) -> &'static str {
        match self {
            CardType::Debit => "4",
            CardType::Credit => "5",
            CardType::Prepaid => "6",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Debit => "Debit",
            CardType::Credit => "Credit",
            CardType::Prepaid => "Prepaid",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::type_mismatch("card_type", format!("unknown card type '{s}'")))
    }
}

/// Month-granularity expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardExpiry {
    pub year: i32,
    pub month: u32,
}

impl CardExpiry {
    /// [`CARD_VALIDITY_MONTHS`] after `issued`.
    pub fn from_issue_date(issued: NaiveDate) -> EngineResult<Self> {
        let expires = issued
            .checked_add_months(Months::new(CARD_VALIDITY_MONTHS))
            .ok_or_else(|| EngineError::type_mismatch("expiry", "issue date out of range"))?;
        Ok(Self {
            year: expires.year(),
            month: expires.month(),
        })
    }

    /// Expiry for a card issued today (UTC).
    pub fn for_card_issued_today() -> EngineResult<Self> {
        Self::from_issue_date(Utc::now().date_naive())
    }

    /// `MM/YY`, as printed on the card and fed into the card identifier.
    pub fn short_date(&self) -> String {
        format!("{:02}/{:02}", self.month, self.year.rem_euclid(100))
    }
}

impl fmt::Display for CardExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_date())
    }
}

// ---------------------------------------------------------------------------
// Digit generation
// ---------------------------------------------------------------------------

/// `length` uniform random decimal digits.
pub fn generate_digits<R: Rng + ?Sized>(length: usize, rng: &mut R) -> String {
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Luhn check digit for `body` (the number without its last digit).
pub fn luhn_check_digit(body: &str) -> u32 {
    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

/// Whether a full number's last digit is its Luhn check digit.
pub fn luhn_valid(number: &str) -> bool {
    if number.len() < 2 || !number.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (body, check) = number.split_at(number.len() - 1);
    check.chars().next().and_then(|c| c.to_digit(10)) == Some(luhn_check_digit(body))
}

/// `prefix || random digits || check digit`, `length` digits in total.
pub fn generate_card_number<R: Rng + ?Sized>(prefix: &str, length: usize, rng: &mut R) -> String {
    let random_len = length.saturating_sub(prefix.len() + 1);
    let mut number = String::with_capacity(length);
    number.push_str(prefix);
    number.push_str(&generate_digits(random_len, rng));
    let check = luhn_check_digit(&number);
    number.push(char::from(b'0' + check as u8));
    number
}

/// Draw a PIN, hash it with the card's salt, forget it.
pub fn issue_pin<R: Rng + ?Sized>(rng: &mut R, record_salt: &str) -> EngineResult<ContentHash> {
    let pin = Zeroizing::new(generate_digits(PIN_LENGTH, rng));
    pin_hash(&pin, record_salt)
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// One drawn (number, CVV) pair for a given type and expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct CardCandidate {
    pub number: String,
    pub cvv: String,
    pub card_type: CardType,
    pub expiry: CardExpiry,
}

impl fmt::Debug for CardCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self.number.get(self.number.len().saturating_sub(4)..).unwrap_or("");
        f.debug_struct("CardCandidate")
            .field("number", &format_args!("****{tail}"))
            .field("cvv", &"***")
            .field("card_type", &self.card_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Answers "is this exact card already live?".
pub trait CardRegistry {
    fn live_card_exists(&self, candidate: &CardCandidate) -> EngineResult<bool>;
}

/// Draws candidates until one is free or the budget runs out.
#[derive(Debug, Clone, Copy)]
pub struct CardAllocator {
    number_length: usize,
    cvv_length: usize,
    attempts: usize,
}

impl CardAllocator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            number_length: config.card_number_length(),
            cvv_length: config.cvv_length(),
            attempts: CARD_ALLOCATION_ATTEMPTS,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// One candidate. Number first, then CVV.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        card_type: CardType,
        expiry: CardExpiry,
        rng: &mut R,
    ) -> CardCandidate {
        let number = generate_card_number(card_type.prefix(), self.number_length, rng);
        let cvv = generate_digits(self.cvv_length, rng);
        CardCandidate {
            number,
            cvv,
            card_type,
            expiry,
        }
    }

    /// Allocate a card nobody else holds.
    ///
    /// # Errors
    ///
    /// [`EngineError::Allocation`] once every attempt collided. Registry
    /// failures propagate unchanged.
    pub fn allocate<G, R>(
        &self,
        registry: &G,
        card_type: CardType,
        expiry: CardExpiry,
        rng: &mut R,
    ) -> EngineResult<CardCandidate>
    where
        G: CardRegistry + ?Sized,
        R: Rng + ?Sized,
    {
        for attempt in 1..=self.attempts {
            let candidate = self.draw(card_type, expiry, rng);
            if !registry.live_card_exists(&candidate)? {
                debug!(attempt, card_type = %card_type, "card number allocated");
                return Ok(candidate);
            }
            debug!(attempt, card_type = %card_type, "card number collision, redrawing");
        }

        warn!(
            attempts = self.attempts,
            card_type = %card_type,
            "card allocation budget exhausted"
        );
        Err(EngineError::Allocation {
            attempts: self.attempts,
        })
    }
}
