//! Canopy Compensation Math
//!
//! Pure functions over turnover and wallet amounts. Nothing here knows about
//! trees or locking; the engine feeds values in and applies the results.
//!
//! # Reward Credits
//!
//! Slab accumulation over cumulative leg turnover, never prorated:
//! - first 200,000 → 10 credits
//! - next 500,000 → 15 credits
//! - next 1,000,000 → 20 credits
//! - every further full 2,000,000 → 25 credits
//!
//! # Withdrawal Tax
//!
//! A flat rate on the whole amount, picked by bracket (not marginal):
//! - ≤ 10,000 → 0%
//! - ≤ 50,000 → 5%
//! - ≤ 100,000 → 10%
//! - above → 15%
//!
//! # Matching
//!
//! Volume arriving on a leg is carried forward until the weaker leg reaches a
//! configured threshold; the matched volume then pays out at a configured rate
//! and is removed from both legs.

mod error;
mod matching;
mod money;
mod slabs;
mod tax;

pub use error::{PayoutError, Result};
pub use matching::{CarryForward, MatchOutcome, MatchingConfig, SponsorBonus};
pub use money::{Money, BPS_SCALE, MINOR_PER_MAJOR};
pub use slabs::{reward_credits, Slab, SlabSchedule};
pub use tax::{withdrawal_tax, TaxAssessment, TaxBracket, TaxSchedule};
