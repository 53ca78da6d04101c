//! Hard limits on caller input.

pub const MAX_STAY_NIGHTS: u32 = 365;
pub const MAX_GUEST_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 40;
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 2000;
pub const MAX_ACTOR_LEN: usize = 200;
pub const MAX_ROOM_NAME_LEN: usize = 200;
pub const MAX_ROOM_NUMBER_LEN: usize = 20;
pub const MAX_AMENITIES: usize = 64;
/// Highest nightly price, in minor units. The longest stay at this price
/// still fits in an `Amount`.
pub const MAX_PRICE_PER_NIGHT: u64 = 10_000_000_000_000_000;

/// Length of a generated booking code.
pub const BOOKING_CODE_LEN: usize = 8;
/// Attempts at drawing an unused booking code before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 16;
