pub mod checkout;
pub mod event;
pub mod reservation;
pub mod ticket;

pub use checkout::{CheckoutSession, Order};
pub use event::{Event, Tier};
pub use reservation::Reservation;
pub use ticket::Ticket;

/// Event lifecycle states as stored in `events.status`.
pub mod event_status {
    pub const DRAFT: &str = "draft";
    pub const SCHEDULED: &str = "scheduled";
    pub const ON_SALE: &str = "on_sale";
    pub const CLOSED: &str = "closed";
    pub const CANCELED: &str = "canceled";
}

/// Reservation lifecycle states as stored in `reservations.status`.
pub mod reservation_status {
    pub const ACTIVE: &str = "active";
    pub const EXPIRED: &str = "expired";
    pub const CONVERTED: &str = "converted";
    pub const CANCELED: &str = "canceled";
}

/// Checkout session states as stored in `checkout_sessions.status`.
pub mod session_status {
    pub const PENDING: &str = "pending";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const EXPIRED: &str = "expired";
}
