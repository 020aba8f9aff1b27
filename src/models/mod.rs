pub mod booking;
pub mod estimate;
pub mod payment;
pub mod queue;
pub mod recommendation;
pub mod review;
pub mod station;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use estimate::{ChargingEstimate, ChargingInput};
pub use payment::{Payment, PaymentMethod, PaymentRecordStatus, PaymentType};
pub use queue::{QueueEntry, QueueSnapshot, QueueStatus, ReallocationResult};
pub use recommendation::{AlternativeReason, SavedRecommendation};
pub use review::Review;
pub use station::{ChargerSpec, Station};
