//! Port Interfaces
//!
//! Contracts between the emitter and the adapters that feed it.
//!
//! ## Driven Ports (Outbound)
//!
//! - `ValueSource`: produces the random value of each reading
//! - `ValueSourceFactory`: creates one `ValueSource` per subscription, so
//!   no generator state is shared between subscribers

pub use crate::domain::reading::ValueSource;

/// Creates a fresh [`ValueSource`] for each new subscription.
pub trait ValueSourceFactory: Send + Sync {
    /// Create the value source for one subscription.
    fn create(&self) -> Box<dyn ValueSource>;
}

impl<F> ValueSourceFactory for F
where
    F: Fn() -> Box<dyn ValueSource> + Send + Sync,
{
    fn create(&self) -> Box<dyn ValueSource> {
        self()
    }
}
