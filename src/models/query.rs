use tokio_util::sync::CancellationToken;

use super::entity::PlaceRef;

/// Which query shape an adapter should build for a layer.
///
/// The admin-boundary source runs twice in the cascade with two different
/// shapes; everything else maps one-to-one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryShape {
    /// Primary population-place search around the entity
    Primary,
    /// Broad free-form boundary search
    BoundaryBroad,
    /// Narrow structured boundary search
    BoundaryNarrow,
    /// Coordinate-grid search centered on the entity
    Grid,
}

/// Request context for a provider query.
///
/// Carries the entity, the layer's query shape, and the caller-supplied
/// cancellation signal, which adapters check before each paginated call.
#[derive(Clone, Debug)]
pub struct QueryContext {
    /// The entity whose areas are being discovered
    pub entity: PlaceRef,

    /// The layer's query shape
    pub shape: QueryShape,

    /// Caller-supplied cancellation signal
    pub cancel: CancellationToken,
}

impl QueryContext {
    /// Build a context for the given entity and shape with a fresh,
    /// never-cancelled token.
    pub fn new(entity: PlaceRef, shape: QueryShape) -> Self {
        Self {
            entity,
            shape,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a caller-supplied cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
