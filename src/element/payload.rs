use serde::{Deserialize, Serialize};

/// Payload of a splittable element: the user value plus the restriction
/// and watermark-estimator state it is processed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRestriction<V, R, S> {
    pub value: V,
    pub restriction: R,
    pub watermark_state: S,
}

impl<V, R, S> ElementRestriction<V, R, S> {
    pub fn new(value: V, restriction: R, watermark_state: S) -> Self {
        ElementRestriction {
            value,
            restriction,
            watermark_state,
        }
    }
}

/// An [`ElementRestriction`] annotated with the size hint the runner uses
/// to weigh work distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedElementRestriction<V, R, S> {
    pub element: ElementRestriction<V, R, S>,
    pub size: f64,
}

impl<V, R, S> SizedElementRestriction<V, R, S> {
    pub fn new(element: ElementRestriction<V, R, S>, size: f64) -> Self {
        SizedElementRestriction { element, size }
    }
}
