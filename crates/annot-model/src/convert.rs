//! Value-conversion seam
//!
//! The merging core only adapts within its own closed type set (type
//! references, strings, annotations, arrays). Broader coercion is the job
//! of a downstream conversion service; this trait is the boundary it plugs
//! into.

use crate::error::AnnotationError;
use crate::value::{Value, ValueKind};

/// Converts a value to a target kind, or fails
pub trait ValueConversion {
    /// Convert `value` to `target`, or report a type mismatch
    ///
    /// # Errors
    /// Returns an error when the conversion is not supported.
    fn convert(&self, value: &Value, target: &ValueKind) -> Result<Value, AnnotationError>;
}
