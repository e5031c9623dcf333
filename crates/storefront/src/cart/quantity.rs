//! Quantity snapping to a product's purchase step.

/// Snap `quantity` to the nearest multiple of `step`, rounding halves up,
/// and never below one step.
///
/// A step of zero is treated as one.
///
/// ```
/// use kron_storefront::cart::adjust_quantity_by_multiplicity;
///
/// assert_eq!(adjust_quantity_by_multiplicity(5, 3), 6);
/// assert_eq!(adjust_quantity_by_multiplicity(1, 3), 3);
/// assert_eq!(adjust_quantity_by_multiplicity(7, 1), 7);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Bounded by u32::MAX before narrowing
pub const fn adjust_quantity_by_multiplicity(quantity: u32, step: u32) -> u32 {
    let step = if step == 0 { 1 } else { step };
    // Widen so 2 * quantity cannot overflow
    let q = quantity as u64;
    let s = step as u64;
    let snapped = (2 * q + s) / (2 * s) * s;
    let snapped = if snapped < s { s } else { snapped };
    if snapped > u32::MAX as u64 {
        // Largest multiple of step that fits
        u32::MAX / step * step
    } else {
        snapped as u32
    }
}
