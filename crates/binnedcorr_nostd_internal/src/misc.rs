/// add each element of `other` to the corresponding element of `accum`
///
/// This is the only way two partial results ever get combined. Since it is a
/// plain elementwise sum, the order in which partial results are folded
/// together doesn't change the answer (exactly so for integer-valued data).
pub fn add_assign_elementwise(accum: &mut [f64], other: &[f64]) -> Result<(), &'static str> {
    if accum.len() != other.len() {
        return Err("can't merge buffers with different lengths");
    }
    for (dst, src) in accum.iter_mut().zip(other.iter()) {
        *dst += *src;
    }
    Ok(())
}

/// returns whether any entry of `weight` is nonzero
pub fn any_nonzero(weight: &[f64]) -> bool {
    weight.iter().any(|&w| w != 0.0)
}
