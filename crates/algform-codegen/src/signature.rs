//! Shared function-signature shape for both backends, grounded on
//! `codegen_c.py`'s `generate_csrc_from_graph` keyword arguments
//! (`np`, `hessian_lagrange`, `nw`, `indirect_x/p/w/y`, `add_y`).

/// Addressing/signature options for one compiled function. One compiled
/// function serves every instance of a structural group: `indirect_*`
/// flags mean "read/write through an instance-supplied index array"
/// instead of assuming the instance's slots are contiguous at the front
/// of the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionSignature {
    pub np: usize,
    pub hessian_lagrange: bool,
    pub nw: usize,
    pub indirect_x: bool,
    pub indirect_p: bool,
    pub indirect_w: bool,
    pub indirect_y: bool,
    /// `y[i] += ...` instead of `y[i] = ...`; used when several instances
    /// accumulate into a shared Hessian buffer.
    pub add_y: bool,
}

impl FunctionSignature {
    pub fn has_parameter(&self) -> bool {
        self.np > 0
    }
}
