//! Vendor platform implementations.

pub mod cisco_bsp;
pub mod cisco_vxr;
pub mod cisco_xr;
