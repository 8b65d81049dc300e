//! Compute dispatch sizing.

/// Threads per workgroup of the one-dimensional per-atom kernels.
pub const ATOM_WORKGROUP_SIZE: u32 = 64;
/// Edge length of the square workgroups of the image kernels.
pub const IMAGE_WORKGROUP_SIZE: u32 = 8;

/// Workgroups needed to cover `count` invocations with groups of `size`.
///
/// Rounds up; kernels bounds-check the tail of the last group.
#[inline]
#[must_use]
pub const fn workgroups_for(count: u32, size: u32) -> u32 {
    count.div_ceil(size)
}

/// Workgroup grid covering a `width × height` image with 8×8 groups.
#[inline]
#[must_use]
pub const fn image_workgroups(width: u32, height: u32) -> (u32, u32) {
    (
        workgroups_for(width, IMAGE_WORKGROUP_SIZE),
        workgroups_for(height, IMAGE_WORKGROUP_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_dispatch_at_workgroup_boundaries() {
        assert_eq!(workgroups_for(0, ATOM_WORKGROUP_SIZE), 0);
        assert_eq!(workgroups_for(1, ATOM_WORKGROUP_SIZE), 1);
        assert_eq!(workgroups_for(63, ATOM_WORKGROUP_SIZE), 1);
        assert_eq!(workgroups_for(64, ATOM_WORKGROUP_SIZE), 1);
        assert_eq!(workgroups_for(65, ATOM_WORKGROUP_SIZE), 2);
    }

    #[test]
    fn image_dispatch_covers_odd_sizes() {
        assert_eq!(image_workgroups(1920, 1080), (240, 135));
        assert_eq!(image_workgroups(801, 7), (101, 1));
    }
}
