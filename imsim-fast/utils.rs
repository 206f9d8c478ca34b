/// Utility functions for the FAST segment test

/// Pack the 16 circle flags into a bitmask, bit `i` set when `pixels[i]` is.
pub fn circle_mask(pixels: &[bool; 16]) -> u16 {
    pixels
        .iter()
        .enumerate()
        .fold(0u16, |mask, (i, &p)| if p { mask | (1 << i) } else { mask })
}

/// Check if there are at least `min_count` consecutive set bits in the
/// circular 16-bit mask, using rotate-and-and so wrap-around is free.
pub fn has_consecutive_bits(mask: u16, min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }

    let mut test_mask = mask;
    for i in 1..min_count {
        test_mask &= mask.rotate_left(i as u32);
        if test_mask == 0 {
            return false;
        }
    }

    test_mask != 0
}

/// Check if there are at least `min_count` consecutive true values in the circular array
pub fn has_consecutive_pixels(pixels: &[bool; 16], min_count: usize) -> bool {
    has_consecutive_bits(circle_mask(pixels), min_count)
}
