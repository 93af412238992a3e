//! Deterministic synthetic frame generator used when no `--input` LUMA file
//! is given. Just enough texture to exercise the pipeline end to end
//! without ever resolving to a deck (a plain LCG has no structure a
//! [`CodeDefinition`](deckscan_iface::CodeDefinition) could align to), so
//! every frame is expected to come back `NF`.
use deckscan_core::ImageBuffer;

/// A tiny linear-congruential generator; good enough for demo texture, not
/// for anything that needs real randomness.
struct Lcg(u64);

impl Lcg
{
    fn next_u8(&mut self) -> u8
    {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 56) as u8
    }
}

#[must_use]
pub fn noise_frame(width: usize, height: usize, seed: u64) -> ImageBuffer<'static, u8>
{
    let mut rng = Lcg(seed ^ 0x9E3779B97F4A7C15);
    let mut image: ImageBuffer<'static, u8> = ImageBuffer::owned(width, height);
    for y in 0..height
    {
        for x in 0..width
        {
            image.set(x, y, rng.next_u8());
        }
    }
    image
}
