/// Size of a texture or render target in physical pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PixelDims {
    pub width: u32,
    pub height: u32,
}

impl PixelDims {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Scales both axes by `factor`, flooring and keeping at least one pixel.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            ((self.width as f32 * factor).floor() as u32).max(1),
            ((self.height as f32 * factor).floor() as u32).max(1),
        )
    }

    #[inline]
    pub fn to_f32(self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}
