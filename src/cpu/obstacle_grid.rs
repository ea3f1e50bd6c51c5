// Host mirror of the RGBA8 occupancy texture and its two-stage stamp.
// Texel math matches obstacle_draw.wgsl / obstacle_merge.wgsl.
use glam::{UVec2, Vec2};

pub type Texel = [u8; 4];

pub const EMPTY_TEXEL: Texel = [0, 0, 0, 0];

#[derive(Clone, Debug, PartialEq)]
pub struct ObstacleGrid {
    size: UVec2,
    texels: Vec<Texel>,
}

impl ObstacleGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let size = UVec2::new(width.max(1), height.max(1));
        Self {
            size,
            texels: vec![EMPTY_TEXEL; (size.x * size.y) as usize],
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn texel(&self, x: u32, y: u32) -> Texel {
        self.texels[(y * self.size.x + x) as usize]
    }

    /// Stage A: rasterize a disc into a fresh scratch surface.
    pub fn draw_stamp(&self, position_ndc: Vec2, radius: f32) -> ObstacleGrid {
        let mut scratch = ObstacleGrid::new(self.size.x, self.size.y);
        let center = ndc_to_texel_space(position_ndc, self.size);
        let radius = radius.max(0.0);

        for y in 0..self.size.y {
            for x in 0..self.size.x {
                let d = (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center).length();
                if d <= radius {
                    let depth = if radius > 0.0 { 1.0 - d / radius } else { 1.0 };
                    scratch.texels[(y * self.size.x + x) as usize] =
                        [255, unorm8(depth), 0, 255];
                }
            }
        }
        scratch
    }

    /// Stage B: max-blend the scratch surface into the field.
    pub fn merge(&mut self, scratch: &ObstacleGrid) {
        debug_assert_eq!(self.size, scratch.size);
        for (dst, src) in self.texels.iter_mut().zip(&scratch.texels) {
            for c in 0..4 {
                dst[c] = dst[c].max(src[c]);
            }
        }
    }

    pub fn stamp(&mut self, position_ndc: Vec2, radius: f32) {
        let scratch = self.draw_stamp(position_ndc, radius);
        self.merge(&scratch);
    }

    /// Red channel at an NDC location; 0 outside the field.
    pub fn occupancy_at_ndc(&self, ndc: Vec2) -> f32 {
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
            return 0.0;
        }
        let p = ndc_to_texel_space(ndc, self.size).floor();
        let x = (p.x.max(0.0) as u32).min(self.size.x - 1);
        let y = (p.y.max(0.0) as u32).min(self.size.y - 1);
        self.texel(x, y)[0] as f32 / 255.0
    }
}

/// NDC to texel space: origin top-left, y down.
pub fn ndc_to_texel_space(ndc: Vec2, size: UVec2) -> Vec2 {
    Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5) * size.as_vec2()
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
