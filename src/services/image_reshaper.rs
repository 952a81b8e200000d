//! 图片缩放能力
//!
//! 无论采用哪种策略，输出尺寸都严格等于目标尺寸，且结果是确定的。

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::models::ResizePolicy;

/// 留白区域的填充色
pub const BUFFER_COLOR: Rgba<u8> = Rgba([127, 127, 127, 255]);

/// 图片缩放器
#[derive(Debug, Clone, Copy)]
pub struct ImgReshaper {
    size: (u32, u32),
    policy: ResizePolicy,
}

impl ImgReshaper {
    pub fn new(size: (u32, u32), policy: ResizePolicy) -> Self {
        Self { size, policy }
    }

    pub fn reshape(&self, img: &DynamicImage) -> DynamicImage {
        let (width, height) = self.size;
        match self.policy {
            ResizePolicy::Stretch => img.resize_exact(width, height, FilterType::Lanczos3),
            ResizePolicy::Letterbox => self.letterbox(img),
        }
    }

    /// 按比例缩放到目标框内（放大或缩小），居中贴到灰色画布上
    fn letterbox(&self, img: &DynamicImage) -> DynamicImage {
        let (width, height) = self.size;
        let (src_w, src_h) = (img.width().max(1), img.height().max(1));

        let scale = f64::min(
            width as f64 / src_w as f64,
            height as f64 / src_h as f64,
        );
        let new_w = ((src_w as f64 * scale).round() as u32).clamp(1, width);
        let new_h = ((src_h as f64 * scale).round() as u32).clamp(1, height);

        let rgba = img.to_rgba8();
        let scaled = if (new_w, new_h) == (src_w, src_h) {
            rgba
        } else {
            imageops::resize(&rgba, new_w, new_h, FilterType::Lanczos3)
        };

        let mut canvas = RgbaImage::from_pixel(width, height, BUFFER_COLOR);
        let x = (width - new_w) / 2;
        let y = (height - new_h) / 2;
        imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
        DynamicImage::ImageRgba8(canvas)
    }
}
